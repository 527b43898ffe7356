//! Progress bars for flash operations

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nuflash_nulink::Progress;

/// Create a progress bar with a phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    phase: &'static str,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            phase: "",
        }
    }

    fn create_bar(&mut self, total: usize, phase: &'static str) {
        self.finish();
        self.phase = phase;
        let pb = self.multi.add(
            create_progress_bar_with_phase(total as u64, phase)
                .unwrap_or_else(|_| ProgressBar::new(total as u64)),
        );
        self.current_bar = Some(pb);
    }

    fn advance(&self, bytes: usize) {
        if let Some(pb) = &self.current_bar {
            pb.inc(bytes as u64);
        }
    }

    /// Finish the active bar, if any
    pub fn finish(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(format!("{} complete", self.phase));
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for IndicatifProgress {
    fn erasing(&mut self) {
        self.finish();
        self.phase = "Erase";
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message("Erasing chip...");
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn writing(&mut self, total: usize) {
        self.create_bar(total, "Writing");
    }

    fn write_progress(&mut self, bytes: usize) {
        self.advance(bytes);
    }

    fn reading(&mut self, total: usize) {
        self.create_bar(total, "Reading");
    }

    fn read_progress(&mut self, bytes: usize) {
        self.advance(bytes);
    }

    fn verifying(&mut self, total: usize) {
        self.create_bar(total, "Verifying");
    }

    fn verify_progress(&mut self, bytes: usize) {
        self.advance(bytes);
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
