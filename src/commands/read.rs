//! `read` command

use nuflash_core::target::TargetDefinition;
use nuflash_nulink::usb;

use super::progress::IndicatifProgress;
use crate::files::Output;

/// Read configuration and flash into a composite HEX image
pub fn run_read(target: &TargetDefinition, output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = usb::connect(target)?;
    let mut progress = IndicatifProgress::new();
    let image = conn.read_image(&mut progress)?;
    progress.finish();
    conn.close();

    let sink = image.write_hex(Output::create(output)?)?;
    sink.commit()?;

    if output != "-" {
        println!("Read {} bytes from {} into {}", image.memory().len(), target.name, output);
    }
    Ok(())
}
