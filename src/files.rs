//! File and stream helpers
//!
//! `-` stands for stdin or stdout. Files are written to `PATH~` first and
//! only renamed to `PATH` once the output was committed, so a failed run
//! never leaves a truncated file behind under the final name.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Stdout, Write};
use std::path::PathBuf;

use nuflash_core::target::TargetDefinition;
use nuflash_core::{Error, Result};

/// Open a file, or stdin for `-`
pub fn open_read(arg: &str) -> io::Result<Box<dyn BufRead>> {
    if arg == "-" {
        Ok(Box::new(io::stdin().lock()))
    } else {
        let file = File::open(arg).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to open {}: {}", arg, e))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

enum Sink {
    Stdout(BufWriter<Stdout>),
    File {
        writer: BufWriter<File>,
        temp: PathBuf,
        path: PathBuf,
    },
}

/// Output file or stdout
pub struct Output {
    sink: Sink,
    committed: bool,
}

impl Output {
    /// Create `PATH~` (or use stdout for `-`)
    pub fn create(arg: &str) -> io::Result<Self> {
        let sink = if arg == "-" {
            Sink::Stdout(BufWriter::new(io::stdout()))
        } else {
            let path = PathBuf::from(arg);
            let mut temp = path.clone().into_os_string();
            temp.push("~");
            let temp = PathBuf::from(temp);
            let file = File::create(&temp).map_err(|e| {
                io::Error::new(e.kind(), format!("failed to create {}: {}", temp.display(), e))
            })?;
            Sink::File {
                writer: BufWriter::new(file),
                temp,
                path,
            }
        };
        Ok(Self {
            sink,
            committed: false,
        })
    }

    /// Flush and move the file into place
    pub fn commit(mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Stdout(writer) => writer.flush()?,
            Sink::File { writer, temp, path } => {
                writer.flush()?;
                writer.get_ref().sync_all()?;
                fs::rename(&*temp, &*path)?;
                log::debug!("wrote {}", path.display());
            }
        }
        self.committed = true;
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::Stdout(writer) => writer.write(buf),
            Sink::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Stdout(writer) => writer.flush(),
            Sink::File { writer, .. } => writer.flush(),
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        if let Sink::File { temp, .. } = &self.sink {
            if !self.committed {
                if let Err(e) = fs::remove_file(temp) {
                    log::warn!("Failed to remove {}: {}", temp.display(), e);
                }
            }
        }
    }
}

/// Parse a configuration argument
///
/// Accepts hex bytes, `@path` to a TOML document, or the document itself
/// inline (`'{ locked = true }'` or `'locked = true'`).
pub fn parse_config_arg(target: &TargetDefinition, arg: &str) -> Result<Vec<u8>> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(Error::Usage("no configuration specified".into()));
    }

    let config = if let Some(path) = arg.strip_prefix('@') {
        let mut text = String::new();
        open_read(path)?.read_to_string(&mut text)?;
        target.config.parse_document(&text)?
    } else if arg.starts_with('{') || arg.contains('=') {
        target.config.parse_document(arg)?
    } else {
        return target.config.parse_hex(arg);
    };
    target.config.encode(&config)
}
