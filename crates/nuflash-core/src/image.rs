//! Flat flash images composed from Intel HEX sources
//!
//! A [`TargetImage`] holds the whole program memory of a target (APROM
//! followed by LDROM) plus the configuration bytes. Where the APROM ends
//! depends on the LDROM size encoded in the configuration, so the split is
//! only available once configuration bytes are known.

use std::fmt;
use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};
use crate::ihex::{Reader, Writer};
use crate::target::{TargetConfig, TargetDefinition};

/// Which input a HEX stream was supplied as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Complete image (APROM, LDROM and configuration)
    Image,
    /// Application region only
    Aprom,
    /// Loader region only
    Ldrom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Image => "image",
            SourceKind::Aprom => "aprom",
            SourceKind::Ldrom => "ldrom",
        })
    }
}

/// Sizes of the two program memory regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSplit {
    /// APROM size in bytes
    pub program_size: usize,
    /// LDROM size in bytes
    pub loader_size: usize,
}

/// Program memory and configuration of one target
#[derive(Debug, Clone)]
pub struct TargetImage<'t> {
    target: &'t TargetDefinition,
    config: Vec<u8>,
    memory: Vec<u8>,
}

impl<'t> TargetImage<'t> {
    /// Blank (erased) image for `target`
    pub fn new(target: &'t TargetDefinition) -> Self {
        Self {
            target,
            config: Vec::new(),
            memory: vec![0xFF; target.program_memory_size],
        }
    }

    /// Target this image belongs to
    pub fn target(&self) -> &'t TargetDefinition {
        self.target
    }

    /// Configuration bytes, empty if none are known
    pub fn config(&self) -> &[u8] {
        &self.config
    }

    /// Replace the configuration bytes
    pub fn set_config(&mut self, config: Vec<u8>) {
        self.config = config;
    }

    /// Whole program memory
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Whole program memory, mutable
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Apply every block of a HEX stream
    ///
    /// Blocks that end at or before `bound` are copied to `offset + address`.
    /// A block starting exactly at the configuration offset replaces the
    /// configuration bytes. Anything else is [`Error::OutOfRange`].
    pub fn load<R: BufRead>(
        &mut self,
        reader: R,
        offset: usize,
        bound: usize,
        kind: SourceKind,
    ) -> Result<()> {
        let bound = bound.min(self.memory.len().saturating_sub(offset));
        let mut blocks = 0usize;

        for block in Reader::new(reader) {
            let block = block?;
            let start = block.address as usize;
            let end = start.checked_add(block.data.len());

            match end {
                Some(end) if end <= bound => {
                    self.memory[offset + start..offset + end].copy_from_slice(&block.data);
                }
                _ if block.address == self.target.config.hex_offset => {
                    log::debug!("{}: configuration block of {} bytes", kind, block.data.len());
                    self.config = block.data;
                }
                _ => {
                    return Err(Error::OutOfRange {
                        address: block.address,
                        len: block.data.len(),
                        kind,
                    });
                }
            }
            blocks += 1;
        }

        log::debug!("{}: loaded {} blocks at offset 0x{:04X}", kind, blocks, offset);
        Ok(())
    }

    /// Decode the configuration bytes
    pub fn decoded_config(&self) -> Result<TargetConfig> {
        if self.config.is_empty() {
            return Err(Error::NoConfig);
        }
        self.target.config.decode(&self.config)
    }

    /// APROM/LDROM sizes selected by the configuration
    pub fn split(&self) -> Result<RegionSplit> {
        let loader_size = self.decoded_config()?.loader_region_size();
        let program_size = self
            .target
            .program_memory_size
            .checked_sub(loader_size)
            .ok_or_else(|| {
                Error::Invariant(format!(
                    "loader region of {} bytes exceeds {} program memory",
                    loader_size, self.target.name
                ))
            })?;
        Ok(RegionSplit {
            program_size,
            loader_size,
        })
    }

    /// Application region
    pub fn aprom(&self) -> Result<&[u8]> {
        let split = self.split()?;
        Ok(&self.memory[..split.program_size])
    }

    /// Loader region; empty when the configuration disables it
    pub fn ldrom(&self) -> Result<&[u8]> {
        let split = self.split()?;
        Ok(&self.memory[split.program_size..])
    }

    /// Both regions, mutable
    pub fn regions_mut(&mut self) -> Result<(&mut [u8], &mut [u8])> {
        let split = self.split()?;
        Ok(self.memory.split_at_mut(split.program_size))
    }

    /// Write the composite image: configuration first, then program memory
    pub fn write_hex<W: Write>(&self, sink: W) -> Result<W> {
        let mut writer = Writer::new(sink);
        if !self.config.is_empty() {
            writer.write(self.target.config.hex_offset, &self.config)?;
        }
        writer.write(0, &self.memory)?;
        Ok(writer.finish()?)
    }
}

/// Write one region as a standalone HEX file starting at address 0
pub fn write_region_hex<W: Write>(sink: W, bytes: &[u8]) -> Result<W> {
    let mut writer = Writer::new(sink);
    writer.write(0, bytes)?;
    Ok(writer.finish()?)
}

/// Inputs for [`compose`]
///
/// `S` names a HEX source (usually a path); configuration bytes are already
/// parsed.
#[derive(Debug, Clone)]
pub struct ImageSources<S> {
    /// Complete image
    pub image: Option<S>,
    /// APROM-only file
    pub aprom: Option<S>,
    /// LDROM-only file
    pub ldrom: Option<S>,
    /// Explicit configuration bytes, overriding any found in `image`
    pub config: Option<Vec<u8>>,
}

impl<S> Default for ImageSources<S> {
    fn default() -> Self {
        Self {
            image: None,
            aprom: None,
            ldrom: None,
            config: None,
        }
    }
}

impl<S> ImageSources<S> {
    /// Check the combination of inputs without opening anything
    pub fn validate(&self, require_image: bool) -> Result<()> {
        let given = [
            self.image.is_some(),
            self.aprom.is_some(),
            self.ldrom.is_some(),
        ];
        match given.iter().filter(|&&g| g).count() {
            0 if require_image => Err(Error::Usage("no input files specified".into())),
            3 => Err(Error::Usage(
                "at most two of image, APROM and LDROM may be given".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Build a [`TargetImage`] from the given sources
///
/// `open` turns a source name into a reader; it is only called after the
/// combination of sources has been validated.
pub fn compose<'t, S, R, F>(
    target: &'t TargetDefinition,
    sources: ImageSources<S>,
    require_image: bool,
    mut open: F,
) -> Result<TargetImage<'t>>
where
    R: BufRead,
    F: FnMut(&S) -> io::Result<R>,
{
    sources.validate(require_image)?;

    let mut image = TargetImage::new(target);
    let size = target.program_memory_size;

    if let Some(src) = &sources.image {
        image.load(open(src)?, 0, size, SourceKind::Image)?;
    }
    if let Some(config) = sources.config {
        image.set_config(config);
    }

    let split = image.split()?;
    log::debug!(
        "{}: APROM {} bytes, LDROM {} bytes",
        target.name,
        split.program_size,
        split.loader_size
    );

    if split.loader_size == 0 && sources.ldrom.is_some() {
        return Err(Error::Usage(
            "LDROM file given but the configuration does not enable an LDROM".into(),
        ));
    }

    if let Some(src) = &sources.aprom {
        image.memory[..split.program_size].fill(0xFF);
        image.load(open(src)?, 0, split.program_size, SourceKind::Aprom)?;
    }
    if let Some(src) = &sources.ldrom {
        image.memory[split.program_size..].fill(0xFF);
        image.load(
            open(src)?,
            split.program_size,
            split.loader_size,
            SourceKind::Ldrom,
        )?;
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ihex::{write_record, Record};
    use crate::target::N76E003;
    use std::collections::HashMap;

    /// Config selecting a 2 KiB LDROM
    const CONFIG_2K: [u8; 4] = [0xFF, 0xFD, 0xFF, 0xFF];
    /// Config without LDROM
    const CONFIG_0K: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

    fn hex(chunks: &[(u32, &[u8])]) -> String {
        let mut writer = Writer::new(Vec::new());
        for &(address, data) in chunks {
            writer.write(address, data).unwrap();
        }
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    fn files(entries: &[(&'static str, String)]) -> HashMap<&'static str, String> {
        entries.iter().cloned().collect()
    }

    fn compose_files<'a>(
        files: &'a HashMap<&'static str, String>,
        sources: ImageSources<&'static str>,
        require_image: bool,
    ) -> Result<TargetImage<'static>> {
        compose(&N76E003, sources, require_image, |name| {
            files
                .get(name)
                .map(|s| s.as_bytes())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, *name))
        })
    }

    #[test]
    fn test_new_image_is_erased() {
        let image = TargetImage::new(&N76E003);
        assert_eq!(image.memory().len(), 12 * 1024);
        assert!(image.memory().iter().all(|&b| b == 0xFF));
        assert!(image.config().is_empty());
        assert!(matches!(image.split(), Err(Error::NoConfig)));
    }

    #[test]
    fn test_split_with_2k_loader() {
        let mut image = TargetImage::new(&N76E003);
        image.set_config(CONFIG_2K.to_vec());
        let split = image.split().unwrap();
        assert_eq!(split.program_size, 10240);
        assert_eq!(split.loader_size, 2048);
        image.memory_mut()[10240] = 0x42;
        assert_eq!(image.ldrom().unwrap().len(), 12288 - 10240);
        assert_eq!(image.ldrom().unwrap()[0], 0x42);
        assert_eq!(image.aprom().unwrap().len(), 10240);
    }

    #[test]
    fn test_load_captures_config_block() {
        let mut image = TargetImage::new(&N76E003);
        let text = hex(&[(0x0003_0000, &CONFIG_2K), (0x100, &[1, 2, 3])]);
        image
            .load(text.as_bytes(), 0, 12 * 1024, SourceKind::Image)
            .unwrap();
        assert_eq!(image.config(), CONFIG_2K);
        assert_eq!(&image.memory()[0x100..0x103], [1, 2, 3]);
    }

    #[test]
    fn test_load_out_of_range() {
        let mut image = TargetImage::new(&N76E003);
        // One record straddling the end of APROM
        let mut text = Vec::new();
        write_record(&mut text, &Record::data(0x2FFF, &[1, 2])).unwrap();
        write_record(&mut text, &Record::end_of_file()).unwrap();
        let err = image
            .load(text.as_slice(), 0, 12 * 1024, SourceKind::Aprom)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfRange {
                address: 0x2FFF,
                len: 2,
                kind: SourceKind::Aprom
            }
        ));
        assert!(err.to_string().contains("aprom"));
    }

    #[test]
    fn test_compose_usage_errors_before_io() {
        let opened = std::cell::Cell::new(false);
        let open = |_: &&str| -> io::Result<&'static [u8]> {
            opened.set(true);
            Ok(b"")
        };

        let none = ImageSources::<&str>::default();
        assert!(matches!(
            compose(&N76E003, none, true, open),
            Err(Error::Usage(_))
        ));

        let all = ImageSources {
            image: Some("i"),
            aprom: Some("a"),
            ldrom: Some("l"),
            config: None,
        };
        assert!(matches!(
            compose(&N76E003, all, true, open),
            Err(Error::Usage(_))
        ));
        assert!(!opened.get());
    }

    #[test]
    fn test_compose_config_only() {
        let sources = ImageSources::<&str> {
            config: Some(CONFIG_2K.to_vec()),
            ..Default::default()
        };
        let image = compose_files(&HashMap::new(), sources, false).unwrap();
        assert_eq!(image.config(), CONFIG_2K);
    }

    #[test]
    fn test_compose_requires_config() {
        let files = files(&[("a.ihx", hex(&[(0, &[0xAA])]))]);
        let sources = ImageSources {
            aprom: Some("a.ihx"),
            ..Default::default()
        };
        assert!(matches!(
            compose_files(&files, sources, true),
            Err(Error::NoConfig)
        ));
    }

    #[test]
    fn test_compose_aprom_and_ldrom() {
        let files = files(&[
            ("a.ihx", hex(&[(0, &[0xAA; 40])])),
            ("l.ihx", hex(&[(0, &[0xBB; 4])])),
        ]);
        let sources = ImageSources {
            aprom: Some("a.ihx"),
            ldrom: Some("l.ihx"),
            config: Some(CONFIG_2K.to_vec()),
            ..Default::default()
        };
        let image = compose_files(&files, sources, true).unwrap();
        let aprom = image.aprom().unwrap();
        let ldrom = image.ldrom().unwrap();
        assert_eq!(&aprom[..40], [0xAA; 40]);
        assert_eq!(aprom[40], 0xFF);
        assert_eq!(&ldrom[..4], [0xBB; 4]);
        assert_eq!(ldrom.len(), 2048);
        assert_eq!(image.memory()[10240], 0xBB);
    }

    #[test]
    fn test_compose_ldrom_bound() {
        let files = files(&[("l.ihx", hex(&[(0x07FF, &[1, 2])]))]);
        let sources = ImageSources {
            ldrom: Some("l.ihx"),
            config: Some(CONFIG_2K.to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            compose_files(&files, sources, true),
            Err(Error::OutOfRange {
                kind: SourceKind::Ldrom,
                ..
            })
        ));
    }

    #[test]
    fn test_compose_ldrom_without_loader_region() {
        let files = files(&[("l.ihx", hex(&[(0, &[1])]))]);
        let sources = ImageSources {
            ldrom: Some("l.ihx"),
            config: Some(CONFIG_0K.to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            compose_files(&files, sources, true),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_compose_aprom_replaces_image_region() {
        let mut memory = vec![0x11u8; 12 * 1024];
        memory[11000] = 0x22;
        let files = files(&[
            ("full.ihx", hex(&[(0x0003_0000, &CONFIG_2K), (0, &memory)])),
            ("a.ihx", hex(&[(0, &[0x33])])),
        ]);
        let sources = ImageSources {
            image: Some("full.ihx"),
            aprom: Some("a.ihx"),
            ..Default::default()
        };
        let image = compose_files(&files, sources, true).unwrap();
        assert_eq!(image.memory()[0], 0x33);
        assert_eq!(image.memory()[1], 0xFF);
        assert_eq!(image.memory()[10239], 0xFF);
        // LDROM from the full image survives
        assert_eq!(image.memory()[11000], 0x22);
    }

    #[test]
    fn test_explicit_config_overrides_image() {
        let files = files(&[("full.ihx", hex(&[(0x0003_0000, &CONFIG_2K)]))]);
        let sources = ImageSources {
            image: Some("full.ihx"),
            config: Some(CONFIG_0K.to_vec()),
            ..Default::default()
        };
        let image = compose_files(&files, sources, true).unwrap();
        assert_eq!(image.split().unwrap().loader_size, 0);
    }

    #[test]
    fn test_write_hex_then_compose() {
        let mut image = TargetImage::new(&N76E003);
        image.set_config(CONFIG_2K.to_vec());
        {
            let (aprom, ldrom) = image.regions_mut().unwrap();
            aprom[0] = 0x01;
            ldrom[0] = 0x02;
        }
        let out = String::from_utf8(image.write_hex(Vec::new()).unwrap()).unwrap();
        assert!(out.starts_with(":020000040003F7\n:04000000FFFDFFFF"));
        assert!(out.ends_with(":00000001FF\n"));

        let files = files(&[("out.ihx", out)]);
        let sources = ImageSources {
            image: Some("out.ihx"),
            ..Default::default()
        };
        let again = compose_files(&files, sources, true).unwrap();
        assert_eq!(again.config(), CONFIG_2K);
        assert_eq!(again.memory(), image.memory());
    }

    #[test]
    fn test_write_region_hex() {
        let out = write_region_hex(Vec::new(), &[0xAB; 8]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ":08000000ABABABABABABABABA0\n:00000001FF\n"
        );
    }
}
