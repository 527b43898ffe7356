//! `image merge` and `image split` commands

use std::io::Write;

use nuflash_core::image::{compose, write_region_hex, ImageSources};
use nuflash_core::target::TargetDefinition;
use nuflash_core::{Error, Result};

use crate::cli::ImageArgs;
use crate::files::{self, Output};

/// Compose the inputs and write one composite image
pub fn cmd_merge(target: &TargetDefinition, input: ImageArgs, output: &str) -> Result<()> {
    let sources = super::image_sources(target, input, true)?;
    let image = compose(target, sources, true, |path: &String| files::open_read(path))?;
    image.write_hex(Output::create(output)?)?.commit()?;
    Ok(())
}

/// Write the parts of a composite image to separate files
pub fn cmd_split(
    target: &TargetDefinition,
    image_path: String,
    config: Option<&str>,
    aprom: Option<&str>,
    ldrom: Option<&str>,
) -> Result<()> {
    let sources = ImageSources {
        image: Some(image_path),
        ..Default::default()
    };
    let image = compose(target, sources, true, |path: &String| files::open_read(path))?;

    if let Some(path) = config {
        if image.config().is_empty() {
            return Err(Error::NoConfig);
        }
        let document = target.config.render_document(&image.decoded_config()?)?;
        let mut out = Output::create(path)?;
        out.write_all(document.as_bytes())?;
        out.commit()?;
    }

    if let Some(path) = aprom {
        write_region_hex(Output::create(path)?, image.aprom()?)?.commit()?;
    }
    if let Some(path) = ldrom {
        write_region_hex(Output::create(path)?, image.ldrom()?)?.commit()?;
    }
    Ok(())
}
