//! `config decode` and `config encode` commands

use nuflash_core::image::{compose, ImageSources};
use nuflash_core::target::TargetDefinition;
use nuflash_core::{Error, Result};

use crate::files;

/// Decode configuration bytes into a TOML document
///
/// Explicit configuration bytes take precedence over the ones in `image`.
pub fn decode(target: &TargetDefinition, image: Option<String>, config: Option<&str>) -> Result<String> {
    let sources = ImageSources {
        image,
        config: config
            .map(|arg| files::parse_config_arg(target, arg))
            .transpose()?,
        ..Default::default()
    };
    if sources.image.is_none() && sources.config.is_none() {
        return Err(Error::Usage("no configuration specified".into()));
    }

    let image = compose(target, sources, false, |path: &String| files::open_read(path))?;
    target.config.render_document(&image.decoded_config()?)
}

/// Canonical hex form of a configuration argument
pub fn encode(target: &TargetDefinition, config: &str) -> Result<String> {
    let bytes = files::parse_config_arg(target, config)?;
    let canonical = target.config.encode(&target.config.decode(&bytes)?)?;
    Ok(canonical.iter().map(|b| format!("{:02X}", b)).collect())
}
