//! CLI command implementations
//!
//! Commands that talk to a programmer (`devices`, `program`, `read`) need the
//! `usb` feature; image and configuration commands work offline.

pub mod config;
#[cfg(feature = "usb")]
pub mod devices;
pub mod image;
#[cfg(feature = "usb")]
pub mod program;
#[cfg(feature = "usb")]
mod progress;
#[cfg(feature = "usb")]
pub mod read;
pub mod targets;

use nuflash_core::image::ImageSources;
use nuflash_core::target::TargetDefinition;
use nuflash_core::Result;

use crate::cli::ImageArgs;
use crate::files;

/// Turn image arguments into composer inputs
///
/// The combination of inputs is checked before the configuration argument
/// is parsed, so usage errors win over unreadable `@file` documents.
pub fn image_sources(
    target: &TargetDefinition,
    args: ImageArgs,
    require_image: bool,
) -> Result<ImageSources<String>> {
    let mut sources = ImageSources {
        image: args.image,
        aprom: args.aprom,
        ldrom: args.ldrom,
        config: None,
    };
    sources.validate(require_image)?;

    sources.config = args
        .config
        .as_deref()
        .map(|arg| files::parse_config_arg(target, arg))
        .transpose()?;
    Ok(sources)
}
