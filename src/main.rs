//! nuflash - Flash programmer for Nuvoton 8051 microcontrollers
//!
//! Programs and reads N76E003-class devices through a Nu-Link in-circuit
//! programmer, and merges, splits and inspects Intel HEX images offline.
//!
//! # Architecture
//!
//! - `nuflash-core` handles HEX files, target definitions, configuration
//!   bytes and image composition
//! - `nuflash-nulink` speaks the Nu-Link protocol over USB
//! - this binary parses the command line and wires files to both

mod cli;
mod commands;
mod files;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands, ImageCommands};
use nuflash_core::target::{TargetDefinition, TargetRegistry};
use nuflash_core::Error;

/// Resolve the `-t` option against the target catalog
fn select_target<'r>(
    registry: &'r TargetRegistry,
    name: Option<&str>,
) -> Result<&'r TargetDefinition, Error> {
    let name = name.ok_or_else(|| {
        Error::Usage("target device not specified (use -t, see `nuflash targets`)".into())
    })?;
    registry.require(name)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let registry = TargetRegistry::builtin();
    let target = || select_target(&registry, cli.target.as_deref());

    match cli.command {
        Commands::Targets => {
            commands::targets::list_targets(&registry);
            Ok(())
        }
        #[cfg(feature = "usb")]
        Commands::Devices => commands::devices::list_devices(),
        #[cfg(feature = "usb")]
        Commands::Program { input, verify } => {
            commands::program::run_program(target()?, input, verify)
        }
        #[cfg(feature = "usb")]
        Commands::Read { output } => commands::read::run_read(target()?, &output),
        #[cfg(not(feature = "usb"))]
        Commands::Devices | Commands::Program { .. } | Commands::Read { .. } => {
            Err("nuflash was built without USB support".into())
        }
        Commands::Image(subcmd) => match subcmd {
            ImageCommands::Merge { input, output } => {
                commands::image::cmd_merge(target()?, input, &output)?;
                Ok(())
            }
            ImageCommands::Split {
                image,
                config,
                aprom,
                ldrom,
            } => {
                commands::image::cmd_split(
                    target()?,
                    image,
                    config.as_deref(),
                    aprom.as_deref(),
                    ldrom.as_deref(),
                )?;
                Ok(())
            }
        },
        Commands::Config(subcmd) => match subcmd {
            ConfigCommands::Decode { image, config } => {
                let document = commands::config::decode(target()?, image, config.as_deref())?;
                print!("{}", document);
                Ok(())
            }
            ConfigCommands::Encode { config } => {
                println!("{}", commands::config::encode(target()?, &config)?);
                Ok(())
            }
        },
    }
}
