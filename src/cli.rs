//! CLI argument parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nuflash")]
#[command(author, version, about = "Nuvoton 8051 flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Target device, e.g. N76E003 (see `nuflash targets`)
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Image inputs shared by `program` and `image merge`
///
/// At most two of image, APROM and LDROM may be given. `-` reads from stdin.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// Complete image file, e.g. image.ihx
    #[arg(short, long)]
    pub image: Option<String>,

    /// APROM file, e.g. aprom.ihx
    #[arg(short, long)]
    pub aprom: Option<String>,

    /// LDROM file, e.g. ldrom.ihx
    #[arg(short, long)]
    pub ldrom: Option<String>,

    /// Configuration bytes as hex (e.g. 7FFBFFFF), @config.toml, or an inline
    /// document such as "{ ldrom_size = \"2kb\" }"
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected programmers and their firmware versions
    Devices,

    /// List supported target devices
    Targets,

    /// Program a target device
    Program {
        #[command(flatten)]
        input: ImageArgs,

        /// Read back and compare after programming
        #[arg(long)]
        verify: bool,
    },

    /// Read device flash contents into a HEX image
    Read {
        /// Output file, e.g. dump.ihx (`-` for stdout)
        output: String,
    },

    /// Image file operations
    #[command(subcommand)]
    Image(ImageCommands),

    /// Configuration byte operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Image subcommands
#[derive(Subcommand)]
pub enum ImageCommands {
    /// Merge configuration, APROM and LDROM into a composite image
    Merge {
        #[command(flatten)]
        input: ImageArgs,

        /// Output file, e.g. image.ihx (`-` for stdout)
        #[arg(short, long)]
        output: String,
    },

    /// Split an image into APROM, LDROM and configuration
    Split {
        /// Composite image file
        #[arg(short, long)]
        image: String,

        /// Write the decoded configuration as TOML
        #[arg(short, long)]
        config: Option<String>,

        /// Write the APROM region
        #[arg(short, long)]
        aprom: Option<String>,

        /// Write the LDROM region
        #[arg(short, long)]
        ldrom: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Decode configuration bytes from an image or argument into TOML
    Decode {
        /// Image file containing configuration bytes
        #[arg(short, long)]
        image: Option<String>,

        /// Configuration bytes as hex or @config.toml (overrides the image)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the canonical configuration bytes as hex
    Encode {
        /// Configuration bytes as hex or @config.toml
        #[arg(short, long)]
        config: String,
    },
}
