use clap::{Parser, Subcommand, ValueEnum};
use mediaconv_common::ConversionTarget;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaconv")]
#[command(author, version, about = "Move media payloads between database blobs and files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the media below one or more items
    Convert {
        /// Where the media should end up
        #[arg(short, long, value_enum)]
        target: Target,

        /// User the conversion runs as
        #[arg(short, long)]
        user: String,

        /// Descend into the children of every reference
        #[arg(short, long)]
        recursive: bool,

        /// Items to convert, as `item://<db>/<id>[?ver=N]` or `<db>:<path>`
        #[arg(required = true)]
        references: Vec<String>,
    },

    /// Show the persisted status of the latest job with a name
    Status {
        /// Job name
        #[arg(default_value = "MediaConversion")]
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete prior storage locations that are no longer referenced
    Purge {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    File,
    Database,
}

impl From<Target> for ConversionTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::File => ConversionTarget::File,
            Target::Database => ConversionTarget::Database,
        }
    }
}
