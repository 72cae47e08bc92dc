use std::path::PathBuf;

use crate::config::{parse_extension, parse_log_level, Options};
use anyhow::{Context, Result};
use clap::Parser;

/// Inspect RIFF, RIFX and XNB wave containers
#[derive(Parser, Debug, Default)]
#[command(name = "riffinfo")]
#[command(version = "0.8.0")]
#[command(about = "Print the stream layout, sample count and loop of game wave files", long_about = None)]
pub struct Cli {
    /// Files to inspect
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Treat every file as having this extension (e.g., sns, mwv)
    #[arg(short, long, value_name = "EXT")]
    pub ext: Option<String>,

    /// Log verbosity (nothing, user, error, warning, info, debug, all or 0-6)
    #[arg(short, long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Show the per-channel cursors
    #[arg(short, long)]
    pub channels: bool,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref ext) = self.ext {
            opts.extension = Some(parse_extension(ext).context("Invalid extension")?);
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = parse_log_level(level)?;
        }

        if self.channels {
            opts.show_channels = true;
        }

        Ok(opts)
    }
}
