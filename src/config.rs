use anyhow::{Context, Result};

use crate::logging::LogLevel;
use crate::sound::ParseOptions;

/// Settings of the `riffinfo` tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub log_level: LogLevel,
    /// Extension to assume for every input instead of its own
    pub extension: Option<String>,
    /// Print the per-channel cursor table
    pub show_channels: bool,
}

impl Options {
    /// Parser settings derived from these options
    pub fn parse_options(&self) -> ParseOptions {
        match &self.extension {
            Some(ext) => ParseOptions::new().with_extension(ext.clone()),
            None => ParseOptions::new(),
        }
    }
}

/// Parse a log level given either by name or as its number (0-6)
pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    let level = match s.to_lowercase().as_str() {
        "nothing" | "off" | "none" => LogLevel::Nothing,
        "user" => LogLevel::User,
        "error" => LogLevel::Error,
        "warning" | "warn" => LogLevel::Warning,
        "info" => LogLevel::Info,
        "debug" => LogLevel::Debug,
        "all" | "trace" => LogLevel::All,
        other => {
            let n: i32 = other.parse().context("Invalid log level")?;
            if !(0..=6).contains(&n) {
                anyhow::bail!("Log level out of range (0 to 6)");
            }
            LogLevel::from_i32(n)
        }
    };
    Ok(level)
}

/// Normalize an extension override: strip a leading dot and reject empties
pub fn parse_extension(s: &str) -> Result<String> {
    let ext = s.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(&['/', '\\', '.'][..]) {
        anyhow::bail!("Extension must be a bare name like 'wav' or 'sns'");
    }
    Ok(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_names() {
        assert_eq!(parse_log_level("debug").unwrap(), LogLevel::Debug);
        assert_eq!(parse_log_level("WARN").unwrap(), LogLevel::Warning);
        assert_eq!(parse_log_level("off").unwrap(), LogLevel::Nothing);
    }

    #[test]
    fn test_parse_log_level_numbers() {
        assert_eq!(parse_log_level("4").unwrap(), LogLevel::Info);
        assert!(parse_log_level("7").is_err());
        assert!(parse_log_level("-1").is_err());
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_parse_extension() {
        assert_eq!(parse_extension(".SNS").unwrap(), "sns");
        assert_eq!(parse_extension("wav").unwrap(), "wav");
        assert!(parse_extension("").is_err());
        assert!(parse_extension("tar.gz").is_err());
    }

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(opts.log_level, LogLevel::Warning);
        assert!(opts.extension.is_none());
        assert!(!opts.show_channels);
        assert!(opts.parse_options().extension.is_none());
    }

    #[test]
    fn test_parse_options_carry_extension() {
        let opts = Options {
            extension: Some("mwv".to_string()),
            ..Default::default()
        };
        assert_eq!(opts.parse_options().extension.as_deref(), Some("mwv"));
    }
}
