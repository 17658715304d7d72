//! Tracing subscriber setup for the `dexter` binary

use tracing_subscriber::EnvFilter;

use crate::config::LoggingEnvConfig;
use crate::error::Error;

const DEFAULT_LEVEL: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!(
                "Invalid log format '{}'. Must be one of: compact, pretty, json",
                other
            ))),
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then the configured level
pub fn env_filter(logging: &LoggingEnvConfig) -> Result<EnvFilter, Error> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = logging.level.as_deref().unwrap_or(DEFAULT_LEVEL);
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", level, e)))
}

/// Install the global subscriber; logs go to stderr so command output stays clean
pub fn init(logging: &LoggingEnvConfig) -> Result<(), Error> {
    let filter = env_filter(logging)?;
    let format = match logging.format.as_deref() {
        Some(format) => format.parse()?,
        None => LogFormat::Compact,
    };
    let ansi = logging.enable_colors.unwrap_or(true);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi);

    let result = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let logging = LoggingEnvConfig {
            level: Some("warn,dexter_sdk=debug".to_string()),
            ..Default::default()
        };
        assert!(env_filter(&logging).is_ok());
    }
}
