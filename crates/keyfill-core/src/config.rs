use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::error::{KeyfillError, KeyfillResult};

/// Default generation/verification granularity in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Default capacity of the buffered reader/writer wrapping each file
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyfillConfig {
    pub stream: StreamConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Block size for generation and verification (default: 16).
    /// Writer and verifier must agree on it.
    pub block_size: usize,
    /// Buffered I/O capacity in bytes (default: 64 KiB)
    pub buffer_size: usize,
    /// fsync written files before reporting success (default: true)
    pub fsync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            fsync: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl StreamConfig {
    /// The configured block size, rejected if zero.
    pub fn block_size(&self) -> KeyfillResult<NonZeroUsize> {
        NonZeroUsize::new(self.block_size)
            .ok_or_else(|| KeyfillError::Config("stream.block_size must be positive".into()))
    }

    /// The configured buffer size; zero falls back to the default.
    pub fn buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size
        }
    }
}

impl KeyfillConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(content: &str) -> KeyfillResult<Self> {
        let config: KeyfillConfig =
            toml::from_str(content).map_err(|e| KeyfillError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KeyfillResult<()> {
        self.stream.block_size()?;
        match self.log.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(KeyfillError::Config(format!(
                "log.format must be \"text\" or \"json\", got \"{other}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[stream]
block_size = 4096
buffer_size = 1048576
fsync = false

[log]
level = "debug"
format = "json"
"#;
        let config = KeyfillConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.stream.block_size().unwrap().get(), 4096);
        assert_eq!(config.stream.buffer_size(), 1048576);
        assert!(!config.stream.fsync);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = KeyfillConfig::from_toml("").unwrap();

        assert_eq!(config.stream.block_size().unwrap().get(), 16);
        assert_eq!(config.stream.buffer_size(), DEFAULT_BUFFER_SIZE);
        assert!(config.stream.fsync);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[stream]
block_size = 512
"#;
        let config = KeyfillConfig::from_toml(toml_str).unwrap();

        // Overridden
        assert_eq!(config.stream.block_size, 512);
        // Defaults
        assert!(config.stream.fsync);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = KeyfillConfig::from_toml("[stream]\nblock_size = 0\n").unwrap_err();
        assert!(matches!(err, KeyfillError::Config(_)));
    }

    #[test]
    fn test_zero_buffer_size_falls_back() {
        let config = KeyfillConfig::from_toml("[stream]\nbuffer_size = 0\n").unwrap();
        assert_eq!(config.stream.buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let err = KeyfillConfig::from_toml("[log]\nformat = \"xml\"\n").unwrap_err();
        assert!(err.to_string().contains("log.format"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = KeyfillConfig::from_toml("[stream\n").unwrap_err();
        assert!(matches!(err, KeyfillError::Config(_)));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = KeyfillConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = KeyfillConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.stream.block_size, parsed.stream.block_size);
        assert_eq!(config.stream.buffer_size, parsed.stream.buffer_size);
        assert_eq!(config.log.format, parsed.log.format);
    }
}
