//! Configuration types for warc-framer

use serde::{Deserialize, Serialize};

use crate::reader::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH};
use crate::{Result, WarcError};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Reader settings
    #[serde(default)]
    pub reader: ReaderConfig,
    /// Writer session defaults
    #[serde(default)]
    pub writer: WriterOptions,
}

/// Reader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Bytes read from the source per parser feed
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Longest accepted header line in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Options recognized when a writer session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterOptions {
    /// Append to an existing file instead of truncating it
    #[serde(default)]
    pub appending: bool,
    /// Compress every written block as an independent gzip member
    #[serde(default)]
    pub gzip: bool,
    /// Gzip level, 0-9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

fn default_compression_level() -> u32 {
    6
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            appending: false,
            gzip: false,
            compression_level: default_compression_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WarcError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| WarcError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.reader.chunk_size == 0 {
            return Err(WarcError::Config(
                "reader.chunk_size must be > 0".to_string(),
            ));
        }

        if self.reader.max_line_length == 0 {
            return Err(WarcError::Config(
                "reader.max_line_length must be > 0".to_string(),
            ));
        }

        if self.writer.compression_level > 9 {
            return Err(WarcError::Config(format!(
                "writer.compression_level must be 0-9, got {}",
                self.writer.compression_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            [reader]
            chunk_size = 4096

            [writer]
            gzip = true
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.reader.chunk_size, 4096);
        assert_eq!(config.reader.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert!(config.writer.gzip);
        assert!(!config.writer.appending);
        assert_eq!(config.writer.compression_level, 6);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            [writer]
            appending = true
            compression_level = 9
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.writer.appending);
        assert_eq!(config.writer.compression_level, 9);
    }

    #[test]
    fn test_invalid_config() {
        let config: Config = toml::from_str("[reader]\nchunk_size = 0").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[writer]\ncompression_level = 12").unwrap();
        assert!(matches!(config.validate(), Err(WarcError::Config(_))));
    }
}
