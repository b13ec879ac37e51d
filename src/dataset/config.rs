// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-handle configuration.
//!
//! Every reader and writer carries its own [`DatasetConfig`]; there is no
//! process-wide state. The config can be built in code or loaded from TOML:
//!
//! ```toml
//! recover = true
//! strict_keywords = false
//! gzip_level = 9
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Result, SddsError};
use crate::io::MIN_BUFFER_SIZE;

/// Default I/O buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Behavior switches shared by readers and writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Report a damaged trailing page as truncated instead of failing.
    pub recover: bool,
    /// Treat unknown header keywords as errors instead of warnings.
    pub strict_keywords: bool,
    /// Accept field names outside the usual naming rule.
    pub allow_any_name: bool,
    /// Channel buffer size in bytes
    pub buffer_size: usize,
    /// gzip level used when compression is inferred from the file name
    pub gzip_level: u32,
    /// xz preset used when compression is inferred from the file name
    pub xz_level: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            recover: false,
            strict_keywords: false,
            allow_any_name: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            gzip_level: 6,
            xz_level: 6,
        }
    }
}

impl DatasetConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DatasetConfig = toml::from_str(text)
            .map_err(|e| SddsError::invalid_attribute("config", "toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SddsError::channel_open(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Set recover mode.
    pub fn with_recover(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    /// Set strict keyword handling.
    pub fn with_strict_keywords(mut self, strict: bool) -> Self {
        self.strict_keywords = strict;
        self
    }

    /// Lift the field naming rule.
    pub fn with_allow_any_name(mut self, allow: bool) -> Self {
        self.allow_any_name = allow;
        self
    }

    /// Set the channel buffer size, raised to [`MIN_BUFFER_SIZE`] if smaller.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(SddsError::invalid_attribute(
                "config",
                "buffer_size",
                format!("{} is below the minimum of {MIN_BUFFER_SIZE}", self.buffer_size),
            ));
        }
        for (name, level) in [("gzip_level", self.gzip_level), ("xz_level", self.xz_level)] {
            if level > 9 {
                return Err(SddsError::invalid_attribute(
                    "config",
                    name,
                    format!("{level} is outside 0..=9"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatasetConfig::new();
        assert!(!config.recover);
        assert!(!config.strict_keywords);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = DatasetConfig::from_toml_str("recover = true\ngzip_level = 9\n").unwrap();
        assert!(config.recover);
        assert_eq!(config.gzip_level, 9);
        assert_eq!(config.xz_level, 6);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(DatasetConfig::from_toml_str("gzip_level = 12").is_err());
        assert!(DatasetConfig::from_toml_str("buffer_size = 0").is_err());
        assert!(DatasetConfig::from_toml_str("buffer_size = 16").is_err());
        assert!(DatasetConfig::from_toml_str("recover = \"yes\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdds.toml");
        std::fs::write(&path, "strict_keywords = true\n").unwrap();
        let config = DatasetConfig::from_file(&path).unwrap();
        assert!(config.strict_keywords);

        let err = DatasetConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, SddsError::ChannelOpen { .. }));
    }

    #[test]
    fn test_fluent_setters() {
        let config = DatasetConfig::new()
            .with_recover(true)
            .with_allow_any_name(true)
            .with_buffer_size(4096);
        assert!(config.recover);
        assert!(config.allow_any_name);
        assert_eq!(config.buffer_size, 4096);
    }

    #[test]
    fn test_zero_buffer_size_still_reads() {
        let config = DatasetConfig::new().with_buffer_size(0);
        assert_eq!(config.buffer_size, MIN_BUFFER_SIZE);

        let text = "SDDS1\n&column name=x, type=long, &end\n&data mode=ascii, &end\n2\n1\n2\n";
        for config in [
            config,
            DatasetConfig {
                buffer_size: 0,
                ..DatasetConfig::default()
            },
        ] {
            let mut reader = crate::DatasetReader::from_reader(
                "mem",
                std::io::Cursor::new(text.as_bytes().to_vec()),
                config,
            )
            .unwrap();
            let pages: Vec<_> = reader.pages().collect::<Result<_>>().unwrap();
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].rows(), 2);
        }
    }
}
