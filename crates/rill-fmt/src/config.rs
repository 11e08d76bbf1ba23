//! Loading [`FormatConfig`] from the `[format]` table of `rill.toml`.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::FormatConfig;

/// Name of the per-workspace configuration file.
pub const CONFIG_FILE: &str = "rill.toml";

#[derive(Debug, Error)]
pub enum FormatConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rill.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("format.indent_size must be between 1 and {max}, got {got}")]
    IndentSize { got: usize, max: usize },

    #[error("format.max_width must be at least 1")]
    MaxWidth,
}

/// The parts of `rill.toml` this crate reads. Other tables are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    format: Option<FormatConfig>,
}

impl FormatConfig {
    pub const MAX_INDENT_SIZE: usize = 16;

    /// The `[format]` table of a `rill.toml`, if it has one. Keys the table
    /// leaves out keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Option<Self>, FormatConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        if let Some(config) = &file.format {
            config.validate()?;
        }
        Ok(file.format)
    }

    /// Read `[format]` from `root`'s `rill.toml`. `None` without the file
    /// or the table.
    pub fn load(root: &Path) -> Result<Option<Self>, FormatConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| FormatConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), FormatConfigError> {
        if self.indent_size == 0 || self.indent_size > Self::MAX_INDENT_SIZE {
            return Err(FormatConfigError::IndentSize {
                got: self.indent_size,
                max: Self::MAX_INDENT_SIZE,
            });
        }
        if self.max_width == 0 {
            return Err(FormatConfigError::MaxWidth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_table_overrides_defaults() {
        let content = "[analysis]\ndebounce_ms = 5\n\n[format]\nindent_size = 4\n";
        let config = FormatConfig::from_toml_str(content).unwrap().unwrap();
        assert_eq!(
            config,
            FormatConfig {
                indent_size: 4,
                max_width: 100,
            }
        );
    }

    #[test]
    fn missing_table_or_file_is_none() {
        assert_eq!(FormatConfig::from_toml_str("[analysis]\n").unwrap(), None);

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FormatConfig::load(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join(CONFIG_FILE), "[format]\nmax_width = 60\n").unwrap();
        let loaded = FormatConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.max_width, 60);
        assert_eq!(loaded.indent_size, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = FormatConfig::from_toml_str("[format]\nindent_size = 0\n").unwrap_err();
        assert_eq!(err.to_string(), "format.indent_size must be between 1 and 16, got 0");
        assert!(matches!(
            FormatConfig::from_toml_str("[format]\nmax_width = 0\n"),
            Err(FormatConfigError::MaxWidth)
        ));
        assert!(matches!(
            FormatConfig::from_toml_str("[format]\nindent_size = \"wide\"\n"),
            Err(FormatConfigError::Toml(_))
        ));
    }

    #[test]
    fn loaded_config_drives_the_printer() {
        let config = FormatConfig::from_toml_str("[format]\nindent_size = 4\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            crate::format_source("fn add(a,b){a+b}", &config),
            "fn add(a, b) {\n    a + b\n}\n"
        );
    }
}
