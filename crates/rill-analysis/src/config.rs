//! Analysis configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the `[analysis]`
//! table of `rill.toml` in the workspace root, and the client's LSP
//! `initializationOptions`.

use std::path::Path;
use std::time::Duration;

use rill_common::PositionEncoding;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::reparse::ReparsePolicy;

/// Name of the per-workspace configuration file.
pub const CONFIG_FILE: &str = "rill.toml";

/// Engine policy knobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Quiet period after the last edit before diagnostics are published.
    pub debounce_ms: u64,
    /// An edit replacing more than this fraction of the document triggers
    /// a full reparse.
    pub full_reparse_threshold: f64,
    /// Completion lists are truncated to this many items.
    pub max_completion_items: usize,
    /// Position encoding to pick when the client offers it.
    pub preferred_position_encoding: Option<PositionEncoding>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            full_reparse_threshold: 0.5,
            max_completion_items: 200,
            preferred_position_encoding: None,
        }
    }
}

/// The parts of `rill.toml` this crate reads. Other tables are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    analysis: AnalysisConfig,
}

/// Partial settings from `initializationOptions`.
#[derive(Debug, Default, Deserialize)]
struct Overrides {
    debounce_ms: Option<u64>,
    full_reparse_threshold: Option<f64>,
    max_completion_items: Option<usize>,
    preferred_position_encoding: Option<PositionEncoding>,
}

impl AnalysisConfig {
    pub const MAX_DEBOUNCE_MS: u64 = 10_000;

    /// Parse the contents of a `rill.toml`.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.analysis.validate()?;
        Ok(file.analysis)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Read `rill.toml` from `root`, or the defaults if there is none.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply LSP `initializationOptions` on top of `self`. Accepts either
    /// `{ "analysis": { ... } }` or the settings object itself.
    pub fn with_overrides(&self, options: &serde_json::Value) -> Result<Self, ConfigError> {
        let section = options.get("analysis").unwrap_or(options);
        if section.is_null() {
            return Ok(self.clone());
        }
        let overrides = Overrides::deserialize(section)?;
        let mut merged = self.clone();
        if let Some(ms) = overrides.debounce_ms {
            merged.debounce_ms = ms;
        }
        if let Some(threshold) = overrides.full_reparse_threshold {
            merged.full_reparse_threshold = threshold;
        }
        if let Some(limit) = overrides.max_completion_items {
            merged.max_completion_items = limit;
        }
        if overrides.preferred_position_encoding.is_some() {
            merged.preferred_position_encoding = overrides.preferred_position_encoding;
        }
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.full_reparse_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Threshold(threshold));
        }
        if self.debounce_ms > Self::MAX_DEBOUNCE_MS {
            return Err(ConfigError::Debounce {
                got: self.debounce_ms,
                max: Self::MAX_DEBOUNCE_MS,
            });
        }
        if self.max_completion_items == 0 {
            return Err(ConfigError::CompletionLimit);
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reparse_policy(&self) -> ReparsePolicy {
        ReparsePolicy {
            full_reparse_threshold: self.full_reparse_threshold,
        }
    }
}
