//! Error types for the analysis engine.
//!
//! Only protocol misuse is an error. Syntax and semantic problems in the
//! analyzed code are diagnostics (see [`crate::diagnostics`]), and a
//! failure inside the grammar is absorbed by the reparse adapter.

use thiserror::Error;
use url::Url;

/// A document edit that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// `open` for a URI that is already tracked.
    #[error("document {0} is already open")]
    DuplicateDocument(Url),

    /// Edit or close for a URI that is not tracked.
    #[error("document {0} is not open")]
    UnknownDocument(Url),

    /// The edit's base version is not the stored version, or its target
    /// version does not move forward.
    #[error(
        "version conflict for {uri}: document is at version {stored}, edit expects {base:?} and targets {target}"
    )]
    VersionConflict {
        uri: Url,
        stored: i32,
        base: Option<i32>,
        target: i32,
    },

    /// A delta range outside the text or not on a character boundary.
    #[error("edit range {start}..{end} is out of bounds for {uri} (length {len})")]
    RangeOutOfBounds {
        uri: Url,
        start: u32,
        end: u32,
        len: u32,
    },
}

/// A malformed or out-of-order request from the protocol layer. Reported
/// back to the caller; never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Edit(#[from] EditError),

    /// A line/character position that does not exist in the document.
    #[error("position {line}:{character} is outside {uri}")]
    InvalidPosition {
        uri: Url,
        line: u32,
        character: u32,
    },
}

/// The grammar itself failed (panicked) while parsing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parser failure: {message}")]
pub struct AnalysisError {
    pub message: String,
}

/// Invalid analysis configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rill.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid initialization options: {0}")]
    Json(#[from] serde_json::Error),

    #[error("full_reparse_threshold must be in (0, 1], got {0}")]
    Threshold(f64),

    #[error("debounce_ms must be at most {max}, got {got}")]
    Debounce { got: u64, max: u64 },

    #[error("max_completion_items must be at least 1")]
    CompletionLimit,
}
