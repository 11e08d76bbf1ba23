//! Incremental analysis engine for the Rill language server.
//!
//! The engine keeps every open document's text, syntax tree and symbol
//! table current as edits stream in, and answers editor queries against
//! the last consistent state:
//!
//! - **Document Store** ([`document`]): versioned text per URI
//! - **Incremental Parser Adapter** ([`reparse`]): relexes a token or
//!   reparses a block instead of the whole file when it can
//! - **Semantic Index** ([`index`]): scopes, symbols, references, exports
//! - **Diagnostics Aggregator** ([`diagnostics`]): merged, debounced sets
//! - **Analysis Session** ([`session`]): ties it together and owns the
//!   per-document `Clean -> Dirty -> Analyzing` state machine
//!
//! All offsets are UTF-8 byte offsets. Conversion to editor positions
//! happens at the protocol boundary through [`rill_common::LineIndex`].

pub mod cancel;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod index;
pub mod reparse;
pub mod session;

pub use cancel::{CancellationToken, Cancelled};
pub use completion::{CompletionCandidate, CompletionKind};
pub use config::AnalysisConfig;
pub use diagnostics::{
    Diagnostic, Publication, SemanticDiagnostic, SemanticDiagnosticKind, Severity,
    SyntaxDiagnostic, SyntaxDiagnosticKind,
};
pub use document::{EditDelta, TextEdit, VersionedEdit};
pub use error::{AnalysisError, ConfigError, EditError, ProtocolError};
pub use index::{
    HoverInfo, Location, OutlineItem, Symbol, SymbolId, SymbolKind, WorkspaceSymbol,
};
pub use reparse::{ReparseStats, ReparseStrategy, SyntaxTree};
pub use session::{
    AnalysisOutcome, AnalysisSession, DocState, DuePublication, SessionStats, Snapshot,
};
