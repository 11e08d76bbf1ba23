//! Rill Language Server Protocol (LSP) implementation.
//!
//! This crate puts the incremental analysis engine of `rill-analysis`
//! behind the LSP protocol, giving editors live feedback on Rill code:
//!
//! - **Diagnostics**: syntax and semantic errors, debounced per document
//! - **Hover**: declaration signature of the name under the cursor
//! - **Go-to-definition** and **find references**
//! - **Completion**: scope-aware names, workspace exports, keywords
//! - **Symbols**: document outline and workspace-wide search
//! - **Formatting**: whole-document formatting through `rill-fmt`
//!
//! The server communicates via stdin/stdout using JSON-RPC, powered by the
//! `tower-lsp` framework. Reanalysis and diagnostic publication run as
//! background tasks (see [`worker`]) so notifications return immediately.

pub mod convert;
pub mod server;
pub mod worker;

use rill_analysis::AnalysisConfig;
use tower_lsp::{LspService, Server};

use server::RillBackend;

/// Run the Rill LSP server on stdin/stdout.
///
/// This is the main entry point called by `rill lsp`. `config` applies
/// until the client's `initialize` names a workspace with its own
/// `rill.toml`. Runs until the client disconnects.
pub async fn run_server(config: AnalysisConfig) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| RillBackend::new(client, config));
    Server::new(stdin, stdout, socket).serve(service).await;
}
