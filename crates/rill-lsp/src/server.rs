//! Tower-lsp Backend implementation for the Rill language server.
//!
//! Implements the LSP `LanguageServer` trait on top of an
//! [`AnalysisSession`]:
//! - textDocument/didOpen, didChange (incremental), didClose
//! - textDocument/hover, definition, references, completion
//! - textDocument/documentSymbol and workspace/symbol
//! - textDocument/formatting
//! - workspace/didChangeWatchedFiles, for `.rill` files no editor has open
//!
//! Notifications only update the document store; reanalysis and
//! diagnostic publication run in the background tasks of [`crate::worker`].
//! Requests are answered from the latest committed snapshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rill_analysis::{
    AnalysisConfig, AnalysisSession, CancellationToken, EditError, ProtocolError, Snapshot,
    VersionedEdit,
};
use rill_common::{LineIndex, PositionEncoding};
use rill_fmt::FormatConfig;
use rill_parser::TextSize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::{self, ErrorCode, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::{convert, worker};

/// The Rill LSP server backend.
pub struct RillBackend {
    client: Client,
    session: Arc<AnalysisSession>,
    /// Used when the client names no workspace root.
    base_config: AnalysisConfig,
    /// Fixed by `initialize`; UTF-16 until then.
    encoding: OnceLock<PositionEncoding>,
    /// The workspace's `[format]` table. Without one, formatting follows
    /// the editor's tab size.
    format: OnceLock<Option<FormatConfig>>,
    /// The client can register file watchers dynamically.
    watch_files: AtomicBool,
    /// Wakes the diagnostics publisher outside its own schedule.
    publish_wake: Arc<Notify>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Problems found during `initialize`, reported once the client is ready.
    startup_warnings: Mutex<Vec<String>>,
}

/// Cancels the token when the request future is dropped, which is how
/// tower-lsp abandons a request on `$/cancelRequest`.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl RillBackend {
    pub fn new(client: Client, config: AnalysisConfig) -> Self {
        Self {
            client,
            session: Arc::new(AnalysisSession::new(config.clone())),
            base_config: config,
            encoding: OnceLock::new(),
            format: OnceLock::new(),
            watch_files: AtomicBool::new(false),
            publish_wake: Arc::new(Notify::new()),
            workers: Mutex::new(Vec::new()),
            startup_warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &Arc<AnalysisSession> {
        &self.session
    }

    pub fn encoding(&self) -> PositionEncoding {
        self.encoding.get().copied().unwrap_or_default()
    }

    /// Configuration for this workspace: `rill.toml` in the root (or the
    /// server's base configuration without a root), then the client's
    /// initialization options.
    fn load_config(&self, params: &InitializeParams) -> AnalysisConfig {
        let mut config = match workspace_root(params) {
            Some(root) => AnalysisConfig::load(&root).unwrap_or_else(|err| {
                self.warn_at_startup(format!("ignoring {}: {err}", root.display()));
                self.base_config.clone()
            }),
            None => self.base_config.clone(),
        };
        if let Some(options) = &params.initialization_options {
            match config.with_overrides(options) {
                Ok(merged) => config = merged,
                Err(err) => self.warn_at_startup(err.to_string()),
            }
        }
        config
    }

    fn load_format_config(&self, params: &InitializeParams) -> Option<FormatConfig> {
        let root = workspace_root(params)?;
        FormatConfig::load(&root).unwrap_or_else(|err| {
            self.warn_at_startup(format!("ignoring [format] in {}: {err}", root.display()));
            None
        })
    }

    fn warn_at_startup(&self, message: String) {
        tracing::warn!("{message}");
        self.startup_warnings.lock().push(message);
    }

    async fn report(&self, err: ProtocolError) {
        self.client
            .log_message(MessageType::WARNING, err.to_string())
            .await;
    }

    /// The committed snapshot of `uri` and `position` converted against it.
    fn locate(&self, uri: &Url, position: Position) -> Option<(Arc<Snapshot>, TextSize)> {
        let snapshot = self.session.snapshot(uri)?;
        let offset = convert::offset(&snapshot.line_index, position, self.encoding())?;
        Some((snapshot, offset))
    }
}

#[allow(deprecated)] // `root_uri` is the fallback for clients without workspace folders
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())
        .and_then(|uri| uri.to_file_path().ok())
}

/// Watch every `.rill` file in the workspace.
fn watched_files_registration() -> Registration {
    let options = DidChangeWatchedFilesRegistrationOptions {
        watchers: vec![FileSystemWatcher {
            glob_pattern: GlobPattern::String("**/*.rill".to_string()),
            kind: None,
        }],
    };
    Registration {
        id: "rill-watched-files".to_string(),
        method: "workspace/didChangeWatchedFiles".to_string(),
        register_options: serde_json::to_value(options).ok(),
    }
}

/// What to publish for a file that changed on disk. `None` when the file
/// is open, since the editor's buffer is authoritative then, or when it
/// cannot be read. A deleted file clears its diagnostics.
fn watched_file_diagnostics(
    session: &AnalysisSession,
    event: &FileEvent,
    encoding: PositionEncoding,
) -> Option<Vec<Diagnostic>> {
    let uri = &event.uri;
    if session.document(uri).is_some() {
        return None;
    }
    if event.typ == FileChangeType::DELETED {
        return Some(Vec::new());
    }
    let path = uri.to_file_path().ok()?;
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(%uri, %err, "cannot read changed file");
            return None;
        }
    };
    let publication = session.check_unopened(uri, &text)?;
    let index = LineIndex::new(&text);
    Some(
        publication
            .diagnostics
            .iter()
            .map(|d| convert::diagnostic(uri, &index, encoding, d))
            .collect(),
    )
}

fn capabilities(encoding: PositionEncoding) -> ServerCapabilities {
    ServerCapabilities {
        position_encoding: Some(convert::encoding_kind(encoding)),
        text_document_sync: Some(TextDocumentSyncCapability::Kind(
            TextDocumentSyncKind::INCREMENTAL,
        )),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        references_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        workspace_symbol_provider: Some(OneOf::Left(true)),
        document_formatting_provider: Some(OneOf::Left(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![".".to_string()]),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for RillBackend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let config = self.load_config(&params);
        let offered = params
            .capabilities
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_deref());
        let encoding = convert::negotiate_encoding(offered, config.preferred_position_encoding);
        if self.encoding.set(encoding).is_err() {
            tracing::warn!("initialize received twice; keeping the first position encoding");
        }
        let format = self.load_format_config(&params);
        let watch_files = params
            .capabilities
            .workspace
            .as_ref()
            .and_then(|workspace| workspace.did_change_watched_files.as_ref())
            .and_then(|watched| watched.dynamic_registration)
            .unwrap_or(false);
        tracing::info!(encoding = ?self.encoding(), ?config, ?format, watch_files, "initializing");
        self.session.set_config(config);
        if self.format.set(format).is_err() {
            tracing::warn!("initialize received twice; keeping the first format settings");
        }
        self.watch_files.store(watch_files, Ordering::Relaxed);

        Ok(InitializeResult {
            capabilities: capabilities(self.encoding()),
            server_info: Some(ServerInfo {
                name: "rill-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        {
            let mut workers = self.workers.lock();
            workers.push(tokio::spawn(worker::reanalysis_loop(
                Arc::clone(&self.session),
                Arc::clone(&self.publish_wake),
            )));
            workers.push(tokio::spawn(worker::publish_loop(
                Arc::clone(&self.session),
                self.client.clone(),
                Arc::clone(&self.publish_wake),
                self.encoding(),
            )));
        }

        if self.watch_files.load(Ordering::Relaxed) {
            let client = self.client.clone();
            tokio::spawn(async move {
                if let Err(err) = client
                    .register_capability(vec![watched_files_registration()])
                    .await
                {
                    tracing::warn!(%err, "file watcher registration failed");
                }
            });
        }

        let warnings = std::mem::take(&mut *self.startup_warnings.lock());
        for warning in warnings {
            self.client.log_message(MessageType::WARNING, warning).await;
        }
        self.client
            .log_message(MessageType::INFO, "Rill LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        for handle in self.workers.lock().drain(..) {
            handle.abort();
        }
        tracing::info!(stats = ?self.session.stats(), "shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        if let Err(err) = self.session.did_open(&doc.uri, doc.text, doc.version) {
            self.report(err).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // Everything up to the store update runs before the first await, so
        // changes are applied in the order the client sent them.
        let result = match self.session.document(&uri) {
            Some(current) => convert::edit_deltas(
                &uri,
                &current.text,
                params.content_changes,
                self.encoding(),
            )
            .and_then(|deltas| {
                self.session.did_change(
                    &uri,
                    &VersionedEdit {
                        base_version: Some(current.version),
                        target_version: params.text_document.version,
                        deltas,
                    },
                )
            }),
            None => Err(EditError::UnknownDocument(uri.clone()).into()),
        };
        if let Err(err) = result {
            self.report(err).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        match self.session.did_close(&params.text_document.uri) {
            Ok(()) => self.publish_wake.notify_one(),
            Err(err) => self.report(err).await,
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let session = Arc::clone(&self.session);
        let encoding = self.encoding();
        let changes = params.changes;
        let checked = tokio::task::spawn_blocking(move || {
            changes
                .iter()
                .filter_map(|event| {
                    let diagnostics = watched_file_diagnostics(&session, event, encoding)?;
                    Some((event.uri.clone(), diagnostics))
                })
                .collect::<Vec<_>>()
        })
        .await;

        match checked {
            Ok(sets) => {
                for (uri, diagnostics) in sets {
                    tracing::debug!(%uri, count = diagnostics.len(), "publishing disk diagnostics");
                    self.client.publish_diagnostics(uri, diagnostics, None).await;
                }
            }
            Err(err) => tracing::error!(%err, "checking changed files failed"),
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some((snapshot, offset)) = self.locate(&position.text_document.uri, position.position)
        else {
            return Ok(None);
        };
        Ok(snapshot
            .file
            .hover_at(offset)
            .map(|info| convert::hover(&snapshot.line_index, self.encoding(), info)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let uri = position.text_document.uri;
        let Some((snapshot, offset)) = self.locate(&uri, position.position) else {
            return Ok(None);
        };
        Ok(snapshot.file.definition_at(offset).map(|range| {
            GotoDefinitionResponse::Scalar(convert::location(
                &uri,
                &snapshot.line_index,
                range,
                self.encoding(),
            ))
        }))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let uri = position.text_document.uri;
        let Some((snapshot, offset)) = self.locate(&uri, position.position) else {
            return Ok(None);
        };
        let Some(symbol) = snapshot.file.symbol_at(offset) else {
            return Ok(None);
        };
        // The declaration comes first.
        let skip = usize::from(!params.context.include_declaration);
        let locations = snapshot
            .file
            .references_to(symbol)
            .into_iter()
            .skip(skip)
            .map(|range| convert::location(&uri, &snapshot.line_index, range, self.encoding()))
            .collect();
        Ok(Some(locations))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some((snapshot, offset)) = self.locate(&position.text_document.uri, position.position)
        else {
            return Ok(None);
        };
        let items = convert::completion_items(self.session.completions_in(&snapshot, offset));
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(snapshot) = self.session.snapshot(&params.text_document.uri) else {
            return Ok(None);
        };
        let symbols = snapshot
            .file
            .outline()
            .iter()
            .map(|item| convert::document_symbol(&snapshot.line_index, self.encoding(), item))
            .collect();
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let token = CancellationToken::new();
        let _cancel_on_drop = CancelOnDrop(token.clone());
        let session = Arc::clone(&self.session);
        let query = params.query;
        let found = tokio::task::spawn_blocking(move || session.workspace_symbols(&query, &token))
            .await
            .map_err(|err| {
                tracing::error!(%err, "workspace symbol search failed");
                jsonrpc::Error::internal_error()
            })?
            .map_err(|_| jsonrpc::Error::new(ErrorCode::RequestCancelled))?;

        let encoding = self.encoding();
        let symbols = found
            .iter()
            .filter_map(|symbol| {
                let snapshot = self.session.snapshot(&symbol.location.uri)?;
                Some(convert::symbol_information(
                    &snapshot.line_index,
                    encoding,
                    symbol,
                ))
            })
            .collect();
        Ok(Some(symbols))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let Some(doc) = self.session.document(&params.text_document.uri) else {
            return Ok(None);
        };
        let config = match self.format.get() {
            Some(Some(project)) => project.clone(),
            _ => FormatConfig {
                indent_size: params.options.tab_size as usize,
                ..Default::default()
            },
        };
        let Some(formatted) = rill_fmt::try_format(&doc.text, &config) else {
            return Ok(None);
        };
        if *formatted == *doc.text {
            return Ok(None);
        }

        // Full-document replacement: single TextEdit covering entire document.
        let index = LineIndex::new(&doc.text);
        let whole = rill_parser::TextRange::up_to(TextSize::from(index.len()));
        Ok(Some(vec![TextEdit {
            range: convert::range(&index, whole, self.encoding()),
            new_text: formatted,
        }]))
    }
}
