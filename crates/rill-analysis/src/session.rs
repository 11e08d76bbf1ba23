//! Analysis Session: owns the document store, the semantic index and the
//! diagnostics aggregator, and sequences edits into reanalyses.
//!
//! Each document moves through `Clean -> Dirty -> Analyzing -> Clean`.
//! Edits only touch the store and mark the document dirty; the expensive
//! part runs in [`AnalysisSession::reanalyze`], which the caller drives
//! from the task queue. Queries read the last committed [`Snapshot`] and
//! never wait for a reanalysis in progress.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rill_common::LineIndex;
use rill_parser::TextSize;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::Notify;
use url::Url;

use crate::cancel::{CancellationToken, Cancelled};
use crate::completion::{self, CompletionCandidate};
use crate::config::AnalysisConfig;
use crate::diagnostics::{
    self, DiagnosticsAggregator, Publication, SemanticDiagnostic, SyntaxDiagnostic,
};
use crate::document::{DocumentSnapshot, DocumentStore, TextEdit, VersionedEdit};
use crate::error::ProtocolError;
use crate::index::{
    FileIndex, HoverInfo, Location, OutlineItem, SemanticIndex, Symbol, SymbolId, WorkspaceSymbol,
};
use crate::reparse::{self, ReparseStats, ReparseStrategy, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    /// The committed snapshot matches the current text.
    Clean,
    /// Edited since the last commit; a reanalysis is queued.
    Dirty,
    /// A reanalysis is running.
    Analyzing,
}

/// Immutable view of one document at one analyzed version.
///
/// Replaced wholesale after every reanalysis. Holders keep their `Arc`,
/// so a concurrent commit never changes what they see.
#[derive(Debug)]
pub struct Snapshot {
    pub uri: Url,
    pub version: i32,
    pub text: Arc<str>,
    pub tree: SyntaxTree,
    pub line_index: Arc<LineIndex>,
    pub file: Arc<FileIndex>,
    pub syntax_diagnostics: Vec<SyntaxDiagnostic>,
    pub reparse: ReparseStats,
}

impl Snapshot {
    pub fn semantic_diagnostics(&self) -> &[SemanticDiagnostic] {
        self.file.diagnostics()
    }
}

/// A diagnostic set ready to publish, with the snapshot whose line index
/// converts its ranges. `snapshot` is `None` once the document is closed.
#[derive(Debug)]
pub struct DuePublication {
    pub publication: Publication,
    pub snapshot: Option<Arc<Snapshot>>,
}

/// What one call to [`AnalysisSession::reanalyze`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub version: i32,
    /// Edits folded into this reanalysis.
    pub edits: usize,
    pub reparse: ReparseStats,
    pub syntax_errors: usize,
    pub semantic_diagnostics: usize,
    /// An edit arrived meanwhile and another reanalysis was queued.
    pub requeued: bool,
}

/// Counters since the session started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub edits: u64,
    pub reanalyses: u64,
    /// Edits absorbed by an already queued reanalysis.
    pub coalesced: u64,
    pub incremental: u64,
    pub full: u64,
    pub recovered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    edits: AtomicU64,
    reanalyses: AtomicU64,
    coalesced: AtomicU64,
    incremental: AtomicU64,
    full: AtomicU64,
    recovered: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, strategy: ReparseStrategy) {
        Self::bump(&self.reanalyses);
        match strategy {
            ReparseStrategy::Unchanged
            | ReparseStrategy::TokenRelex
            | ReparseStrategy::BlockReparse => Self::bump(&self.incremental),
            ReparseStrategy::FullReparse => Self::bump(&self.full),
            ReparseStrategy::Recovered => Self::bump(&self.recovered),
        }
    }

    fn load(&self) -> SessionStats {
        SessionStats {
            edits: self.edits.load(Ordering::Relaxed),
            reanalyses: self.reanalyses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            incremental: self.incremental.load(Ordering::Relaxed),
            full: self.full.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
        }
    }
}

/// FIFO of documents waiting for reanalysis. A URI is queued at most once.
#[derive(Debug, Default)]
struct TaskQueue {
    order: VecDeque<Url>,
    queued: FxHashSet<Url>,
}

impl TaskQueue {
    /// Returns false if `uri` was already waiting.
    fn push(&mut self, uri: &Url) -> bool {
        if !self.queued.insert(uri.clone()) {
            return false;
        }
        self.order.push_back(uri.clone());
        true
    }

    fn pop(&mut self) -> Option<Url> {
        let uri = self.order.pop_front()?;
        self.queued.remove(&uri);
        Some(uri)
    }
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    state: DocState,
    /// Distinguishes a reopened document from the one that was closed.
    generation: u64,
}

/// Per-document state plus the set of documents with a reanalysis in
/// flight. A document edited mid-analysis is `Dirty` but still running.
#[derive(Debug, Default)]
struct Lifecycle {
    docs: FxHashMap<Url, Tracked>,
    running: FxHashSet<Url>,
    next_generation: u64,
}

pub struct AnalysisSession {
    config: RwLock<AnalysisConfig>,
    store: DocumentStore,
    index: SemanticIndex,
    snapshots: RwLock<FxHashMap<Url, Arc<Snapshot>>>,
    lifecycle: Mutex<Lifecycle>,
    aggregator: Mutex<DiagnosticsAggregator>,
    tasks: Mutex<TaskQueue>,
    task_ready: Notify,
    counters: Counters,
    /// Runs once, between building a document's index and committing it.
    #[cfg(test)]
    before_commit: Mutex<Option<Box<dyn FnOnce(&AnalysisSession, &Url) + Send>>>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig) -> Self {
        let aggregator = DiagnosticsAggregator::new(config.debounce());
        Self {
            config: RwLock::new(config),
            store: DocumentStore::new(),
            index: SemanticIndex::new(),
            snapshots: RwLock::new(FxHashMap::default()),
            lifecycle: Mutex::new(Lifecycle::default()),
            aggregator: Mutex::new(aggregator),
            tasks: Mutex::new(TaskQueue::default()),
            task_ready: Notify::new(),
            counters: Counters::default(),
            #[cfg(test)]
            before_commit: Mutex::new(None),
        }
    }

    pub fn config(&self) -> AnalysisConfig {
        self.config.read().clone()
    }

    /// Swap the configuration. Takes effect for the next reanalysis and
    /// the next debounce period.
    pub fn set_config(&self, config: AnalysisConfig) {
        self.aggregator.lock().set_debounce(config.debounce());
        *self.config.write() = config;
    }

    pub fn debounce(&self) -> Duration {
        self.config.read().debounce()
    }

    // ── Notifications ──────────────────────────────────────────────────

    pub fn did_open(&self, uri: &Url, text: impl Into<String>, version: i32) -> Result<(), ProtocolError> {
        self.store.open(uri, text, version).map_err(|err| {
            tracing::warn!(%uri, %err, "rejected open");
            err
        })?;
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.next_generation += 1;
            let generation = lifecycle.next_generation;
            lifecycle.docs.insert(
                uri.clone(),
                Tracked {
                    state: DocState::Dirty,
                    generation,
                },
            );
        }
        tracing::debug!(%uri, version, "document opened");
        self.enqueue(uri);
        Ok(())
    }

    pub fn did_change(&self, uri: &Url, edit: &VersionedEdit) -> Result<(), ProtocolError> {
        self.store.apply_edit(uri, edit).map_err(|err| {
            tracing::warn!(%uri, %err, "rejected edit");
            err
        })?;
        Counters::bump(&self.counters.edits);
        if let Some(doc) = self.lifecycle.lock().docs.get_mut(uri) {
            doc.state = DocState::Dirty;
        }
        self.aggregator.lock().note_edit(uri, Instant::now());
        if !self.enqueue(uri) {
            Counters::bump(&self.counters.coalesced);
        }
        Ok(())
    }

    /// Forget the document. Its empty diagnostic set is due immediately.
    pub fn did_close(&self, uri: &Url) -> Result<(), ProtocolError> {
        self.store.close(uri).map_err(|err| {
            tracing::warn!(%uri, %err, "rejected close");
            err
        })?;
        self.lifecycle.lock().docs.remove(uri);
        self.snapshots.write().remove(uri);
        self.index.remove(uri);
        self.aggregator.lock().on_document_closed(uri, Instant::now());
        self.enqueue(uri);
        tracing::debug!(%uri, "document closed");
        Ok(())
    }

    // ── Task queue ─────────────────────────────────────────────────────

    fn enqueue(&self, uri: &Url) -> bool {
        let pushed = self.tasks.lock().push(uri);
        if pushed {
            self.task_ready.notify_one();
        }
        pushed
    }

    /// Next document waiting for reanalysis, if any.
    pub fn next_task(&self) -> Option<Url> {
        self.tasks.lock().pop()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().order.len()
    }

    /// Wait until a reanalysis task is available and take it.
    pub async fn wait_for_task(&self) -> Url {
        loop {
            let notified = self.task_ready.notified();
            if let Some(uri) = self.next_task() {
                return uri;
            }
            notified.await;
        }
    }

    /// Run every queued task on the current thread. Returns how many
    /// reanalyses actually ran.
    pub fn drain_tasks(&self) -> usize {
        let mut ran = 0;
        while let Some(uri) = self.next_task() {
            if self.reanalyze(&uri).is_some() {
                ran += 1;
            }
        }
        ran
    }

    // ── Reanalysis ─────────────────────────────────────────────────────

    /// Bring `uri`'s snapshot up to date with its current text.
    ///
    /// Returns `None` if the document is not open or is already being
    /// analyzed by another caller. In the latter case the running
    /// reanalysis requeues the document if it is still dirty when done.
    pub fn reanalyze(&self, uri: &Url) -> Option<AnalysisOutcome> {
        let generation = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.running.contains(uri) {
                return None;
            }
            let doc = lifecycle.docs.get_mut(uri)?;
            doc.state = DocState::Analyzing;
            let generation = doc.generation;
            lifecycle.running.insert(uri.clone());
            generation
        };

        let outcome = self.run_analysis(uri, generation);
        let requeue = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.running.remove(uri);
            lifecycle
                .docs
                .get(uri)
                .is_some_and(|doc| doc.state == DocState::Dirty)
        };
        if requeue {
            self.enqueue(uri);
        }
        let outcome = outcome?;

        tracing::debug!(
            %uri,
            version = outcome.version,
            edits = outcome.edits,
            strategy = ?outcome.reparse.strategy,
            relexed_tokens = outcome.reparse.relexed_tokens,
            reparsed_bytes = outcome.reparse.reparsed_bytes,
            requeued = outcome.requeued,
            "reanalysis committed"
        );
        Some(outcome)
    }

    fn run_analysis(&self, uri: &Url, generation: u64) -> Option<AnalysisOutcome> {
        let input = self.store.analysis_input(uri)?;
        let policy = self.config.read().reparse_policy();
        let edit = input
            .previous
            .as_ref()
            .map(|(_, old_text)| TextEdit::between(old_text, &input.text));
        let reparsed = reparse::reparse(
            input.previous.as_ref().map(|(tree, _)| tree),
            edit.as_ref(),
            &input.text,
            &policy,
        );
        self.counters.record(reparsed.stats.strategy);

        let file = Arc::new(FileIndex::new(uri, input.version, &reparsed.tree));
        let snapshot = Arc::new(Snapshot {
            uri: uri.clone(),
            version: input.version,
            text: Arc::clone(&input.text),
            tree: reparsed.tree.clone(),
            line_index: Arc::new(LineIndex::new(&input.text)),
            file: Arc::clone(&file),
            syntax_diagnostics: reparsed.diagnostics,
            reparse: reparsed.stats,
        });

        #[cfg(test)]
        {
            let hook = self.before_commit.lock().take();
            if let Some(hook) = hook {
                hook(self, uri);
            }
        }

        // Nothing of this run is visible before this point. Closing the
        // document removes its lifecycle entry first, so a close either
        // lands here and is seen, or comes after and undoes the commit.
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.docs.get(uri).map(|doc| doc.generation) != Some(generation) {
            return None;
        }
        self.index.install(uri, Arc::clone(&file));
        self.snapshots
            .write()
            .insert(uri.clone(), Arc::clone(&snapshot));
        self.store
            .commit(uri, input.version, Arc::clone(&input.text), reparsed.tree);
        self.aggregator.lock().on_document_analyzed(
            uri,
            input.version,
            &snapshot.syntax_diagnostics,
            file.diagnostics(),
            Instant::now(),
        );
        let dirty = self.store.is_dirty(uri);
        if let Some(doc) = lifecycle.docs.get_mut(uri) {
            doc.state = if dirty { DocState::Dirty } else { DocState::Clean };
        }
        drop(lifecycle);

        Some(AnalysisOutcome {
            version: input.version,
            edits: input.edits_since_commit,
            reparse: snapshot.reparse,
            syntax_errors: snapshot.syntax_diagnostics.len(),
            semantic_diagnostics: file.diagnostics().len(),
            requeued: dirty,
        })
    }

    // ── Files on disk ──────────────────────────────────────────────────

    /// Diagnostics for `text`, the on-disk contents of a file no editor has
    /// open. Nothing is stored or indexed. `None` if `uri` is open: the
    /// editor's buffer is what counts then.
    pub fn check_unopened(&self, uri: &Url, text: &str) -> Option<Publication> {
        if self.store.get(uri).is_some() {
            return None;
        }
        let policy = self.config.read().reparse_policy();
        let reparsed = reparse::reparse(None, None, text, &policy);
        let file = FileIndex::new(uri, 0, &reparsed.tree);
        tracing::debug!(%uri, len = text.len(), "checked file on disk");
        Some(Publication {
            uri: uri.clone(),
            version: None,
            diagnostics: diagnostics::merged(&reparsed.diagnostics, file.diagnostics()),
        })
    }

    // ── State ──────────────────────────────────────────────────────────

    pub fn state(&self, uri: &Url) -> Option<DocState> {
        self.lifecycle.lock().docs.get(uri).map(|doc| doc.state)
    }

    /// The latest committed snapshot of `uri`.
    pub fn snapshot(&self, uri: &Url) -> Option<Arc<Snapshot>> {
        self.snapshots.read().get(uri).cloned()
    }

    /// The current (possibly not yet analyzed) text of `uri`.
    pub fn document(&self, uri: &Url) -> Option<DocumentSnapshot> {
        self.store.get(uri)
    }

    pub fn open_documents(&self) -> Vec<Url> {
        let mut uris = self.store.uris();
        uris.sort();
        uris
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.load()
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    /// Drain the diagnostic sets due at `now`.
    pub fn take_publications(&self, now: Instant) -> Vec<Publication> {
        self.take_due(now)
            .into_iter()
            .map(|due| due.publication)
            .collect()
    }

    /// Like [`take_publications`](Self::take_publications), paired with
    /// the snapshot each set was computed from.
    pub fn take_due(&self, now: Instant) -> Vec<DuePublication> {
        // Commits update the snapshot and the pending set under this lock.
        let _lifecycle = self.lifecycle.lock();
        let snapshots = self.snapshots.read();
        self.aggregator
            .lock()
            .pending_publications(now)
            .map(|publication| {
                let snapshot = publication
                    .version
                    .and_then(|_| snapshots.get(&publication.uri).cloned());
                DuePublication {
                    publication,
                    snapshot,
                }
            })
            .collect()
    }

    /// When the next pending diagnostic set becomes due.
    pub fn next_publication_deadline(&self) -> Option<Instant> {
        self.aggregator.lock().next_deadline()
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn lookup_definition(&self, uri: &Url, offset: TextSize) -> Option<Location> {
        let snapshot = self.snapshot(uri)?;
        snapshot.file.definition_at(offset).map(|range| Location {
            uri: uri.clone(),
            range,
        })
    }

    pub fn symbol_at(&self, uri: &Url, offset: TextSize) -> Option<SymbolId> {
        let snapshot = self.snapshot(uri)?;
        let symbol = snapshot.file.symbol_at(offset)?;
        Some(SymbolId {
            uri: uri.clone(),
            definition: snapshot.file.symbols()[symbol].name_range,
        })
    }

    pub fn lookup_references(&self, id: &SymbolId) -> Vec<Location> {
        self.index.lookup_references(id)
    }

    pub fn completions_at(&self, uri: &Url, offset: TextSize) -> Vec<CompletionCandidate> {
        match self.snapshot(uri) {
            Some(snapshot) => self.completions_in(&snapshot, offset),
            None => Vec::new(),
        }
    }

    /// Completions against a snapshot the caller already holds, so that
    /// position conversion and the query see the same version.
    pub fn completions_in(&self, snapshot: &Snapshot, offset: TextSize) -> Vec<CompletionCandidate> {
        let exports = self.index.exports_except(&snapshot.uri);
        let limit = self.config.read().max_completion_items;
        completion::complete(&snapshot.file, offset, &exports, limit)
    }

    pub fn symbols_in_scope(&self, uri: &Url, offset: TextSize) -> Vec<Symbol> {
        let Some(snapshot) = self.snapshot(uri) else {
            return Vec::new();
        };
        snapshot
            .file
            .visible_symbols(offset)
            .into_iter()
            .map(|(symbol, _)| snapshot.file.symbols()[symbol].clone())
            .collect()
    }

    pub fn hover(&self, uri: &Url, offset: TextSize) -> Option<HoverInfo> {
        self.snapshot(uri)?.file.hover_at(offset)
    }

    pub fn document_symbols(&self, uri: &Url) -> Vec<OutlineItem> {
        self.snapshot(uri)
            .map(|snapshot| snapshot.file.outline())
            .unwrap_or_default()
    }

    pub fn workspace_symbols(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<Vec<WorkspaceSymbol>, Cancelled> {
        self.index.workspace_symbols(query, token)
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("documents", &self.store.uris().len())
            .field("pending_tasks", &self.pending_tasks())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SyntaxDiagnosticKind;
    use crate::document::EditDelta;
    use crate::error::EditError;
    use crate::reparse::tests::FAIL_NEXT_PARSE;
    use rill_parser::TextRange;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///w/{name}.rill")).unwrap()
    }

    fn quiet_session() -> AnalysisSession {
        AnalysisSession::new(AnalysisConfig {
            debounce_ms: 0,
            ..AnalysisConfig::default()
        })
    }

    fn insert(at: u32, text: &str, target: i32) -> VersionedEdit {
        VersionedEdit {
            base_version: None,
            target_version: target,
            deltas: vec![EditDelta::replace(
                TextRange::empty(TextSize::from(at)),
                text,
            )],
        }
    }

    #[test]
    fn open_analyze_clean() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "let a = 1;\n", 1).unwrap();
        assert_eq!(session.state(&main), Some(DocState::Dirty));
        assert!(session.snapshot(&main).is_none());

        assert_eq!(session.next_task(), Some(main.clone()));
        let outcome = session.reanalyze(&main).unwrap();
        assert_eq!(outcome.version, 1);
        assert_eq!(outcome.reparse.strategy, ReparseStrategy::FullReparse);
        assert!(!outcome.requeued);
        assert_eq!(session.state(&main), Some(DocState::Clean));
        assert_eq!(session.snapshot(&main).unwrap().text.as_ref(), "let a = 1;\n");
    }

    #[test]
    fn edits_before_reanalysis_coalesce() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "fn f() {\n  let a = 1;\n}\n", 1).unwrap();
        session.drain_tasks();

        session.did_change(&main, &insert(22, "a;\n", 2)).unwrap();
        session.did_change(&main, &insert(22, "  ", 3)).unwrap();
        assert_eq!(session.pending_tasks(), 1);
        assert_eq!(session.stats().coalesced, 1);

        assert_eq!(session.drain_tasks(), 1);
        let snapshot = session.snapshot(&main).unwrap();
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.text.as_ref(), "fn f() {\n  let a = 1;\n  a;\n}\n");
        assert!(snapshot.semantic_diagnostics().is_empty());
    }

    #[test]
    fn protocol_errors_leave_state_alone() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "let a = 1;\n", 4).unwrap();
        session.drain_tasks();

        let err = session.did_change(&main, &insert(0, "x", 3)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Edit(EditError::VersionConflict { stored: 4, .. })
        ));
        assert_eq!(
            session.did_open(&main, "", 1),
            Err(ProtocolError::Edit(EditError::DuplicateDocument(main.clone())))
        );
        assert_eq!(session.state(&main), Some(DocState::Clean));
        assert_eq!(session.pending_tasks(), 0);
        assert_eq!(session.document(&main).unwrap().version, 4);
    }

    #[test]
    fn close_drops_everything_and_publishes_empty() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "missing;\n", 1).unwrap();
        session.drain_tasks();
        let published = session.take_publications(Instant::now());
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].diagnostics.len(), 1);

        session.did_close(&main).unwrap();
        assert!(session.snapshot(&main).is_none());
        assert!(session.state(&main).is_none());
        assert_eq!(session.drain_tasks(), 0);

        let published = session.take_publications(Instant::now());
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, None);
        assert!(published[0].diagnostics.is_empty());

        assert_eq!(
            session.did_close(&main),
            Err(ProtocolError::Edit(EditError::UnknownDocument(main)))
        );
    }

    #[test]
    fn queries_read_the_committed_snapshot() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "let a = 1;\na;\n", 1).unwrap();
        session.drain_tasks();

        // Rename `a` to `b` without reanalyzing yet.
        let edit = VersionedEdit {
            base_version: Some(1),
            target_version: 2,
            deltas: vec![EditDelta::full("let b = 1;\nb;\n")],
        };
        session.did_change(&main, &edit).unwrap();
        assert_eq!(session.state(&main), Some(DocState::Dirty));

        let def = session.lookup_definition(&main, TextSize::from(11)).unwrap();
        assert_eq!(def.range, TextRange::new(TextSize::from(4), TextSize::from(5)));
        assert_eq!(session.snapshot(&main).unwrap().version, 1);
        assert_eq!(session.completions_at(&main, TextSize::from(12))[0].label, "a");

        session.drain_tasks();
        assert_eq!(session.snapshot(&main).unwrap().version, 2);
        assert_eq!(session.completions_at(&main, TextSize::from(12))[0].label, "b");
    }

    #[test]
    fn exports_cross_documents() {
        let session = quiet_session();
        let util = uri("util");
        let main = uri("main");
        session.did_open(&util, "pub fn helper() {}\n", 1).unwrap();
        session.did_open(&main, "he\n", 1).unwrap();
        session.drain_tasks();

        let items = session.completions_at(&main, TextSize::from(2));
        let helper = items.iter().find(|c| c.label == "helper").unwrap();
        assert_eq!(helper.detail.as_deref(), Some("util::helper: pub fn helper()"));

        let symbols = session
            .workspace_symbols("help", &CancellationToken::new())
            .unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].location.uri, util);
    }

    #[test]
    fn config_changes_apply_to_completion_limit() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "\n", 1).unwrap();
        session.drain_tasks();
        assert!(session.completions_at(&main, TextSize::from(0)).len() > 3);

        session.set_config(AnalysisConfig {
            max_completion_items: 3,
            ..session.config()
        });
        assert_eq!(session.completions_at(&main, TextSize::from(0)).len(), 3);
    }

    #[tokio::test]
    async fn wait_for_task_wakes_on_open() {
        let session = Arc::new(quiet_session());
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_for_task().await })
        };
        tokio::task::yield_now().await;
        session.did_open(&uri("main"), "", 1).unwrap();
        assert_eq!(waiter.await.unwrap(), uri("main"));
    }

    #[test]
    fn close_during_analysis_never_exposes_its_exports() {
        let session = quiet_session();
        let util = uri("util");
        let main = uri("main");
        session.did_open(&main, "\n", 1).unwrap();
        session.drain_tasks();

        session.did_open(&util, "pub fn helper() {}\n", 1).unwrap();
        *session.before_commit.lock() = Some(Box::new(|session: &AnalysisSession, uri: &Url| {
            assert!(session.index.lookup_export("util::helper").is_empty());
            session.did_close(uri).unwrap();
        }));
        assert_eq!(session.next_task(), Some(util.clone()));
        assert_eq!(session.reanalyze(&util), None);

        assert!(session.index.file(&util).is_none());
        assert!(session.index.lookup_export("util::helper").is_empty());
        assert!(session.snapshot(&util).is_none());
        assert!(session
            .completions_at(&main, TextSize::from(0))
            .iter()
            .all(|c| c.label != "helper"));
        assert!(session
            .workspace_symbols("helper", &CancellationToken::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn reopen_during_analysis_drops_the_stale_result() {
        let session = quiet_session();
        let util = uri("util");
        session.did_open(&util, "pub fn helper() {}\n", 1).unwrap();
        *session.before_commit.lock() = Some(Box::new(|session: &AnalysisSession, uri: &Url| {
            session.did_close(uri).unwrap();
            session.did_open(uri, "pub fn renamed() {}\n", 1).unwrap();
        }));
        assert_eq!(session.next_task(), Some(util.clone()));
        assert_eq!(session.reanalyze(&util), None);
        assert!(session.index.lookup_export("util::helper").is_empty());

        assert_eq!(session.drain_tasks(), 1);
        assert!(session.index.lookup_export("util::helper").is_empty());
        assert_eq!(session.index.lookup_export("util::renamed").len(), 1);
        assert_eq!(
            session.snapshot(&util).unwrap().text.as_ref(),
            "pub fn renamed() {}\n"
        );
    }

    #[test]
    fn parser_panic_leaves_the_session_usable() {
        let session = quiet_session();
        let main = uri("main");
        session.did_open(&main, "let a = 1;\na;\n", 1).unwrap();
        FAIL_NEXT_PARSE.with(|fail| fail.set(true));
        assert_eq!(session.drain_tasks(), 1);

        let snapshot = session.snapshot(&main).unwrap();
        assert_eq!(snapshot.reparse.strategy, ReparseStrategy::Recovered);
        assert_eq!(snapshot.text.as_ref(), "let a = 1;\na;\n");
        assert_eq!(snapshot.syntax_diagnostics.len(), 1);
        assert_eq!(
            snapshot.syntax_diagnostics[0].kind,
            SyntaxDiagnosticKind::AnalysisFailure
        );
        assert_eq!(session.stats().recovered, 1);
        assert_eq!(session.state(&main), Some(DocState::Clean));
        let published = session.take_publications(Instant::now());
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].diagnostics.len(), 1);

        let edit = VersionedEdit {
            base_version: Some(1),
            target_version: 2,
            deltas: vec![EditDelta::full("let b = 1;\nb;\n")],
        };
        session.did_change(&main, &edit).unwrap();
        assert_eq!(session.drain_tasks(), 1);

        let snapshot = session.snapshot(&main).unwrap();
        assert_eq!(snapshot.version, 2);
        assert!(snapshot.syntax_diagnostics.is_empty());
        assert!(snapshot.semantic_diagnostics().is_empty());
        let def = session.lookup_definition(&main, TextSize::from(11)).unwrap();
        assert_eq!(def.range, TextRange::new(TextSize::from(4), TextSize::from(5)));
    }

    #[test]
    fn unopened_files_are_checked_without_being_stored() {
        let session = quiet_session();
        let main = uri("main");
        let disk = uri("disk");
        session.did_open(&main, "\n", 1).unwrap();
        session.drain_tasks();

        let publication = session
            .check_unopened(&disk, "pub fn helper() { missing }\nlet = 1;\n")
            .unwrap();
        assert_eq!(publication.uri, disk);
        assert_eq!(publication.version, None);
        let messages: Vec<String> = publication
            .diagnostics
            .iter()
            .map(|d| d.message())
            .collect();
        assert_eq!(messages[0], "cannot find `missing` in this scope");
        assert!(publication
            .diagnostics
            .iter()
            .any(|d| matches!(d, diagnostics::Diagnostic::Syntax(_))));

        assert!(session.document(&disk).is_none());
        assert!(session.index.file(&disk).is_none());
        assert!(session.index.lookup_export("disk::helper").is_empty());
        assert_eq!(session.pending_tasks(), 0);

        assert!(session.check_unopened(&main, "oops;\n").is_none());
    }
}
