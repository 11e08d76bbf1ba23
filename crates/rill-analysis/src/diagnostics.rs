//! Diagnostics and the debounced Diagnostics Aggregator.
//!
//! A document's diagnostics are always replaced as a whole. The aggregator
//! holds the latest merged set per document until the document has been
//! quiet for the debounce delay, drops sets that are identical to what was
//! last published, and hands the rest to the publisher.

use std::time::{Duration, Instant};

use rill_parser::{ParseError, TextRange, TextSize};
use rustc_hash::FxHashMap;
use url::Url;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxDiagnosticKind {
    /// Reported by the lexer or parser.
    Parse,
    /// The parser itself failed; the tree is a placeholder.
    AnalysisFailure,
}

/// A lexer or parser problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub kind: SyntaxDiagnosticKind,
    pub message: String,
    pub range: TextRange,
    pub related: Option<(String, TextRange)>,
}

impl SyntaxDiagnostic {
    pub fn from_parse_error(error: &ParseError) -> Self {
        Self {
            kind: SyntaxDiagnosticKind::Parse,
            message: error.message.clone(),
            range: span_range(error.span),
            related: error
                .related
                .as_ref()
                .map(|(message, span)| (message.clone(), span_range(*span))),
        }
    }
}

fn span_range(span: rill_common::Span) -> TextRange {
    TextRange::new(TextSize::from(span.start), TextSize::from(span.end))
}

/// What a semantic diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticDiagnosticKind {
    UnresolvedReference { name: String },
    DuplicateDefinition { name: String, first: TextRange },
    UnusedVariable { name: String },
}

/// A name resolution problem found by the semantic index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticDiagnostic {
    pub kind: SemanticDiagnosticKind,
    pub range: TextRange,
}

impl SemanticDiagnostic {
    pub fn severity(&self) -> Severity {
        match self.kind {
            SemanticDiagnosticKind::UnresolvedReference { .. }
            | SemanticDiagnosticKind::DuplicateDefinition { .. } => Severity::Error,
            SemanticDiagnosticKind::UnusedVariable { .. } => Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            SemanticDiagnosticKind::UnresolvedReference { name } => {
                format!("cannot find `{name}` in this scope")
            }
            SemanticDiagnosticKind::DuplicateDefinition { name, .. } => {
                format!("`{name}` is defined more than once")
            }
            SemanticDiagnosticKind::UnusedVariable { name } => {
                format!("unused variable `{name}`")
            }
        }
    }

    /// Stable code for clients that filter diagnostics.
    pub fn code(&self) -> &'static str {
        match self.kind {
            SemanticDiagnosticKind::UnresolvedReference { .. } => "unresolved-reference",
            SemanticDiagnosticKind::DuplicateDefinition { .. } => "duplicate-definition",
            SemanticDiagnosticKind::UnusedVariable { .. } => "unused-variable",
        }
    }
}

/// Any diagnostic, tagged by its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Syntax(SyntaxDiagnostic),
    Semantic(SemanticDiagnostic),
}

impl Diagnostic {
    pub fn range(&self) -> TextRange {
        match self {
            Diagnostic::Syntax(d) => d.range,
            Diagnostic::Semantic(d) => d.range,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::Syntax(_) => Severity::Error,
            Diagnostic::Semantic(d) => d.severity(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Diagnostic::Syntax(d) => d.message.clone(),
            Diagnostic::Semantic(d) => d.message(),
        }
    }

    pub fn source_tag(&self) -> &'static str {
        match self {
            Diagnostic::Syntax(_) => "syntax",
            Diagnostic::Semantic(_) => "semantic",
        }
    }
}

/// Syntax and semantic diagnostics of one tree in document order.
pub(crate) fn merged(syntax: &[SyntaxDiagnostic], semantic: &[SemanticDiagnostic]) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = syntax
        .iter()
        .cloned()
        .map(Diagnostic::Syntax)
        .chain(semantic.iter().cloned().map(Diagnostic::Semantic))
        .collect();
    diagnostics.sort_by_key(|d| (d.range().start(), d.range().end()));
    diagnostics
}

/// A merged diagnostic set ready to be sent for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub uri: Url,
    /// Document version the set was computed for; `None` after close.
    pub version: Option<i32>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
struct Pending {
    version: Option<i32>,
    diagnostics: Vec<Diagnostic>,
    due: Instant,
    closing: bool,
}

/// Debounces and deduplicates diagnostic publication.
#[derive(Debug)]
pub struct DiagnosticsAggregator {
    debounce: Duration,
    last_edit: FxHashMap<Url, Instant>,
    pending: FxHashMap<Url, Pending>,
    published: FxHashMap<Url, Vec<Diagnostic>>,
}

impl DiagnosticsAggregator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_edit: FxHashMap::default(),
            pending: FxHashMap::default(),
            published: FxHashMap::default(),
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// An edit arrived; hold this document's pending set a while longer.
    pub fn note_edit(&mut self, uri: &Url, now: Instant) {
        self.last_edit.insert(uri.clone(), now);
        if let Some(pending) = self.pending.get_mut(uri) {
            pending.due = pending.due.max(now + self.debounce);
        }
    }

    /// Replace the pending set for `uri` with the merged result of a new
    /// analysis. Any older pending set for the document is dropped.
    pub fn on_document_analyzed(
        &mut self,
        uri: &Url,
        version: i32,
        syntax: &[SyntaxDiagnostic],
        semantic: &[SemanticDiagnostic],
        now: Instant,
    ) {
        let diagnostics = merged(syntax, semantic);
        let quiet_since = self.last_edit.get(uri).copied().unwrap_or(now);
        self.pending.insert(
            uri.clone(),
            Pending {
                version: Some(version),
                diagnostics,
                due: quiet_since + self.debounce,
                closing: false,
            },
        );
    }

    /// The document was closed: publish an empty set right away and forget
    /// everything else about it.
    pub fn on_document_closed(&mut self, uri: &Url, now: Instant) {
        self.last_edit.remove(uri);
        self.pending.insert(
            uri.clone(),
            Pending {
                version: None,
                diagnostics: Vec::new(),
                due: now,
                closing: true,
            },
        );
    }

    /// Drop all state for `uri` without publishing anything.
    pub fn forget(&mut self, uri: &Url) {
        self.last_edit.remove(uri);
        self.pending.remove(uri);
        self.published.remove(uri);
    }

    /// Earliest instant at which a pending set becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    pub fn has_pending(&self, uri: &Url) -> bool {
        self.pending.contains_key(uri)
    }

    /// Drain every set due at `now`. Sets identical to the last published
    /// one for the same document are dropped while draining.
    pub fn pending_publications(&mut self, now: Instant) -> PendingPublications<'_> {
        let mut due: Vec<Url> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(uri, _)| uri.clone())
            .collect();
        due.sort();
        due.reverse();
        PendingPublications {
            aggregator: self,
            due,
        }
    }
}

/// Lazy, finite sequence of publications produced by
/// [`DiagnosticsAggregator::pending_publications`].
pub struct PendingPublications<'a> {
    aggregator: &'a mut DiagnosticsAggregator,
    due: Vec<Url>,
}

impl Iterator for PendingPublications<'_> {
    type Item = Publication;

    fn next(&mut self) -> Option<Publication> {
        while let Some(uri) = self.due.pop() {
            let Some(pending) = self.aggregator.pending.remove(&uri) else {
                continue;
            };
            if pending.closing {
                self.aggregator.published.remove(&uri);
                return Some(Publication {
                    uri,
                    version: None,
                    diagnostics: Vec::new(),
                });
            }
            let unchanged = self
                .aggregator
                .published
                .get(&uri)
                .is_some_and(|last| *last == pending.diagnostics);
            if unchanged {
                continue;
            }
            self.aggregator
                .published
                .insert(uri.clone(), pending.diagnostics.clone());
            return Some(Publication {
                uri,
                version: pending.version,
                diagnostics: pending.diagnostics,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///w/{name}.rill")).unwrap()
    }

    fn unresolved(name: &str, start: u32) -> SemanticDiagnostic {
        SemanticDiagnostic {
            kind: SemanticDiagnosticKind::UnresolvedReference {
                name: name.to_string(),
            },
            range: TextRange::new(start.into(), (start + name.len() as u32).into()),
        }
    }

    const DEBOUNCE: Duration = Duration::from_millis(100);

    #[test]
    fn held_until_quiet() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(DEBOUNCE);
        agg.note_edit(&uri("a"), t0);
        agg.on_document_analyzed(&uri("a"), 2, &[], &[unresolved("x", 0)], t0);

        assert_eq!(agg.pending_publications(t0 + Duration::from_millis(50)).count(), 0);
        // Another edit pushes the deadline out.
        agg.note_edit(&uri("a"), t0 + Duration::from_millis(80));
        assert_eq!(agg.next_deadline(), Some(t0 + Duration::from_millis(180)));
        assert_eq!(agg.pending_publications(t0 + Duration::from_millis(120)).count(), 0);

        let published: Vec<_> = agg
            .pending_publications(t0 + Duration::from_millis(180))
            .collect();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, Some(2));
        assert_eq!(agg.next_deadline(), None);
    }

    #[test]
    fn newer_analysis_supersedes_pending() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(DEBOUNCE);
        agg.on_document_analyzed(&uri("a"), 2, &[], &[unresolved("x", 0)], t0);
        agg.on_document_analyzed(&uri("a"), 3, &[], &[], t0);
        let published: Vec<_> = agg.pending_publications(t0 + DEBOUNCE).collect();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, Some(3));
        assert!(published[0].diagnostics.is_empty());
    }

    #[test]
    fn identical_sets_are_not_republished() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(Duration::ZERO);
        agg.on_document_analyzed(&uri("a"), 1, &[], &[unresolved("x", 0)], t0);
        assert_eq!(agg.pending_publications(t0).count(), 1);
        agg.on_document_analyzed(&uri("a"), 2, &[], &[unresolved("x", 0)], t0);
        assert_eq!(agg.pending_publications(t0).count(), 0);
        agg.on_document_analyzed(&uri("a"), 3, &[], &[unresolved("x", 4)], t0);
        assert_eq!(agg.pending_publications(t0).count(), 1);
    }

    #[test]
    fn merged_in_source_order() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(Duration::ZERO);
        let syntax = SyntaxDiagnostic {
            kind: SyntaxDiagnosticKind::Parse,
            message: "expected `;`".to_string(),
            range: TextRange::new(5.into(), 6.into()),
            related: None,
        };
        agg.on_document_analyzed(&uri("a"), 1, &[syntax], &[unresolved("y", 9), unresolved("x", 0)], t0);
        let publication = agg.pending_publications(t0).next().unwrap();
        let starts: Vec<u32> = publication
            .diagnostics
            .iter()
            .map(|d| d.range().start().into())
            .collect();
        assert_eq!(starts, vec![0, 5, 9]);
        assert_eq!(publication.diagnostics[1].source_tag(), "syntax");
    }

    #[test]
    fn close_publishes_empty_set_once() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(DEBOUNCE);
        agg.on_document_analyzed(&uri("a"), 1, &[], &[unresolved("x", 0)], t0);
        agg.on_document_closed(&uri("a"), t0);
        let published: Vec<_> = agg.pending_publications(t0).collect();
        assert_eq!(
            published,
            vec![Publication {
                uri: uri("a"),
                version: None,
                diagnostics: Vec::new()
            }]
        );
        assert_eq!(agg.pending_publications(t0 + DEBOUNCE).count(), 0);
    }

    #[test]
    fn documents_are_independent() {
        let t0 = Instant::now();
        let mut agg = DiagnosticsAggregator::new(DEBOUNCE);
        agg.note_edit(&uri("b"), t0 + Duration::from_millis(50));
        agg.on_document_analyzed(&uri("a"), 1, &[], &[], t0);
        agg.on_document_analyzed(&uri("b"), 1, &[], &[], t0);
        let first: Vec<_> = agg.pending_publications(t0 + DEBOUNCE).map(|p| p.uri).collect();
        assert_eq!(first, vec![uri("a")]);
        assert!(agg.has_pending(&uri("b")));
        agg.forget(&uri("b"));
        assert_eq!(agg.next_deadline(), None);
    }
}
