//! Document Store: the authoritative text and version of every open document.
//!
//! Documents are individually locked, so edits to different URIs never
//! wait on each other. The map itself is only write-locked to add or
//! remove a document.
//!
//! Besides the live text, each document remembers the text and tree of its
//! last committed analysis. The reparse adapter diffs the two texts into a
//! single [`TextEdit`], so any number of edits between two analyses are
//! coalesced into one incremental reparse.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rill_parser::{TextRange, TextSize};
use rustc_hash::FxHashMap;
use url::Url;

use crate::error::EditError;
use crate::reparse::SyntaxTree;

/// One change inside an edit. `range: None` replaces the whole text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDelta {
    pub range: Option<TextRange>,
    pub text: String,
}

impl EditDelta {
    pub fn replace(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }

    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }
}

/// A batch of deltas moving a document from one version to the next.
/// Each delta applies to the text produced by the deltas before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedEdit {
    /// Version the deltas were computed against; `None` trusts the stored one.
    pub base_version: Option<i32>,
    pub target_version: i32,
    pub deltas: Vec<EditDelta>,
}

/// A single splice of an old text into a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Replaced range of the old text.
    pub delete: TextRange,
    pub insert: String,
}

impl TextEdit {
    /// The smallest single edit turning `old` into `new`: everything
    /// between their common prefix and common suffix.
    pub fn between(old: &str, new: &str) -> TextEdit {
        let mut prefix = old
            .bytes()
            .zip(new.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
            prefix -= 1;
        }

        let max_suffix = old.len().min(new.len()) - prefix;
        let mut suffix = old
            .bytes()
            .rev()
            .zip(new.bytes().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix)
        {
            suffix -= 1;
        }

        TextEdit {
            delete: TextRange::new(
                TextSize::from(prefix as u32),
                TextSize::from((old.len() - suffix) as u32),
            ),
            insert: new[prefix..new.len() - suffix].to_string(),
        }
    }

    /// Net change in text length.
    pub fn delta(&self) -> i64 {
        self.insert.len() as i64 - i64::from(u32::from(self.delete.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.insert.is_empty()
    }

    pub fn apply(&self, text: &mut String) {
        text.replace_range(std::ops::Range::<usize>::from(self.delete), &self.insert);
    }
}

/// Read-only view of a document's current text.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub version: i32,
    pub text: Arc<str>,
}

/// Everything the session needs to reanalyze a document.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub version: i32,
    pub text: Arc<str>,
    /// Tree and text of the last committed analysis.
    pub previous: Option<(SyntaxTree, Arc<str>)>,
    /// Edits applied since that analysis.
    pub edits_since_commit: usize,
}

#[derive(Debug)]
struct Document {
    text: String,
    version: i32,
    committed: Option<Committed>,
    edits_since_commit: usize,
}

#[derive(Debug)]
struct Committed {
    version: i32,
    text: Arc<str>,
    tree: SyntaxTree,
}

/// All open documents, keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: RwLock<FxHashMap<Url, Arc<Mutex<Document>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, uri: &Url, text: impl Into<String>, version: i32) -> Result<(), EditError> {
        let mut docs = self.docs.write();
        if docs.contains_key(uri) {
            return Err(EditError::DuplicateDocument(uri.clone()));
        }
        docs.insert(
            uri.clone(),
            Arc::new(Mutex::new(Document {
                text: text.into(),
                version,
                committed: None,
                edits_since_commit: 1,
            })),
        );
        Ok(())
    }

    /// Apply every delta of `edit`, or none of them.
    pub fn apply_edit(&self, uri: &Url, edit: &VersionedEdit) -> Result<(), EditError> {
        let doc = self.entry(uri)?;
        let mut doc = doc.lock();

        let base_ok = edit.base_version.map_or(true, |base| base == doc.version);
        if !base_ok || edit.target_version <= doc.version {
            return Err(EditError::VersionConflict {
                uri: uri.clone(),
                stored: doc.version,
                base: edit.base_version,
                target: edit.target_version,
            });
        }

        let mut text = doc.text.clone();
        for delta in &edit.deltas {
            match delta.range {
                None => text.clone_from(&delta.text),
                Some(range) => {
                    let start = usize::from(range.start());
                    let end = usize::from(range.end());
                    if end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end)
                    {
                        return Err(EditError::RangeOutOfBounds {
                            uri: uri.clone(),
                            start: start as u32,
                            end: end as u32,
                            len: text.len() as u32,
                        });
                    }
                    text.replace_range(start..end, &delta.text);
                }
            }
        }

        doc.text = text;
        doc.version = edit.target_version;
        doc.edits_since_commit += 1;
        Ok(())
    }

    pub fn close(&self, uri: &Url) -> Result<(), EditError> {
        match self.docs.write().remove(uri) {
            Some(_) => Ok(()),
            None => Err(EditError::UnknownDocument(uri.clone())),
        }
    }

    pub fn get(&self, uri: &Url) -> Option<DocumentSnapshot> {
        let doc = self.entry(uri).ok()?;
        let doc = doc.lock();
        Some(DocumentSnapshot {
            uri: uri.clone(),
            version: doc.version,
            text: Arc::from(doc.text.as_str()),
        })
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.docs.read().contains_key(uri)
    }

    pub fn uris(&self) -> Vec<Url> {
        self.docs.read().keys().cloned().collect()
    }

    /// Current text plus the last committed analysis, or `None` if the
    /// document is not open.
    pub fn analysis_input(&self, uri: &Url) -> Option<AnalysisInput> {
        let doc = self.entry(uri).ok()?;
        let doc = doc.lock();
        Some(AnalysisInput {
            version: doc.version,
            text: Arc::from(doc.text.as_str()),
            previous: doc
                .committed
                .as_ref()
                .map(|c| (c.tree.clone(), Arc::clone(&c.text))),
            edits_since_commit: doc.edits_since_commit,
        })
    }

    /// Record the result of analyzing `version`. Ignored if the document
    /// was closed, or already has a newer commit.
    pub fn commit(&self, uri: &Url, version: i32, text: Arc<str>, tree: SyntaxTree) {
        let Ok(doc) = self.entry(uri) else {
            return;
        };
        let mut doc = doc.lock();
        if doc.committed.as_ref().is_some_and(|c| c.version > version) {
            return;
        }
        if doc.version == version {
            doc.edits_since_commit = 0;
        }
        doc.committed = Some(Committed {
            version,
            text,
            tree,
        });
    }

    /// Whether the current text is newer than the last commit.
    pub fn is_dirty(&self, uri: &Url) -> bool {
        self.entry(uri)
            .map(|doc| {
                let doc = doc.lock();
                doc.committed.as_ref().map_or(true, |c| c.version != doc.version)
            })
            .unwrap_or(false)
    }

    fn entry(&self, uri: &Url) -> Result<Arc<Mutex<Document>>, EditError> {
        self.docs
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| EditError::UnknownDocument(uri.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///w/main.rill").unwrap()
    }

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    fn edit(base: i32, target: i32, deltas: Vec<EditDelta>) -> VersionedEdit {
        VersionedEdit {
            base_version: Some(base),
            target_version: target,
            deltas,
        }
    }

    #[test]
    fn open_twice_is_duplicate() {
        let store = DocumentStore::new();
        store.open(&uri(), "let x = 1;", 1).unwrap();
        assert_eq!(
            store.open(&uri(), "", 1),
            Err(EditError::DuplicateDocument(uri()))
        );
    }

    #[test]
    fn deltas_apply_in_sequence() {
        let store = DocumentStore::new();
        store.open(&uri(), "let x = 1;", 1).unwrap();
        store
            .apply_edit(
                &uri(),
                &edit(
                    1,
                    2,
                    vec![
                        EditDelta::replace(range(4, 5), "total"),
                        // Offsets refer to the text after the first delta.
                        EditDelta::replace(range(12, 13), "42"),
                    ],
                ),
            )
            .unwrap();
        let doc = store.get(&uri()).unwrap();
        assert_eq!(&*doc.text, "let total = 42;");
        assert_eq!(doc.version, 2);
    }

    #[test]
    fn version_conflicts() {
        let store = DocumentStore::new();
        store.open(&uri(), "a", 3).unwrap();
        let stale = store.apply_edit(&uri(), &edit(2, 4, vec![EditDelta::full("b")]));
        assert!(matches!(stale, Err(EditError::VersionConflict { stored: 3, .. })));
        let backwards = VersionedEdit {
            base_version: None,
            target_version: 3,
            deltas: vec![EditDelta::full("b")],
        };
        assert!(matches!(
            store.apply_edit(&uri(), &backwards),
            Err(EditError::VersionConflict { target: 3, .. })
        ));
        assert_eq!(&*store.get(&uri()).unwrap().text, "a");
    }

    #[test]
    fn failed_delta_leaves_text_untouched() {
        let store = DocumentStore::new();
        store.open(&uri(), "héllo", 1).unwrap();
        // Second delta splits the two-byte `é`.
        let err = store
            .apply_edit(
                &uri(),
                &edit(
                    1,
                    2,
                    vec![EditDelta::replace(range(0, 1), "j"), EditDelta::replace(range(2, 3), "")],
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EditError::RangeOutOfBounds { start: 2, .. }));
        let err = store
            .apply_edit(&uri(), &edit(1, 2, vec![EditDelta::replace(range(3, 99), "")]))
            .unwrap_err();
        assert!(matches!(err, EditError::RangeOutOfBounds { len: 6, .. }));
        let doc = store.get(&uri()).unwrap();
        assert_eq!((&*doc.text, doc.version), ("héllo", 1));
    }

    #[test]
    fn close_unknown() {
        let store = DocumentStore::new();
        assert_eq!(store.close(&uri()), Err(EditError::UnknownDocument(uri())));
        store.open(&uri(), "", 1).unwrap();
        store.close(&uri()).unwrap();
        assert!(store.get(&uri()).is_none());
        assert!(store.analysis_input(&uri()).is_none());
    }

    #[test]
    fn text_edit_between_finds_changed_middle() {
        let edit = TextEdit::between("let x = 1;", "let xy = 1;");
        assert_eq!(edit.delete, range(5, 5));
        assert_eq!(edit.insert, "y");
        assert_eq!(edit.delta(), 1);

        // Repeated characters: prefix and suffix must not overlap.
        let edit = TextEdit::between("aaa", "aa");
        assert_eq!((edit.delete, edit.insert.as_str()), (range(2, 3), ""));

        let edit = TextEdit::between("é", "è");
        assert_eq!(edit.delete, range(0, 2));
        assert_eq!(edit.insert, "è");

        assert!(TextEdit::between("same", "same").is_empty());
    }

    #[test]
    fn text_edit_apply_reproduces_new_text() {
        let old = "fn f() { let a = 1; }";
        let new = "fn f() { let abc = 1; a }";
        let edit = TextEdit::between(old, new);
        let mut text = old.to_string();
        edit.apply(&mut text);
        assert_eq!(text, new);
    }
}
