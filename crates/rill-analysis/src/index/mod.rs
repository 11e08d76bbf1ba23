//! Semantic Index.
//!
//! [`FileIndex`] is the immutable result of analyzing one tree: symbols,
//! scopes, resolved references and semantic diagnostics, plus the tree
//! itself so every query sees a consistent pair. [`SemanticIndex`] keeps
//! the current `FileIndex` of every open document together with the table
//! of exported symbols, and swaps a document's entries in one step.

mod scope;
mod symbol;

use std::sync::Arc;

use parking_lot::RwLock;
use rill_parser::{GreenNode, SyntaxNode, TextRange, TextSize};
use rustc_hash::{FxHashMap, FxHashSet};
use url::Url;

pub use scope::{Scope, ScopeEntry, ScopeId, ScopeKind};
pub use symbol::{
    builtin_value, is_builtin_type, Location, Reference, Resolution, Symbol, SymbolId, SymbolKind,
    BUILTIN_TYPES, BUILTIN_VALUES,
};

use crate::cancel::{CancellationToken, Cancelled};
use crate::completion::{self, CompletionCandidate};
use crate::diagnostics::SemanticDiagnostic;
use crate::reparse::SyntaxTree;

/// Hover contents for an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverInfo {
    pub range: TextRange,
    /// Markdown with a `rill` code block.
    pub markdown: String,
}

/// One entry of the hierarchical document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: String,
    pub range: TextRange,
    pub selection_range: TextRange,
    pub children: Vec<OutlineItem>,
}

/// A `pub` top-level item visible to other documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSymbol {
    /// `<file stem>::<name>`
    pub qualified_name: String,
    pub name: String,
    pub kind: SymbolKind,
    pub detail: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    /// Module, or `module::function` for nested declarations.
    pub container_name: String,
}

/// Semantic facts about one version of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIndex {
    uri: Url,
    version: i32,
    module: String,
    green: GreenNode,
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    references: Vec<Reference>,
    diagnostics: Vec<SemanticDiagnostic>,
}

impl FileIndex {
    pub fn new(uri: &Url, version: i32, tree: &SyntaxTree) -> Self {
        let collected = scope::collect(&tree.syntax());
        Self {
            uri: uri.clone(),
            version,
            module: module_name(uri),
            green: tree.green().clone(),
            symbols: collected.symbols,
            scopes: collected.scopes,
            references: collected.references,
            diagnostics: collected.diagnostics,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// File stem used to qualify exported names.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn diagnostics(&self) -> &[SemanticDiagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> TextSize {
        self.green.text_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == TextSize::from(0)
    }

    fn in_bounds(&self, offset: TextSize) -> bool {
        offset <= self.len()
    }

    /// Innermost scope around `offset`.
    pub fn scope_at(&self, offset: TextSize) -> ScopeId {
        // Scopes are created in preorder, so the last match is the innermost.
        self.scopes
            .iter()
            .rposition(|scope| scope.contains(offset))
            .map_or(ScopeId::FILE, ScopeId::from_index)
    }

    /// The use of a name touching `offset`, cursor at either end included.
    pub fn reference_at(&self, offset: TextSize) -> Option<&Reference> {
        self.references
            .iter()
            .find(|r| r.range.start() <= offset && offset <= r.range.end())
    }

    /// The symbol whose declaring identifier touches `offset`.
    pub fn declaration_at(&self, offset: TextSize) -> Option<usize> {
        self.symbols
            .iter()
            .position(|s| s.name_range.start() <= offset && offset <= s.name_range.end())
    }

    /// The local symbol named at `offset`, by use or by declaration.
    pub fn symbol_at(&self, offset: TextSize) -> Option<usize> {
        if !self.in_bounds(offset) {
            return None;
        }
        match self.reference_at(offset) {
            Some(reference) => match reference.resolution {
                Resolution::Local(symbol) => Some(symbol),
                Resolution::Builtin | Resolution::Unresolved => None,
            },
            None => self.declaration_at(offset),
        }
    }

    /// Declaring identifier of the name at `offset`. `None` for builtins,
    /// unresolved names and positions that are not on an identifier.
    pub fn definition_at(&self, offset: TextSize) -> Option<TextRange> {
        self.symbol_at(offset).map(|s| self.symbols[s].name_range)
    }

    /// Declaration of `symbol` followed by all of its uses.
    pub fn references_to(&self, symbol: usize) -> Vec<TextRange> {
        let Some(declared) = self.symbols.get(symbol) else {
            return Vec::new();
        };
        std::iter::once(declared.name_range)
            .chain(
                self.references
                    .iter()
                    .filter(|r| r.resolution == Resolution::Local(symbol))
                    .map(|r| r.range),
            )
            .collect()
    }

    /// Symbols a name typed at `offset` could refer to, innermost scope
    /// first, each paired with its scope distance. Shadowed names are left
    /// out.
    pub fn visible_symbols(&self, offset: TextSize) -> Vec<(usize, u32)> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut out = Vec::new();
        let mut scope = Some(self.scope_at(offset));
        let mut distance = 0;
        while let Some(id) = scope {
            let current = &self.scopes[id.index()];
            for entry in current.entries.iter().rev() {
                if entry.visible_from <= offset && seen.insert(entry.name.as_str()) {
                    out.push((entry.symbol, distance));
                }
            }
            scope = current.parent;
            distance += 1;
        }
        out
    }

    pub fn hover_at(&self, offset: TextSize) -> Option<HoverInfo> {
        if !self.in_bounds(offset) {
            return None;
        }
        let (range, detail) = match self.reference_at(offset) {
            Some(reference) => {
                let detail = match reference.resolution {
                    Resolution::Local(symbol) => self.symbols[symbol].detail.clone(),
                    Resolution::Builtin => match builtin_value(&reference.name) {
                        Some(signature) => signature.to_string(),
                        None => format!("type {}", reference.name),
                    },
                    Resolution::Unresolved => return None,
                };
                (reference.range, detail)
            }
            None => {
                let symbol = &self.symbols[self.declaration_at(offset)?];
                (symbol.name_range, symbol.detail.clone())
            }
        };
        Some(HoverInfo {
            range,
            markdown: format!("```rill\n{detail}\n```"),
        })
    }

    /// Outline: top-level items, struct fields under their struct, and
    /// nested functions and `let`s under their function.
    pub fn outline(&self) -> Vec<OutlineItem> {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.symbols.len()];
        let mut roots = Vec::new();
        for (i, symbol) in self.symbols.iter().enumerate() {
            if symbol.kind == SymbolKind::Parameter {
                continue;
            }
            match symbol.container {
                Some(parent) => children[parent].push(i),
                None => roots.push(i),
            }
        }
        roots
            .into_iter()
            .map(|i| self.outline_item(i, &children))
            .collect()
    }

    fn outline_item(&self, index: usize, children: &[Vec<usize>]) -> OutlineItem {
        let symbol = &self.symbols[index];
        OutlineItem {
            name: symbol.name.clone(),
            kind: symbol.kind,
            detail: symbol.detail.clone(),
            range: symbol.full_range,
            selection_range: symbol.name_range,
            children: children[index]
                .iter()
                .map(|&child| self.outline_item(child, children))
                .collect(),
        }
    }

    pub fn exports(&self) -> Vec<ExportedSymbol> {
        self.symbols
            .iter()
            .filter(|s| s.exported)
            .map(|s| ExportedSymbol {
                qualified_name: format!("{}::{}", self.module, s.name),
                name: s.name.clone(),
                kind: s.kind,
                detail: s.detail.clone(),
                location: Location {
                    uri: self.uri.clone(),
                    range: s.name_range,
                },
            })
            .collect()
    }

    fn workspace_symbols(&self, query: &str) -> Vec<WorkspaceSymbol> {
        self.symbols
            .iter()
            .filter(|s| match s.kind {
                SymbolKind::Function | SymbolKind::Struct | SymbolKind::Field => true,
                SymbolKind::Variable => s.scope == ScopeId::FILE,
                SymbolKind::Parameter => false,
            })
            .filter(|s| completion::match_quality(&s.name, query).is_some())
            .map(|s| WorkspaceSymbol {
                name: s.name.clone(),
                kind: s.kind,
                location: Location {
                    uri: self.uri.clone(),
                    range: s.name_range,
                },
                container_name: match s.container {
                    Some(parent) => format!("{}::{}", self.module, self.symbols[parent].name),
                    None => self.module.clone(),
                },
            })
            .collect()
    }
}

/// File stem of `uri`, the module name for exports.
fn module_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|segments| segments.last())
        .map(|file| file.strip_suffix(".rill").unwrap_or(file))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("main")
        .to_string()
}

#[derive(Debug, Default)]
struct IndexState {
    files: FxHashMap<Url, Arc<FileIndex>>,
    /// Qualified name to every document exporting it.
    exports: FxHashMap<String, Vec<ExportedSymbol>>,
    exported_by: FxHashMap<Url, Vec<String>>,
}

impl IndexState {
    fn remove_exports(&mut self, uri: &Url) {
        for name in self.exported_by.remove(uri).unwrap_or_default() {
            if let Some(entries) = self.exports.get_mut(&name) {
                entries.retain(|e| e.location.uri != *uri);
                if entries.is_empty() {
                    self.exports.remove(&name);
                }
            }
        }
    }
}

/// Per-workspace index over all open documents.
#[derive(Debug, Default)]
pub struct SemanticIndex {
    state: RwLock<IndexState>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index of `uri` from `tree` and return its semantic
    /// diagnostics.
    pub fn update(&self, uri: &Url, version: i32, tree: &SyntaxTree) -> Vec<SemanticDiagnostic> {
        self.update_file(uri, version, tree).diagnostics.clone()
    }

    /// Like [`update`](Self::update), returning the new file index.
    pub fn update_file(&self, uri: &Url, version: i32, tree: &SyntaxTree) -> Arc<FileIndex> {
        let file = Arc::new(FileIndex::new(uri, version, tree));
        self.install(uri, Arc::clone(&file));
        file
    }

    /// Make `file` the current index of `uri`. The document's exports are
    /// replaced under one write lock, so workspace lookups see either the
    /// old or the new set.
    pub fn install(&self, uri: &Url, file: Arc<FileIndex>) {
        let exports = file.exports();
        let (version, symbols, references, diagnostics) = (
            file.version,
            file.symbols.len(),
            file.references.len(),
            file.diagnostics.len(),
        );

        let mut state = self.state.write();
        state.remove_exports(uri);
        let names: Vec<String> = exports.iter().map(|e| e.qualified_name.clone()).collect();
        for export in exports {
            state
                .exports
                .entry(export.qualified_name.clone())
                .or_default()
                .push(export);
        }
        if !names.is_empty() {
            state.exported_by.insert(uri.clone(), names);
        }
        state.files.insert(uri.clone(), file);
        drop(state);

        tracing::debug!(%uri, version, symbols, references, diagnostics, "index updated");
    }

    /// Drop everything `uri` contributed.
    pub fn remove(&self, uri: &Url) {
        let mut state = self.state.write();
        state.remove_exports(uri);
        state.files.remove(uri);
    }

    pub fn file(&self, uri: &Url) -> Option<Arc<FileIndex>> {
        self.state.read().files.get(uri).cloned()
    }

    /// Exported symbols of every document except `uri`, by qualified name.
    pub fn exports_except(&self, uri: &Url) -> Vec<ExportedSymbol> {
        let state = self.state.read();
        let mut out: Vec<ExportedSymbol> = state
            .exports
            .values()
            .flatten()
            .filter(|e| e.location.uri != *uri)
            .cloned()
            .collect();
        drop(state);
        out.sort_by(|a, b| {
            (&a.qualified_name, a.location.uri.as_str())
                .cmp(&(&b.qualified_name, b.location.uri.as_str()))
        });
        out
    }

    pub fn lookup_export(&self, qualified_name: &str) -> Vec<ExportedSymbol> {
        self.state
            .read()
            .exports
            .get(qualified_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lookup_definition(&self, uri: &Url, offset: TextSize) -> Option<Location> {
        let file = self.file(uri)?;
        file.definition_at(offset).map(|range| Location {
            uri: uri.clone(),
            range,
        })
    }

    pub fn symbol_at(&self, uri: &Url, offset: TextSize) -> Option<SymbolId> {
        let file = self.file(uri)?;
        let symbol = file.symbol_at(offset)?;
        Some(SymbolId {
            uri: uri.clone(),
            definition: file.symbols[symbol].name_range,
        })
    }

    /// Declaration and uses of `id`. Resolution is file-local, so all
    /// locations are in the declaring document.
    pub fn lookup_references(&self, id: &SymbolId) -> Vec<Location> {
        let Some(file) = self.file(&id.uri) else {
            return Vec::new();
        };
        let Some(symbol) = file.symbols.iter().position(|s| s.name_range == id.definition) else {
            return Vec::new();
        };
        file.references_to(symbol)
            .into_iter()
            .map(|range| Location {
                uri: id.uri.clone(),
                range,
            })
            .collect()
    }

    pub fn completions_at(&self, uri: &Url, offset: TextSize, limit: usize) -> Vec<CompletionCandidate> {
        let Some(file) = self.file(uri) else {
            return Vec::new();
        };
        let exports = self.exports_except(uri);
        completion::complete(&file, offset, &exports, limit)
    }

    pub fn symbols_in_scope(&self, uri: &Url, offset: TextSize) -> Vec<Symbol> {
        let Some(file) = self.file(uri) else {
            return Vec::new();
        };
        file.visible_symbols(offset)
            .into_iter()
            .map(|(symbol, _)| file.symbols[symbol].clone())
            .collect()
    }

    pub fn hover(&self, uri: &Url, offset: TextSize) -> Option<HoverInfo> {
        self.file(uri)?.hover_at(offset)
    }

    pub fn document_symbols(&self, uri: &Url) -> Vec<OutlineItem> {
        self.file(uri).map(|file| file.outline()).unwrap_or_default()
    }

    /// Case-insensitive subsequence search over all documents.
    ///
    /// The lock is held only to collect the current file indexes. The
    /// token is checked before each document; a cancelled search returns
    /// no partial results.
    pub fn workspace_symbols(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<Vec<WorkspaceSymbol>, Cancelled> {
        let mut files: Vec<Arc<FileIndex>> = self.state.read().files.values().cloned().collect();
        files.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));

        let mut out = Vec::new();
        for file in files {
            token.check()?;
            out.extend(file.workspace_symbols(query));
            #[cfg(test)]
            tests::AFTER_FILE_SCANNED.with(|hook| {
                if let Some(hook) = hook.borrow_mut().as_mut() {
                    hook();
                }
            });
        }
        out.sort_by_key(|s| completion::match_quality(&s.name, query));
        Ok(out)
    }
}
