//! Lexical scopes and the pass that builds them from a syntax tree.
//!
//! One walk over the CST declares every symbol and records every use of a
//! name together with the innermost scope it appears in. Resolution runs
//! afterwards, so functions and structs declared later in a scope are
//! already known (hoisting) while `let` bindings only become visible once
//! their statement has ended.

use rill_parser::{SyntaxKind, SyntaxNode, TextRange, TextSize};
use rustc_hash::FxHashMap;

use super::symbol::{builtin_value, is_builtin_type, Reference, Resolution, Symbol, SymbolKind};
use crate::diagnostics::{SemanticDiagnostic, SemanticDiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The file scope is always created first.
    pub const FILE: ScopeId = ScopeId(0);

    pub(crate) fn from_index(index: usize) -> ScopeId {
        ScopeId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    /// Parameters and the body of a function.
    Function,
    /// A nested `{ ... }`: `if`/`while` bodies and block expressions.
    Block,
}

/// A name declared in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub name: String,
    pub symbol: usize,
    /// Uses before this offset do not see the entry.
    pub visible_from: TextSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub range: TextRange,
    pub entries: Vec<ScopeEntry>,
}

impl Scope {
    /// Whether a cursor at `offset` is inside this scope.
    pub fn contains(&self, offset: TextSize) -> bool {
        match self.kind {
            ScopeKind::File => true,
            ScopeKind::Function | ScopeKind::Block => {
                self.range.start() < offset && offset < self.range.end()
            }
        }
    }
}

/// Find the symbol `name` refers to at `offset`, starting in `scope` and
/// moving outwards. The innermost, latest visible declaration wins.
pub(crate) fn lookup(
    scopes: &[Scope],
    symbols: &[Symbol],
    mut scope: ScopeId,
    name: &str,
    offset: TextSize,
    types_only: bool,
) -> Option<usize> {
    loop {
        let current = &scopes[scope.index()];
        let found = current.entries.iter().rev().find(|entry| {
            entry.name == name
                && entry.visible_from <= offset
                && (!types_only || symbols[entry.symbol].kind == SymbolKind::Struct)
        });
        if let Some(entry) = found {
            return Some(entry.symbol);
        }
        scope = current.parent?;
    }
}

/// Everything the index knows about one tree.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub symbols: Vec<Symbol>,
    pub scopes: Vec<Scope>,
    pub references: Vec<Reference>,
    pub diagnostics: Vec<SemanticDiagnostic>,
}

pub(crate) fn collect(root: &SyntaxNode) -> Collected {
    let mut collector = Collector::default();
    let file = collector.push_scope(ScopeKind::File, root.text_range(), None);
    collector.walk_children(root, file);
    collector.resolve();
    collector.check_duplicates();
    collector.check_unused();

    let mut out = collector.out;
    out.diagnostics
        .sort_by_key(|d| (d.range.start(), d.range.end()));
    out
}

struct PendingReference {
    range: TextRange,
    name: String,
    scope: ScopeId,
    types_only: bool,
}

struct Declaration {
    name: String,
    kind: SymbolKind,
    name_range: TextRange,
    full_range: TextRange,
    scope: ScopeId,
    visible_from: Option<TextSize>,
    exported: bool,
    detail: String,
}

#[derive(Default)]
struct Collector {
    out: Collected,
    pending: Vec<PendingReference>,
    /// Enclosing function/struct symbols, innermost last.
    containers: Vec<usize>,
}

impl Collector {
    fn push_scope(&mut self, kind: ScopeKind, range: TextRange, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.out.scopes.len() as u32);
        self.out.scopes.push(Scope {
            kind,
            parent,
            range,
            entries: Vec::new(),
        });
        id
    }

    /// Start of `scope`, where hoisted declarations become visible.
    fn scope_start(&self, scope: ScopeId) -> TextSize {
        self.out.scopes[scope.index()].range.start()
    }

    fn declare(&mut self, decl: Declaration) -> usize {
        let index = self.out.symbols.len();
        if let Some(visible_from) = decl.visible_from {
            self.out.scopes[decl.scope.index()].entries.push(ScopeEntry {
                name: decl.name.clone(),
                symbol: index,
                visible_from,
            });
        }
        self.out.symbols.push(Symbol {
            name: decl.name,
            kind: decl.kind,
            name_range: decl.name_range,
            full_range: decl.full_range,
            scope: decl.scope,
            exported: decl.exported,
            detail: decl.detail,
            container: self.containers.last().copied(),
        });
        index
    }

    fn walk_children(&mut self, node: &SyntaxNode, scope: ScopeId) {
        for child in node.children() {
            self.walk(&child, scope);
        }
    }

    fn walk(&mut self, node: &SyntaxNode, scope: ScopeId) {
        match node.kind() {
            SyntaxKind::FN_DEF => self.function(node, scope),
            SyntaxKind::STRUCT_DEF => self.structure(node, scope),
            SyntaxKind::LET_STMT => self.let_stmt(node, scope),
            SyntaxKind::BLOCK => {
                let inner = self.push_scope(ScopeKind::Block, node.text_range(), Some(scope));
                self.walk_children(node, inner);
            }
            SyntaxKind::NAME_REF => self.reference(node, scope, false),
            SyntaxKind::TYPE_REF => self.reference(node, scope, true),
            // Field names need type information; only the receiver is resolved.
            SyntaxKind::FIELD_ACCESS => {
                if let Some(receiver) = node.children().next() {
                    self.walk(&receiver, scope);
                }
            }
            _ => self.walk_children(node, scope),
        }
    }

    fn function(&mut self, node: &SyntaxNode, scope: ScopeId) {
        let exported = is_exported(node, scope);
        let symbol = name_of(node).map(|(name, name_range)| {
            let detail = fn_detail(node, &name, exported);
            let visible_from = Some(self.scope_start(scope));
            self.declare(Declaration {
                name,
                kind: SymbolKind::Function,
                name_range,
                full_range: node.text_range(),
                scope,
                visible_from,
                exported,
                detail,
            })
        });

        let fn_scope = self.push_scope(ScopeKind::Function, node.text_range(), Some(scope));
        if let Some(symbol) = symbol {
            self.containers.push(symbol);
        }
        for child in node.children() {
            match child.kind() {
                SyntaxKind::PARAM_LIST => {
                    for param in child.children().filter(|c| c.kind() == SyntaxKind::PARAM) {
                        self.walk_children(&param, fn_scope);
                        if let Some((name, name_range)) = name_of(&param) {
                            let detail = binding_detail(&param, &name);
                            self.declare(Declaration {
                                name,
                                kind: SymbolKind::Parameter,
                                name_range,
                                full_range: param.text_range(),
                                scope: fn_scope,
                                visible_from: Some(node.text_range().start()),
                                exported: false,
                                detail,
                            });
                        }
                    }
                }
                // The body shares the function scope with the parameters.
                SyntaxKind::BLOCK => self.walk_children(&child, fn_scope),
                _ => self.walk(&child, fn_scope),
            }
        }
        if symbol.is_some() {
            self.containers.pop();
        }
    }

    fn structure(&mut self, node: &SyntaxNode, scope: ScopeId) {
        let exported = is_exported(node, scope);
        let symbol = name_of(node).map(|(name, name_range)| {
            let detail = struct_detail(node, &name, exported);
            let visible_from = Some(self.scope_start(scope));
            self.declare(Declaration {
                name,
                kind: SymbolKind::Struct,
                name_range,
                full_range: node.text_range(),
                scope,
                visible_from,
                exported,
                detail,
            })
        });

        if let Some(symbol) = symbol {
            self.containers.push(symbol);
        }
        let mut seen: FxHashMap<String, TextRange> = FxHashMap::default();
        let fields = node
            .children()
            .filter(|c| c.kind() == SyntaxKind::FIELD_LIST)
            .flat_map(|list| list.children())
            .filter(|c| c.kind() == SyntaxKind::FIELD);
        for field in fields {
            self.walk_children(&field, scope);
            let Some((name, name_range)) = name_of(&field) else {
                continue;
            };
            if let Some(&first) = seen.get(&name) {
                self.out.diagnostics.push(SemanticDiagnostic {
                    kind: SemanticDiagnosticKind::DuplicateDefinition {
                        name: name.clone(),
                        first,
                    },
                    range: name_range,
                });
            } else {
                seen.insert(name.clone(), name_range);
            }
            let detail = binding_detail(&field, &name);
            // Fields are reached through a value, never by plain name.
            self.declare(Declaration {
                name,
                kind: SymbolKind::Field,
                name_range,
                full_range: field.text_range(),
                scope,
                visible_from: None,
                exported: false,
                detail,
            });
        }
        if symbol.is_some() {
            self.containers.pop();
        }
    }

    fn let_stmt(&mut self, node: &SyntaxNode, scope: ScopeId) {
        // Initializer first: `let x = x + 1;` sees the outer `x`.
        for child in node.children().filter(|c| c.kind() != SyntaxKind::NAME) {
            self.walk(&child, scope);
        }
        let Some((name, name_range)) = name_of(node) else {
            return;
        };
        let exported = is_exported(node, scope);
        let mut detail = format!("let {}", binding_detail(node, &name));
        if exported {
            detail.insert_str(0, "pub ");
        }
        self.declare(Declaration {
            name,
            kind: SymbolKind::Variable,
            name_range,
            full_range: node.text_range(),
            scope,
            visible_from: Some(node.text_range().end()),
            exported,
            detail,
        });
    }

    fn reference(&mut self, node: &SyntaxNode, scope: ScopeId, types_only: bool) {
        if let Some(ident) = ident_token(node) {
            self.pending.push(PendingReference {
                range: ident.text_range(),
                name: ident.text().to_string(),
                scope,
                types_only,
            });
        }
    }

    fn resolve(&mut self) {
        for pending in std::mem::take(&mut self.pending) {
            let local = lookup(
                &self.out.scopes,
                &self.out.symbols,
                pending.scope,
                &pending.name,
                pending.range.start(),
                pending.types_only,
            );
            let builtin = if pending.types_only {
                is_builtin_type(&pending.name)
            } else {
                builtin_value(&pending.name).is_some()
            };
            let resolution = match local {
                Some(symbol) => Resolution::Local(symbol),
                None if builtin => Resolution::Builtin,
                None => {
                    self.out.diagnostics.push(SemanticDiagnostic {
                        kind: SemanticDiagnosticKind::UnresolvedReference {
                            name: pending.name.clone(),
                        },
                        range: pending.range,
                    });
                    Resolution::Unresolved
                }
            };
            self.out.references.push(Reference {
                range: pending.range,
                name: pending.name,
                resolution,
            });
        }
    }

    /// Two functions or structs with one name in one scope. `let`
    /// shadowing is fine.
    fn check_duplicates(&mut self) {
        for scope in &self.out.scopes {
            let mut first: FxHashMap<&str, TextRange> = FxHashMap::default();
            for entry in &scope.entries {
                let symbol = &self.out.symbols[entry.symbol];
                if !matches!(symbol.kind, SymbolKind::Function | SymbolKind::Struct) {
                    continue;
                }
                match first.get(symbol.name.as_str()) {
                    Some(&range) => self.out.diagnostics.push(SemanticDiagnostic {
                        kind: SemanticDiagnosticKind::DuplicateDefinition {
                            name: symbol.name.clone(),
                            first: range,
                        },
                        range: symbol.name_range,
                    }),
                    None => {
                        first.insert(&symbol.name, symbol.name_range);
                    }
                }
            }
        }
    }

    fn check_unused(&mut self) {
        let mut uses = vec![0usize; self.out.symbols.len()];
        for reference in &self.out.references {
            if let Resolution::Local(symbol) = reference.resolution {
                uses[symbol] += 1;
            }
        }
        for (symbol, count) in self.out.symbols.iter().zip(uses) {
            let local = match symbol.kind {
                SymbolKind::Parameter => true,
                SymbolKind::Variable => symbol.scope != ScopeId::FILE,
                _ => false,
            };
            if local && count == 0 && !symbol.name.starts_with('_') {
                self.out.diagnostics.push(SemanticDiagnostic {
                    kind: SemanticDiagnosticKind::UnusedVariable {
                        name: symbol.name.clone(),
                    },
                    range: symbol.name_range,
                });
            }
        }
    }
}

fn is_exported(node: &SyntaxNode, scope: ScopeId) -> bool {
    scope == ScopeId::FILE && node.children().any(|c| c.kind() == SyntaxKind::VISIBILITY)
}

fn ident_token(node: &SyntaxNode) -> Option<rill_parser::SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|element| element.into_token())
        .find(|token| token.kind() == SyntaxKind::IDENT)
}

/// Name and range of the `NAME` child of a declaration.
fn name_of(node: &SyntaxNode) -> Option<(String, TextRange)> {
    let name = node.children().find(|c| c.kind() == SyntaxKind::NAME)?;
    let ident = ident_token(&name)?;
    Some((ident.text().to_string(), ident.text_range()))
}

/// Text of the `TYPE_REF` under a `TYPE_ANNOTATION` or `RET_TYPE` child.
fn type_of(node: &SyntaxNode, wrapper: SyntaxKind) -> Option<String> {
    let wrapper = node.children().find(|c| c.kind() == wrapper)?;
    let type_ref = wrapper.children().find(|c| c.kind() == SyntaxKind::TYPE_REF)?;
    ident_token(&type_ref).map(|t| t.text().to_string())
}

/// `name: Type`, or just `name` without an annotation.
fn binding_detail(node: &SyntaxNode, name: &str) -> String {
    match type_of(node, SyntaxKind::TYPE_ANNOTATION) {
        Some(ty) => format!("{name}: {ty}"),
        None => name.to_string(),
    }
}

fn fn_detail(node: &SyntaxNode, name: &str, exported: bool) -> String {
    let params: Vec<String> = node
        .children()
        .filter(|c| c.kind() == SyntaxKind::PARAM_LIST)
        .flat_map(|list| list.children())
        .filter(|c| c.kind() == SyntaxKind::PARAM)
        .filter_map(|param| name_of(&param).map(|(n, _)| binding_detail(&param, &n)))
        .collect();
    let ret = type_of(node, SyntaxKind::RET_TYPE)
        .map(|ty| format!(" -> {ty}"))
        .unwrap_or_default();
    let vis = if exported { "pub " } else { "" };
    format!("{vis}fn {name}({}){ret}", params.join(", "))
}

fn struct_detail(node: &SyntaxNode, name: &str, exported: bool) -> String {
    let fields: Vec<String> = node
        .children()
        .filter(|c| c.kind() == SyntaxKind::FIELD_LIST)
        .flat_map(|list| list.children())
        .filter(|c| c.kind() == SyntaxKind::FIELD)
        .filter_map(|field| name_of(&field).map(|(n, _)| binding_detail(&field, &n)))
        .collect();
    let vis = if exported { "pub " } else { "" };
    if fields.is_empty() {
        format!("{vis}struct {name} {{}}")
    } else {
        format!("{vis}struct {name} {{ {} }}", fields.join(", "))
    }
}
