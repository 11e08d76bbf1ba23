//! Symbols, references and locations.

use rill_parser::TextRange;
use url::Url;

use super::scope::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Struct,
    Field,
    Parameter,
    Variable,
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Struct => "struct",
            SymbolKind::Field => "field",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
        }
    }
}

/// A declared name in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Range of the declaring identifier.
    pub name_range: TextRange,
    /// Range of the whole declaration.
    pub full_range: TextRange,
    /// Scope the name is declared in.
    pub scope: ScopeId,
    /// `pub` at the top level of the file.
    pub exported: bool,
    /// One-line signature, e.g. `fn add(a: Int, b: Int) -> Int`.
    pub detail: String,
    /// Enclosing function or struct, as an index into the file's symbols.
    pub container: Option<usize>,
}

/// Stable identity of a symbol: where it is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolId {
    pub uri: Url,
    pub definition: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub uri: Url,
    pub range: TextRange,
}

/// What a use of a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Index into the file's symbols.
    Local(usize),
    Builtin,
    Unresolved,
}

/// One using occurrence of a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub range: TextRange,
    pub name: String,
    pub resolution: Resolution,
}

/// Values available everywhere without a declaration.
pub const BUILTIN_VALUES: &[(&str, &str)] = &[
    ("print", "fn print(value)"),
    ("println", "fn println(value)"),
    ("len", "fn len(value) -> Int"),
    ("assert", "fn assert(condition: Bool)"),
    ("to_string", "fn to_string(value) -> String"),
];

/// Types available everywhere without a declaration.
pub const BUILTIN_TYPES: &[&str] = &["Int", "Float", "String", "Bool", "Nil"];

pub fn builtin_value(name: &str) -> Option<&'static str> {
    BUILTIN_VALUES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, detail)| *detail)
}

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}
