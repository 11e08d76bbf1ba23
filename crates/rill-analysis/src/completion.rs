//! Completion candidates at a cursor position.
//!
//! Candidates come in tiers: names visible from the cursor, keywords,
//! builtins, then symbols exported by other open documents. Within the
//! local tier the ranking key is (scope distance, prefix-match quality,
//! distance between cursor and declaration, declaration order).

use rill_common::token::KEYWORDS;
use rill_lexer::is_ident_start;
use rill_parser::{SyntaxKind, SyntaxToken, TextSize};
use rowan::TokenAtOffset;
use rustc_hash::FxHashSet;

use crate::index::{ExportedSymbol, FileIndex, SymbolKind, BUILTIN_TYPES, BUILTIN_VALUES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    Function,
    Struct,
    Field,
    Variable,
    Parameter,
    Keyword,
    BuiltinFunction,
    BuiltinType,
}

impl From<SymbolKind> for CompletionKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Function => CompletionKind::Function,
            SymbolKind::Struct => CompletionKind::Struct,
            SymbolKind::Field => CompletionKind::Field,
            SymbolKind::Parameter => CompletionKind::Parameter,
            SymbolKind::Variable => CompletionKind::Variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
}

/// How well `label` matches a typed `prefix`: 0 for a prefix of the same
/// case (or an empty prefix), 1 for a case-insensitive prefix, 2 for a
/// case-insensitive subsequence. `None` if it does not match at all.
pub fn match_quality(label: &str, prefix: &str) -> Option<u8> {
    if prefix.is_empty() || label.starts_with(prefix) {
        return Some(0);
    }
    let label = label.to_lowercase();
    let prefix = prefix.to_lowercase();
    if label.starts_with(&prefix) {
        return Some(1);
    }
    let mut rest = label.chars();
    prefix
        .chars()
        .all(|c| rest.any(|l| l == c))
        .then_some(2)
}

#[derive(Debug, PartialEq, Eq)]
enum Context {
    /// A plain name is being typed.
    Name { prefix: String },
    /// A field name after `.`.
    Field { prefix: String },
    /// Inside a comment, a string, or a declaring identifier.
    Nothing,
}

fn context(file: &FileIndex, offset: TextSize) -> Context {
    if offset > file.len() {
        return Context::Nothing;
    }
    let root = file.syntax();
    let token = match root.token_at_offset(offset) {
        TokenAtOffset::None => {
            return Context::Name {
                prefix: String::new(),
            }
        }
        TokenAtOffset::Single(token) => token,
        TokenAtOffset::Between(left, _) => left,
    };

    if matches!(
        token.kind(),
        SyntaxKind::COMMENT | SyntaxKind::STRING_LITERAL | SyntaxKind::ERROR
    ) {
        return Context::Nothing;
    }

    if !token.text().starts_with(is_ident_start) {
        return if token.kind() == SyntaxKind::DOT {
            Context::Field {
                prefix: String::new(),
            }
        } else {
            Context::Name {
                prefix: String::new(),
            }
        };
    }

    if token.parent().is_some_and(|p| p.kind() == SyntaxKind::NAME) {
        return Context::Nothing;
    }
    let typed = usize::from(offset - token.text_range().start());
    let Some(prefix) = token.text().get(..typed) else {
        return Context::Nothing;
    };
    let prefix = prefix.to_string();
    if previous_significant(&token).is_some_and(|t| t.kind() == SyntaxKind::DOT) {
        Context::Field { prefix }
    } else {
        Context::Name { prefix }
    }
}

fn previous_significant(token: &SyntaxToken) -> Option<SyntaxToken> {
    let mut cursor = token.prev_token();
    while let Some(prev) = cursor {
        if !prev.kind().is_trivia() {
            return Some(prev);
        }
        cursor = prev.prev_token();
    }
    None
}

/// Candidates for a cursor at `offset` in `file`, at most `limit` of them.
/// `exports` are the exported symbols of the other open documents.
pub fn complete(
    file: &FileIndex,
    offset: TextSize,
    exports: &[ExportedSymbol],
    limit: usize,
) -> Vec<CompletionCandidate> {
    let mut items = match context(file, offset) {
        Context::Nothing => Vec::new(),
        Context::Field { prefix } => field_candidates(file, &prefix),
        Context::Name { prefix } => name_candidates(file, offset, &prefix, exports),
    };
    items.truncate(limit);
    items
}

fn field_candidates(file: &FileIndex, prefix: &str) -> Vec<CompletionCandidate> {
    let mut seen = FxHashSet::default();
    let mut ranked: Vec<(u8, CompletionCandidate)> = file
        .symbols()
        .iter()
        .filter(|s| s.kind == SymbolKind::Field)
        .filter(|s| seen.insert(s.name.as_str()))
        .filter_map(|s| {
            let quality = match_quality(&s.name, prefix)?;
            let owner = s.container.map(|c| file.symbols()[c].name.as_str());
            let detail = match owner {
                Some(owner) => format!("{owner}.{}", s.detail),
                None => s.detail.clone(),
            };
            Some((
                quality,
                CompletionCandidate {
                    label: s.name.clone(),
                    kind: CompletionKind::Field,
                    detail: Some(detail),
                },
            ))
        })
        .collect();
    ranked.sort_by(|(qa, a), (qb, b)| (qa, &a.label).cmp(&(qb, &b.label)));
    ranked.into_iter().map(|(_, item)| item).collect()
}

fn name_candidates(
    file: &FileIndex,
    offset: TextSize,
    prefix: &str,
    exports: &[ExportedSymbol],
) -> Vec<CompletionCandidate> {
    let cursor = u32::from(offset);
    let mut locals: Vec<((u32, u8, u32, usize), CompletionCandidate)> = file
        .visible_symbols(offset)
        .into_iter()
        .filter_map(|(index, distance)| {
            let symbol = &file.symbols()[index];
            let quality = match_quality(&symbol.name, prefix)?;
            let lexical = cursor.abs_diff(u32::from(symbol.name_range.start()));
            let item = CompletionCandidate {
                label: symbol.name.clone(),
                kind: symbol.kind.into(),
                detail: Some(symbol.detail.clone()),
            };
            Some(((distance, quality, lexical, index), item))
        })
        .collect();
    locals.sort_by_key(|(key, _)| *key);

    let mut labels: FxHashSet<String> = FxHashSet::default();
    let mut items = Vec::new();
    let mut push = |item: CompletionCandidate, items: &mut Vec<CompletionCandidate>| {
        if labels.insert(item.label.clone()) {
            items.push(item);
        }
    };

    for (_, item) in locals {
        push(item, &mut items);
    }

    for item in by_quality(prefix, KEYWORDS.iter().copied().map(keyword)) {
        push(item, &mut items);
    }

    let builtins = BUILTIN_VALUES
        .iter()
        .map(|(name, detail)| CompletionCandidate {
            label: name.to_string(),
            kind: CompletionKind::BuiltinFunction,
            detail: Some(detail.to_string()),
        })
        .chain(BUILTIN_TYPES.iter().map(|name| CompletionCandidate {
            label: name.to_string(),
            kind: CompletionKind::BuiltinType,
            detail: None,
        }));
    for item in by_quality(prefix, builtins) {
        push(item, &mut items);
    }

    let exported = exports.iter().map(|e| CompletionCandidate {
        label: e.name.clone(),
        kind: e.kind.into(),
        detail: Some(format!("{}: {}", e.qualified_name, e.detail)),
    });
    for item in by_quality(prefix, exported) {
        push(item, &mut items);
    }

    items
}

fn keyword(kw: &str) -> CompletionCandidate {
    CompletionCandidate {
        label: kw.to_string(),
        kind: CompletionKind::Keyword,
        detail: None,
    }
}

/// Matching candidates, better matches first, otherwise in input order.
fn by_quality(
    prefix: &str,
    candidates: impl Iterator<Item = CompletionCandidate>,
) -> Vec<CompletionCandidate> {
    let mut ranked: Vec<(u8, CompletionCandidate)> = candidates
        .filter_map(|item| match_quality(&item.label, prefix).map(|q| (q, item)))
        .collect();
    ranked.sort_by_key(|(quality, _)| *quality);
    ranked.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Location;
    use crate::reparse::SyntaxTree;
    use url::Url;

    fn file(text: &str) -> FileIndex {
        let uri = Url::parse("file:///w/main.rill").unwrap();
        FileIndex::new(&uri, 1, &SyntaxTree::parse(text))
    }

    /// Labels offered at the `$` marker.
    fn labels_at(marked: &str, exports: &[ExportedSymbol], limit: usize) -> Vec<String> {
        let offset = marked.find('$').unwrap();
        let text = marked.replacen('$', "", 1);
        complete(&file(&text), TextSize::from(offset as u32), exports, limit)
            .into_iter()
            .map(|c| c.label)
            .collect()
    }

    #[test]
    fn quality_levels() {
        assert_eq!(match_quality("counter", ""), Some(0));
        assert_eq!(match_quality("counter", "cou"), Some(0));
        assert_eq!(match_quality("Counter", "cou"), Some(1));
        assert_eq!(match_quality("my_counter", "mcn"), Some(2));
        assert_eq!(match_quality("counter", "x"), None);
    }

    #[test]
    fn inner_scope_ranks_first() {
        let labels = labels_at(
            "let total = 0;\nfn f(tally) {\n  let temp = 1;\n  t$\n}\n",
            &[],
            4,
        );
        assert_eq!(labels, vec!["temp", "tally", "total", "true"]);
    }

    #[test]
    fn nearer_declaration_breaks_ties() {
        let labels = labels_at("let alpha = 1;\nlet also = 2;\nal$", &[], 2);
        assert_eq!(labels, vec!["also", "alpha"]);
    }

    #[test]
    fn later_lets_are_not_offered() {
        let labels = labels_at("fn f() {\n  zz$\n  let zzz = 1;\n}\n", &[], 10);
        assert!(labels.is_empty(), "{labels:?}");
    }

    #[test]
    fn builtins_and_exports_follow_locals() {
        let exports = vec![ExportedSymbol {
            qualified_name: "util::printer".to_string(),
            name: "printer".to_string(),
            kind: SymbolKind::Function,
            detail: "pub fn printer()".to_string(),
            location: Location {
                uri: Url::parse("file:///w/util.rill").unwrap(),
                range: Default::default(),
            },
        }];
        let labels = labels_at("let prim = 1;\npri$", &exports, 10);
        assert_eq!(labels, vec!["prim", "print", "println", "printer"]);
    }

    #[test]
    fn fields_after_dot() {
        let labels = labels_at(
            "struct P { width: Int, height: Int }\nstruct Q { width: Int }\nfn f(p) { p.$ }\n",
            &[],
            10,
        );
        assert_eq!(labels, vec!["height", "width"]);
        let labels = labels_at(
            "struct P { width: Int, height: Int }\nfn f(p) { p.he$ }\n",
            &[],
            10,
        );
        assert_eq!(labels, vec!["height"]);
    }

    #[test]
    fn nothing_in_comments_strings_and_declarations() {
        assert!(labels_at("// pri$\n", &[], 10).is_empty());
        assert!(labels_at("let s = \"pri$\";\n", &[], 10).is_empty());
        assert!(labels_at("let pri$ = 1;\n", &[], 10).is_empty());
    }

    #[test]
    fn limit_truncates() {
        assert_eq!(labels_at("$", &[], 3).len(), 3);
    }
}
