//! Conversions between LSP types and engine types.
//!
//! The engine works in UTF-8 byte offsets only. Every `Position` that
//! crosses the boundary goes through a [`LineIndex`] together with the
//! encoding negotiated in `initialize`; nothing else in the server does
//! line/column arithmetic.

use rill_analysis::{
    CompletionCandidate, CompletionKind, Diagnostic, EditDelta, HoverInfo, OutlineItem,
    ProtocolError, SemanticDiagnosticKind, Severity, SymbolKind, WorkspaceSymbol,
};
use rill_common::{LineCol, LineIndex, PositionEncoding};
use rill_parser::{TextRange, TextSize};
use tower_lsp::lsp_types::{self as lsp, Url};

/// Choose a position encoding from the ones the client offers: the
/// configured preference if offered, else UTF-8, else UTF-32, else the
/// protocol default UTF-16.
pub fn negotiate_encoding(
    offered: Option<&[lsp::PositionEncodingKind]>,
    preferred: Option<PositionEncoding>,
) -> PositionEncoding {
    let Some(offered) = offered else {
        return PositionEncoding::Utf16;
    };
    let offers = |encoding: &PositionEncoding| offered.contains(&encoding_kind(*encoding));
    preferred
        .filter(offers)
        .or_else(|| {
            [PositionEncoding::Utf8, PositionEncoding::Utf32]
                .into_iter()
                .find(offers)
        })
        .unwrap_or(PositionEncoding::Utf16)
}

pub fn encoding_kind(encoding: PositionEncoding) -> lsp::PositionEncodingKind {
    match encoding {
        PositionEncoding::Utf8 => lsp::PositionEncodingKind::UTF8,
        PositionEncoding::Utf16 => lsp::PositionEncodingKind::UTF16,
        PositionEncoding::Utf32 => lsp::PositionEncodingKind::UTF32,
    }
}

/// Byte offset of `position`, or `None` if its line does not exist.
pub fn offset(index: &LineIndex, position: lsp::Position, encoding: PositionEncoding) -> Option<TextSize> {
    index
        .offset(LineCol::new(position.line, position.character), encoding)
        .map(TextSize::from)
}

pub fn position(index: &LineIndex, offset: TextSize, encoding: PositionEncoding) -> lsp::Position {
    let pos = index.position(offset.into(), encoding);
    lsp::Position::new(pos.line, pos.col)
}

pub fn range(index: &LineIndex, range: TextRange, encoding: PositionEncoding) -> lsp::Range {
    lsp::Range::new(
        position(index, range.start(), encoding),
        position(index, range.end(), encoding),
    )
}

pub fn location(
    uri: &Url,
    index: &LineIndex,
    text_range: TextRange,
    encoding: PositionEncoding,
) -> lsp::Location {
    lsp::Location::new(uri.clone(), range(index, text_range, encoding))
}

/// Turn one `didChange` batch into engine deltas.
///
/// Each change is relative to the text left by the changes before it, so
/// the batch is replayed on a scratch copy of `text` to convert the next
/// range against the right lines.
pub fn edit_deltas(
    uri: &Url,
    text: &str,
    changes: Vec<lsp::TextDocumentContentChangeEvent>,
    encoding: PositionEncoding,
) -> Result<Vec<EditDelta>, ProtocolError> {
    let mut current = text.to_string();
    let mut deltas = Vec::with_capacity(changes.len());
    for change in changes {
        let Some(lsp_range) = change.range else {
            current.clone_from(&change.text);
            deltas.push(EditDelta::full(change.text));
            continue;
        };
        let index = LineIndex::new(&current);
        let start = boundary_offset(uri, &current, &index, lsp_range.start, encoding)?;
        let end = boundary_offset(uri, &current, &index, lsp_range.end, encoding)?;
        if end < start {
            return Err(invalid_position(uri, lsp_range.end));
        }
        let text_range = TextRange::new(start, end);
        current.replace_range(std::ops::Range::<usize>::from(text_range), &change.text);
        deltas.push(EditDelta::replace(text_range, change.text));
    }
    Ok(deltas)
}

fn boundary_offset(
    uri: &Url,
    text: &str,
    index: &LineIndex,
    position: lsp::Position,
    encoding: PositionEncoding,
) -> Result<TextSize, ProtocolError> {
    offset(index, position, encoding)
        .filter(|offset| text.is_char_boundary(usize::from(*offset)))
        .ok_or_else(|| invalid_position(uri, position))
}

fn invalid_position(uri: &Url, position: lsp::Position) -> ProtocolError {
    ProtocolError::InvalidPosition {
        uri: uri.clone(),
        line: position.line,
        character: position.character,
    }
}

pub fn severity(severity: Severity) -> lsp::DiagnosticSeverity {
    match severity {
        Severity::Error => lsp::DiagnosticSeverity::ERROR,
        Severity::Warning => lsp::DiagnosticSeverity::WARNING,
    }
}

pub fn diagnostic(
    uri: &Url,
    index: &LineIndex,
    encoding: PositionEncoding,
    diagnostic: &Diagnostic,
) -> lsp::Diagnostic {
    let related = |message: &str, related_range: TextRange| {
        vec![lsp::DiagnosticRelatedInformation {
            location: location(uri, index, related_range, encoding),
            message: message.to_string(),
        }]
    };

    let (code, related_information, tags) = match diagnostic {
        Diagnostic::Syntax(d) => (
            None,
            d.related.as_ref().map(|(message, r)| related(message, *r)),
            None,
        ),
        Diagnostic::Semantic(d) => {
            let code = Some(lsp::NumberOrString::String(d.code().to_string()));
            match &d.kind {
                SemanticDiagnosticKind::DuplicateDefinition { first, .. } => {
                    (code, Some(related("first defined here", *first)), None)
                }
                SemanticDiagnosticKind::UnusedVariable { .. } => {
                    (code, None, Some(vec![lsp::DiagnosticTag::UNNECESSARY]))
                }
                SemanticDiagnosticKind::UnresolvedReference { .. } => (code, None, None),
            }
        }
    };

    lsp::Diagnostic {
        range: range(index, diagnostic.range(), encoding),
        severity: Some(severity(diagnostic.severity())),
        code,
        source: Some(format!("rill {}", diagnostic.source_tag())),
        message: diagnostic.message(),
        related_information,
        tags,
        ..Default::default()
    }
}

pub fn completion_kind(kind: CompletionKind) -> lsp::CompletionItemKind {
    match kind {
        CompletionKind::Function | CompletionKind::BuiltinFunction => {
            lsp::CompletionItemKind::FUNCTION
        }
        CompletionKind::Struct | CompletionKind::BuiltinType => lsp::CompletionItemKind::STRUCT,
        CompletionKind::Field => lsp::CompletionItemKind::FIELD,
        CompletionKind::Variable | CompletionKind::Parameter => lsp::CompletionItemKind::VARIABLE,
        CompletionKind::Keyword => lsp::CompletionItemKind::KEYWORD,
    }
}

/// Completion items in engine order. `sort_text` pins that order so the
/// client does not re-sort alphabetically.
pub fn completion_items(candidates: Vec<CompletionCandidate>) -> Vec<lsp::CompletionItem> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(rank, candidate)| lsp::CompletionItem {
            label: candidate.label,
            kind: Some(completion_kind(candidate.kind)),
            detail: candidate.detail,
            sort_text: Some(format!("{rank:05}")),
            ..Default::default()
        })
        .collect()
}

pub fn symbol_kind(kind: SymbolKind) -> lsp::SymbolKind {
    match kind {
        SymbolKind::Function => lsp::SymbolKind::FUNCTION,
        SymbolKind::Struct => lsp::SymbolKind::STRUCT,
        SymbolKind::Field => lsp::SymbolKind::FIELD,
        SymbolKind::Parameter | SymbolKind::Variable => lsp::SymbolKind::VARIABLE,
    }
}

pub fn hover(index: &LineIndex, encoding: PositionEncoding, info: HoverInfo) -> lsp::Hover {
    lsp::Hover {
        contents: lsp::HoverContents::Markup(lsp::MarkupContent {
            kind: lsp::MarkupKind::Markdown,
            value: info.markdown,
        }),
        range: Some(range(index, info.range, encoding)),
    }
}

#[allow(deprecated)] // `deprecated` is deprecated but still a required field
pub fn document_symbol(
    index: &LineIndex,
    encoding: PositionEncoding,
    item: &OutlineItem,
) -> lsp::DocumentSymbol {
    let children: Vec<lsp::DocumentSymbol> = item
        .children
        .iter()
        .map(|child| document_symbol(index, encoding, child))
        .collect();
    lsp::DocumentSymbol {
        name: item.name.clone(),
        detail: Some(item.detail.clone()),
        kind: symbol_kind(item.kind),
        tags: None,
        deprecated: None,
        range: range(index, item.range, encoding),
        selection_range: range(index, item.selection_range, encoding),
        children: (!children.is_empty()).then_some(children),
    }
}

#[allow(deprecated)]
pub fn symbol_information(
    index: &LineIndex,
    encoding: PositionEncoding,
    symbol: &WorkspaceSymbol,
) -> lsp::SymbolInformation {
    lsp::SymbolInformation {
        name: symbol.name.clone(),
        kind: symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        location: location(&symbol.location.uri, index, symbol.location.range, encoding),
        container_name: Some(symbol.container_name.clone()),
    }
}
