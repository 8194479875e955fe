//! Hierarchical document symbols from the heading outline.

use std::path::Path;
use tower_lsp::lsp_types::{DocumentSymbol, Position, Range, SymbolKind};
use vellum_analysis::{OutlineNode, Workspace};

/// Convert an outline subtree to LSP document symbols. Nodes whose
/// positions cannot be resolved (the file vanished between queries) are
/// dropped rather than reported at a bogus location.
pub fn from_outline(
    workspace: &mut Workspace,
    path: &Path,
    outline: &[OutlineNode],
) -> Vec<DocumentSymbol> {
    outline
        .iter()
        .filter_map(|node| symbol(workspace, path, node))
        .collect()
}

// DocumentSymbol's `deprecated` field is itself deprecated but mandatory
// to construct.
#[allow(deprecated)]
fn symbol(workspace: &mut Workspace, path: &Path, node: &OutlineNode) -> Option<DocumentSymbol> {
    let start = workspace.line_col(path, node.span.pos)?;
    let end = workspace.line_col(path, node.span.end())?;
    let range = Range {
        start: Position {
            line: start.0 as u32,
            character: start.1 as u32,
        },
        end: Position {
            line: end.0 as u32,
            character: end.1 as u32,
        },
    };
    let children = from_outline(workspace, path, &node.children);
    Some(DocumentSymbol {
        name: if node.title.is_empty() {
            format!("(level {})", node.level)
        } else {
            node.title.clone()
        },
        detail: Some(format!("level {}", node.level)),
        kind: SymbolKind::NAMESPACE,
        tags: None,
        deprecated: None,
        range,
        selection_range: range,
        children: (!children.is_empty()).then_some(children),
    })
}
