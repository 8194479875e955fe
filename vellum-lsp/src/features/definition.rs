//! Go to definition: references and citations resolve to where the
//! label or bibliography entry is defined, anywhere in the manuscript
//! graph.

use std::path::Path;
use tower_lsp::lsp_types::{GotoDefinitionResponse, Location, Position, Range, Url};
use vellum_analysis::Workspace;

/// Resolve the construct under the caret and convert the definition
/// site to wire types. `None` when the caret is not on a reference, the
/// target is undefined, or the owning file has no valid URI.
pub fn find_definition(
    workspace: &mut Workspace,
    path: &Path,
    line: usize,
    character: usize,
) -> Option<GotoDefinitionResponse> {
    let site = workspace.definition(path, line, character)?;
    let uri = Url::from_file_path(&site.path).ok()?;
    Some(GotoDefinitionResponse::Scalar(Location {
        uri,
        range: Range {
            start: Position {
                line: site.start.0 as u32,
                character: site.start.1 as u32,
            },
            end: Position {
                line: site.end.0 as u32,
                character: site.end.1 as u32,
            },
        },
    }))
}
