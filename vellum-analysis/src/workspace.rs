//! The core's face toward the protocol shell.
//!
//! All positions at this boundary are 0-based `(line, character)` pairs,
//! character counting UTF-8 codepoints; filenames are absolute paths.
//! Internally everything runs on byte offsets.
//!
//! Root manuscripts are memoized per `(root filename, format)` and
//! refreshed lazily: every query reconciles the graph with the cache
//! before reading from it.

use crate::cache::FileCache;
use crate::completion::complete;
use crate::context::{local_scan, FrameData};
use crate::error::CacheError;
use crate::help::{get_help, ParamInfo};
use crate::manuscript::{Format, Manuscript, OutlineNode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use vellum_data::Action;

/// Workspace-wide knobs, typically loaded from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_format: Format,
    /// Extra directories searched for `\input`-style filename completion.
    pub search_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: Format::Latex,
            search_paths: Vec::new(),
        }
    }
}

/// One content change from the editor.
#[derive(Debug, Clone)]
pub enum Change {
    Full {
        text: String,
    },
    Incremental {
        /// 0-based (line, character) pair, inclusive.
        start: (usize, usize),
        /// 0-based (line, character) pair, exclusive.
        end: (usize, usize),
        /// Declared byte length of the replaced range; verified against
        /// the index when present.
        range_length: Option<usize>,
        text: String,
    },
}

/// Hover reply: rendered markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hover {
    pub contents: String,
}

/// Signature help reply; always a single signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureHelp {
    pub label: String,
    pub documentation: Option<String>,
    pub parameters: Vec<ParamInfo>,
    /// 0-based index into `parameters`.
    pub active_parameter: Option<usize>,
}

/// One completion item, carrying the text edit that replaces the
/// existing prefix atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionItem {
    pub label: String,
    pub filter_text: Option<String>,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    pub kind: lsp_types::CompletionItemKind,
    /// When true `new_text` is a snippet template, otherwise plain text.
    pub snippet: bool,
    /// 0-based (line, character) range spanning the existing prefix.
    pub edit_start: (usize, usize),
    pub edit_end: (usize, usize),
    pub new_text: String,
}

/// A resolved definition site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 0-based (line, character).
    pub start: (usize, usize),
    pub end: (usize, usize),
}

#[derive(Debug, Default)]
pub struct Workspace {
    cache: FileCache,
    settings: Settings,
    roots: HashMap<(PathBuf, Format), Manuscript>,
}

impl Workspace {
    pub fn new(settings: Settings) -> Self {
        Self {
            cache: FileCache::new(),
            settings,
            roots: HashMap::new(),
        }
    }

    pub fn cache_mut(&mut self) -> &mut FileCache {
        &mut self.cache
    }

    pub fn did_open(&mut self, path: PathBuf, text: String, format: &str, version: i64) {
        let format = Format::from_id(format);
        self.cache.put(path.clone(), text);
        let props = self.cache.properties_mut(&path);
        props.format = Some(format.id().to_string());
        props.version = Some(version);
        // A format change invalidates any manuscript memoized under the
        // old format.
        self.roots
            .retain(|(root, fmt), _| root != &path || *fmt == format);
    }

    pub fn did_change(
        &mut self,
        path: &Path,
        changes: Vec<Change>,
        version: i64,
    ) -> Result<(), CacheError> {
        for change in changes {
            match change {
                Change::Full { text } => self.cache.put(path.to_path_buf(), text),
                Change::Incremental {
                    start,
                    end,
                    range_length,
                    text,
                } => self.cache.edit(path, start, end, range_length, &text)?,
            }
        }
        self.cache.properties_mut(path).version = Some(version);
        Ok(())
    }

    /// Forget the file and drop any manuscript rooted at it.
    pub fn did_close(&mut self, path: &Path) {
        self.cache.forget(path);
        self.roots.retain(|(root, _), _| root != path);
    }

    /// Configure (or clear) the root file that queries on `path` run
    /// against.
    pub fn set_root(&mut self, path: &Path, root: Option<PathBuf>) {
        self.cache.properties_mut(path).root = root;
    }

    pub fn hover(&mut self, path: &Path, line: usize, character: usize) -> Option<Hover> {
        let offset = self.cache.position(path, line, character).ok()?;
        let key = self.ensure_root(path)?;
        let node = self.roots.get(&key)?.find(path)?;
        let help = get_help(node, offset)?;

        let mut parts = Vec::new();
        parts.push(match &help.detail {
            Some(detail) => format!("`{}` ({})", help.text, detail),
            None => format!("`{}`", help.text),
        });
        if let Some(signature) = &help.signature {
            parts.push(format!("```latex\n{}\n```", signature.label));
        }
        if let Some(doc) = &help.doc {
            parts.push(doc.clone());
        }
        Some(Hover {
            contents: parts.join("\n\n"),
        })
    }

    pub fn signature_help(
        &mut self,
        path: &Path,
        line: usize,
        character: usize,
    ) -> Option<SignatureHelp> {
        let offset = self.cache.position(path, line, character).ok()?;
        let key = self.ensure_root(path)?;
        let node = self.roots.get(&key)?.find(path)?;
        let help = get_help(node, offset)?;
        let signature = help.signature?;
        Some(SignatureHelp {
            label: signature.label,
            documentation: help.doc,
            parameters: signature.parameters,
            active_parameter: help.arg.map(|arg| arg - 1),
        })
    }

    pub fn completion(
        &mut self,
        path: &Path,
        line: usize,
        character: usize,
    ) -> Option<Vec<CompletionItem>> {
        let offset = self.cache.position(path, line, character).ok()?;
        let key = self.ensure_root(path)?;
        let root = self.roots.get(&key)?;
        let node = root.find(path)?;
        let reply = complete(root, node, offset, &self.settings.search_paths)?;

        let edit_start = self.cache.line_col(path, reply.span.pos).ok()?;
        let edit_end = self.cache.line_col(path, reply.span.end()).ok()?;
        Some(
            reply
                .candidates
                .into_iter()
                .map(|candidate| {
                    let snippet = candidate.snippet.is_some();
                    let new_text = candidate.snippet.unwrap_or_else(|| candidate.text.clone());
                    CompletionItem {
                        label: candidate.text,
                        filter_text: candidate.filter_text,
                        detail: candidate.summary,
                        documentation: candidate.detail,
                        kind: candidate.kind,
                        snippet,
                        edit_start,
                        edit_end,
                        new_text,
                    }
                })
                .collect(),
        )
    }

    /// Byte offset to 0-based (line, character), for callers converting
    /// core spans to editor positions.
    pub fn line_col(&mut self, path: &Path, offset: usize) -> Option<(usize, usize)> {
        self.cache.line_col(path, offset).ok()
    }

    /// The heading outline of `path` itself (not its children).
    pub fn outline(&mut self, path: &Path) -> Option<Vec<OutlineNode>> {
        let key = self.ensure_root(path)?;
        let node = self.roots.get(&key)?.find(path)?;
        Some(node.outline.clone())
    }

    /// Resolve the reference or citation under the caret to where it is
    /// defined, anywhere in the manuscript graph.
    pub fn definition(&mut self, path: &Path, line: usize, character: usize) -> Option<Location> {
        let offset = self.cache.position(path, line, character).ok()?;
        let key = self.ensure_root(path)?;
        let root = self.roots.get(&key)?;
        let node = root.find(path)?;

        let innermost = local_scan(node, offset);
        for frame in innermost.chain() {
            let FrameData::Argument { text, .. } = &frame.data else {
                continue;
            };
            let Some(FrameData::Command {
                desc: Some(cmd), ..
            }) = frame.parent.as_deref().map(|parent| &parent.data)
            else {
                continue;
            };
            let entries = match cmd.action {
                Some(Action::Ref) => root.all_labels(),
                Some(Action::Cite) => root.all_bibitems(),
                _ => continue,
            };
            let target = text.trim();
            let (owner, entry) = entries
                .into_iter()
                .find(|(_, entry)| entry.name == target)?;
            let file = owner.filename.clone();
            let span = entry.span;
            let start = self.cache.line_col(&file, span.pos).ok()?;
            let end = self.cache.line_col(&file, span.end()).ok()?;
            return Some(Location {
                path: file,
                start,
                end,
            });
        }
        None
    }

    /// The memoized, refreshed root manuscript servicing `path`. Falls
    /// back to the file as its own root when the configured root's graph
    /// does not reach it.
    fn ensure_root(&mut self, path: &Path) -> Option<(PathBuf, Format)> {
        let root_path = self
            .cache
            .rootname(path)
            .unwrap_or_else(|| path.to_path_buf());
        let format = self.format_of(&root_path, path);
        let key = self.materialize((root_path, format))?;
        if self.roots[&key].find(path).is_some() {
            return Some(key);
        }
        if key.0 == path {
            return None;
        }
        self.materialize((path.to_path_buf(), format))
    }

    fn materialize(&mut self, key: (PathBuf, Format)) -> Option<(PathBuf, Format)> {
        match self.roots.get_mut(&key) {
            Some(manuscript) => {
                manuscript.refresh(&mut self.cache);
            }
            None => {
                let manuscript = Manuscript::new(&mut self.cache, key.0.clone(), key.1)?;
                self.roots.insert(key.clone(), manuscript);
            }
        }
        Some(key)
    }

    fn format_of(&self, root: &Path, file: &Path) -> Format {
        let announced = self
            .cache
            .properties(root)
            .and_then(|props| props.format.clone())
            .or_else(|| {
                self.cache
                    .properties(file)
                    .and_then(|props| props.format.clone())
            });
        announced
            .as_deref()
            .map(Format::from_id)
            .unwrap_or(self.settings.default_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(ws: &mut Workspace, path: &str, text: &str) -> PathBuf {
        let path = PathBuf::from(path);
        ws.did_open(path.clone(), text.to_string(), "latex", 1);
        path
    }

    #[test]
    fn hover_resolves_positions_at_the_editor_boundary() {
        let mut ws = Workspace::default();
        let path = open(&mut ws, "/t/a.tex", "text\n\\alpha more");
        // line 1, character 2 sits inside the \alpha token
        let hover = ws.hover(&path, 1, 2).expect("hover present");
        assert!(hover.contents.contains("α"));
    }

    #[test]
    fn queries_on_unknown_files_are_absent() {
        let mut ws = Workspace::default();
        assert!(ws.hover(Path::new("/no/file.tex"), 0, 0).is_none());
        assert!(ws.completion(Path::new("/no/file.tex"), 0, 0).is_none());
    }

    #[test]
    fn did_close_drops_the_memoized_root() {
        let mut ws = Workspace::default();
        let path = open(&mut ws, "/t/a.tex", "\\alpha");
        assert!(ws.hover(&path, 0, 2).is_some());
        ws.did_close(&path);
        assert!(ws.roots.is_empty());
        assert!(ws.hover(&path, 0, 2).is_none());
    }

    #[test]
    fn reopening_with_a_new_format_rebuilds() {
        let mut ws = Workspace::default();
        let path = open(&mut ws, "/t/a.tex", "\\alpha");
        ws.hover(&path, 0, 2);
        assert_eq!(ws.roots.len(), 1);
        ws.did_open(path.clone(), "\\alpha".to_string(), "plain", 2);
        assert!(ws.roots.is_empty());
    }

    #[test]
    fn configured_root_serves_child_queries() {
        let mut ws = Workspace::default();
        let child = open(&mut ws, "/t/child.tex", "\\ref{y}");
        let root = open(&mut ws, "/t/root.tex", "\\input{child}\n\\label{y}\n");
        ws.set_root(&child, Some(root));
        // completion inside \ref{...} in the child sees the root's label
        let items = ws.completion(&child, 0, 5).expect("items");
        assert!(items.iter().any(|item| item.label == "y"));
    }

    #[test]
    fn rejected_incremental_edit_leaves_text_alone() {
        let mut ws = Workspace::default();
        let path = open(&mut ws, "/t/a.tex", "\\section{Intro}");
        let err = ws
            .did_change(
                &path,
                vec![Change::Incremental {
                    start: (0, 9),
                    end: (0, 14),
                    range_length: Some(4),
                    text: "Overview".to_string(),
                }],
                2,
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::RangeMismatch { .. }));
    }
}
