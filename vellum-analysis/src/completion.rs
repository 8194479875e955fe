//! Context-aware completion.
//!
//! The innermost frame of the context stack decides the candidate
//! source: command names in scope at a command-name position, schema
//! keys inside a key=value list, enumerated values inside a value,
//! and domain candidates (labels, citation keys, filenames) inside
//! the argument slots of reference- and input-class commands.
//!
//! Candidates map to LSP `CompletionItem` but stay protocol-agnostic;
//! the server layer converts them to the wire format. Uses
//! [`lsp_types::CompletionItemKind`] directly for classification, and a
//! replacement span so the client swaps the existing prefix atomically.

use crate::context::{local_scan, Frame, FrameData};
use crate::manuscript::Manuscript;
use lsp_types::CompletionItemKind;
use std::collections::BTreeMap;
use std::path::PathBuf;
use vellum_data::{Action, ArgSpec, ArgSpecKind, KeySpec};
use vellum_parser::Span;
use walkdir::WalkDir;

/// A completion candidate with display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Inserted text (when no snippet is used) and menu label.
    pub text: String,
    /// Filter text when it differs from `text`.
    pub filter_text: Option<String>,
    /// Short classification shown alongside the label.
    pub summary: Option<String>,
    /// Documentation line.
    pub detail: Option<String>,
    /// Templated insertion form for snippet-capable clients.
    pub snippet: Option<String>,
    pub kind: CompletionItemKind,
}

impl Candidate {
    fn new(text: impl Into<String>, kind: CompletionItemKind) -> Self {
        Self {
            text: text.into(),
            filter_text: None,
            summary: None,
            detail: None,
            snippet: None,
            kind,
        }
    }

    fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet;
        self
    }
}

/// A completion reply: the prefix found left of the caret, the span it
/// occupies (empty when the caret follows a delimiter), and the
/// candidates that extend it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub prefix: String,
    pub span: Span,
    pub candidates: Vec<Candidate>,
}

/// Completion at `pos` inside `ms`, with `root` supplying the
/// cross-file label and bibliography indices. `extra_dirs` extends the
/// filename search path beyond the manuscript's own directory.
pub fn complete(
    root: &Manuscript,
    ms: &Manuscript,
    pos: usize,
    extra_dirs: &[PathBuf],
) -> Option<Completion> {
    let src: &str = &ms.src;
    let innermost = local_scan(ms, pos);
    match &innermost.data {
        FrameData::Command { .. } => command_completion(ms, src, &innermost, pos),
        FrameData::Environment { .. } => environment_completion(ms, src, &innermost, pos),
        FrameData::Key { .. } => key_completion(src, &innermost, pos),
        FrameData::Value { key, .. } => value_completion(src, &innermost, key.as_ref(), pos),
        FrameData::Argument { index, spec, .. } => {
            argument_completion(root, ms, src, &innermost, *index, spec.as_ref(), pos, extra_dirs)
        }
        FrameData::Root => None,
    }
}

fn command_completion(
    ms: &Manuscript,
    src: &str,
    frame: &Frame,
    pos: usize,
) -> Option<Completion> {
    // The frame span covers the control sequence; the name starts after
    // the backslash. A caret elsewhere in the construct (between
    // arguments) has nothing to offer.
    let name_start = frame.span.pos + 1;
    if pos < name_start {
        return Some(Completion {
            prefix: String::new(),
            span: Span::empty(pos),
            candidates: ranked(
                ms.commands()
                    .flatten()
                    .iter()
                    .map(|(name, desc)| command_candidate(name.as_str(), desc))
                    .collect(),
                "",
            ),
        });
    }
    if pos > frame.span.end() {
        return None;
    }
    let prefix = &src[name_start..pos];
    // A caret between a command's arguments lands here with the whole
    // construct as its frame; there is no name prefix to extend.
    if !prefix.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '@') {
        return None;
    }
    let candidates = ms
        .commands()
        .flatten()
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, desc)| command_candidate(name.as_str(), desc))
        .collect();
    Some(Completion {
        prefix: prefix.to_string(),
        span: Span::between(name_start, pos),
        candidates: ranked(candidates, prefix),
    })
}

fn command_candidate(name: &str, desc: &vellum_data::Command) -> Candidate {
    Candidate::new(name, CompletionItemKind::FUNCTION)
        .with_summary(desc.detail.clone().unwrap_or_else(|| "command".to_string()))
        .with_detail(desc.doc.clone())
        .with_snippet(command_snippet(name, &desc.args))
}

/// Templated insertion: mandatory arguments become tab stops carrying
/// their display names. Commands without mandatory arguments insert
/// plainly.
fn command_snippet(name: &str, args: &[ArgSpec]) -> Option<String> {
    let mut snippet = name.to_string();
    let mut stop = 0;
    for (index, arg) in args.iter().enumerate() {
        if arg.kind != ArgSpecKind::Mandatory {
            continue;
        }
        stop += 1;
        snippet.push_str(&format!("{{${{{}:{}}}}}", stop, arg.display_name(index)));
    }
    (stop > 0).then_some(snippet)
}

fn environment_completion(
    ms: &Manuscript,
    src: &str,
    frame: &Frame,
    pos: usize,
) -> Option<Completion> {
    let start = frame.span.pos;
    let prefix = &src[start..pos.max(start)];
    let candidates = ms
        .environments()
        .flatten()
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, desc)| {
            Candidate::new(name.as_str(), CompletionItemKind::MODULE)
                .with_summary("environment")
                .with_detail(desc.doc.clone())
        })
        .collect();
    Some(Completion {
        prefix: prefix.to_string(),
        span: Span::between(start, pos),
        candidates: ranked(candidates, prefix),
    })
}

fn key_completion(src: &str, frame: &Frame, pos: usize) -> Option<Completion> {
    let keys = schema_keys(frame)?;
    let start = frame.span.pos;
    let prefix = src[start..pos.max(start)].trim_start();
    let span_start = pos - prefix.len();
    let candidates = keys
        .iter()
        .filter(|key| key.name.starts_with(prefix))
        .map(key_candidate)
        .collect();
    Some(Completion {
        prefix: prefix.to_string(),
        span: Span::between(span_start, pos),
        candidates: ranked(candidates, prefix),
    })
}

fn key_candidate(key: &KeySpec) -> Candidate {
    Candidate::new(key.name.as_str(), CompletionItemKind::PROPERTY)
        .with_summary("key")
        .with_detail(key.doc.clone())
}

fn value_completion(
    src: &str,
    frame: &Frame,
    key: Option<&KeySpec>,
    pos: usize,
) -> Option<Completion> {
    let key = key?;
    if key.values.is_empty() {
        return None;
    }
    let start = frame.span.pos;
    let prefix = &src[start..pos.max(start)];
    let candidates = key
        .values
        .iter()
        .filter(|value| value.name.starts_with(prefix))
        .map(|value| {
            Candidate::new(value.name.as_str(), CompletionItemKind::ENUM_MEMBER)
                .with_summary("value")
                .with_detail(value.doc.clone())
        })
        .collect();
    Some(Completion {
        prefix: prefix.to_string(),
        span: Span::between(start, pos),
        candidates: ranked(candidates, prefix),
    })
}

fn argument_completion(
    root: &Manuscript,
    ms: &Manuscript,
    src: &str,
    frame: &Frame,
    index: usize,
    spec: Option<&ArgSpec>,
    pos: usize,
    extra_dirs: &[PathBuf],
) -> Option<Completion> {
    // An empty stretch of a key=value argument completes its keys.
    if spec.map(ArgSpec::is_key_value).unwrap_or(false) {
        let keys = spec.map(|s| s.keys.as_slice()).unwrap_or(&[]);
        let start = item_start(src, frame.span.pos + 1, pos);
        let prefix = src[start..pos].trim_start();
        let span_start = pos - prefix.len();
        let candidates = keys
            .iter()
            .filter(|key| key.name.starts_with(prefix))
            .map(key_candidate)
            .collect();
        return Some(Completion {
            prefix: prefix.to_string(),
            span: Span::between(span_start, pos),
            candidates: ranked(candidates, prefix),
        });
    }

    let owner = owner_command(frame)?;
    if owner.first_mandatory() != Some(index) {
        return None;
    }
    let (start, prefix) = reference_prefix(src, frame, pos);
    let candidates = match owner.action.as_ref()? {
        Action::Ref => named_candidates(
            root.all_labels(),
            prefix,
            CompletionItemKind::REFERENCE,
            "label",
        ),
        Action::Cite => named_candidates(
            root.all_bibitems(),
            prefix,
            CompletionItemKind::REFERENCE,
            "bibliography entry",
        ),
        Action::Input => {
            let template = owner.filename.as_deref().unwrap_or("%s");
            let suffix = template.strip_prefix("%s").unwrap_or("");
            file_candidates(ms, extra_dirs, suffix, prefix)
        }
        _ => return None,
    };
    Some(Completion {
        prefix: prefix.to_string(),
        span: Span::between(start, pos),
        candidates: ranked(candidates, prefix),
    })
}

/// The command frame owning an argument frame.
fn owner_command(frame: &Frame) -> Option<&vellum_data::Command> {
    match &frame.parent.as_deref()?.data {
        FrameData::Command { desc, .. } => desc.as_deref(),
        _ => None,
    }
}

/// Word start for label-like tokens: stop at delimiters and whitespace.
fn reference_prefix<'a>(src: &'a str, frame: &Frame, pos: usize) -> (usize, &'a str) {
    let inner_start = (frame.span.pos + 1).min(pos);
    let region = &src[inner_start..pos];
    let start = region
        .char_indices()
        .rev()
        .find(|(_, ch)| {
            ch.is_whitespace() || matches!(*ch, '{' | '}' | '[' | ']' | ',' | '\\' | '%')
        })
        .map(|(found, ch)| inner_start + found + ch.len_utf8())
        .unwrap_or(inner_start);
    (start, &src[start..pos])
}

/// Start of the current key=value item: after the last depth-0 comma.
fn item_start(src: &str, from: usize, pos: usize) -> usize {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut start = from.min(pos);
    for i in from.min(pos)..pos {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => start = i + 1,
            _ => {}
        }
    }
    start
}

fn named_candidates(
    entries: Vec<(&Manuscript, &crate::manuscript::IndexEntry)>,
    prefix: &str,
    kind: CompletionItemKind,
    summary: &str,
) -> Vec<Candidate> {
    let mut unique = BTreeMap::new();
    for (node, entry) in entries {
        unique.entry(entry.name.clone()).or_insert_with(|| {
            let file = node
                .filename
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            Candidate::new(entry.name.as_str(), kind)
                .with_summary(summary)
                .with_detail(file)
        });
    }
    unique
        .into_values()
        .filter(|candidate| candidate.text.starts_with(prefix))
        .collect()
}

/// Files on the search path whose names match the input template's
/// extension, offered without that extension.
fn file_candidates(
    ms: &Manuscript,
    extra_dirs: &[PathBuf],
    suffix: &str,
    prefix: &str,
) -> Vec<Candidate> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(parent) = ms.filename.parent() {
        dirs.push(parent.to_path_buf());
    }
    dirs.extend(extra_dirs.iter().cloned());

    let mut unique = BTreeMap::new();
    for dir in &dirs {
        for entry in WalkDir::new(dir)
            .max_depth(4)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let name = relative.to_string_lossy();
            if !suffix.is_empty() && !name.ends_with(suffix) {
                continue;
            }
            let text = name.strip_suffix(suffix).unwrap_or(&name).to_string();
            if text.is_empty() || !text.starts_with(prefix) {
                continue;
            }
            unique.entry(text.clone()).or_insert_with(|| {
                Candidate::new(text, CompletionItemKind::FILE).with_summary("file")
            });
        }
    }
    unique.into_values().collect()
}

/// Collect keys visible from a key frame's enclosing argument schema.
fn schema_keys(frame: &Frame) -> Option<&[KeySpec]> {
    for outer in frame.chain() {
        if let FrameData::Argument { spec: Some(spec), .. } = &outer.data {
            if spec.is_key_value() {
                return Some(&spec.keys);
            }
        }
    }
    None
}

/// Stable ordering: alphabetical, exact match first.
fn ranked(mut candidates: Vec<Candidate>, prefix: &str) -> Vec<Candidate> {
    candidates.sort_by(|a, b| a.text.cmp(&b.text));
    if !prefix.is_empty() {
        if let Some(found) = candidates.iter().position(|c| c.text == prefix) {
            let exact = candidates.remove(found);
            candidates.insert(0, exact);
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::manuscript::Format;

    fn manuscript(text: &str) -> Manuscript {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/complete.tex");
        cache.put(path.clone(), text.to_string());
        Manuscript::new(&mut cache, path, Format::Latex).expect("builds")
    }

    fn at(fixture: &str) -> (Manuscript, usize) {
        let pos = fixture.find('|').expect("caret marker");
        (manuscript(&fixture.replace('|', "")), pos)
    }

    fn texts(completion: &Completion) -> Vec<&str> {
        completion
            .candidates
            .iter()
            .map(|c| c.text.as_str())
            .collect()
    }

    #[test]
    fn command_names_complete_by_prefix() {
        let (ms, pos) = at(r"\sec|");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(completion.prefix, "sec");
        assert_eq!(texts(&completion), vec!["section"]);
        assert_eq!(completion.span, Span::new(1, 3));
    }

    #[test]
    fn exact_match_ranks_first() {
        let (ms, pos) = at(r"\section|");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(completion.candidates[0].text, "section");
    }

    #[test]
    fn command_snippet_templates_mandatory_args() {
        let (ms, pos) = at(r"\fra|");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        let frac = completion
            .candidates
            .iter()
            .find(|c| c.text == "frac")
            .expect("frac offered");
        assert_eq!(
            frac.snippet.as_deref(),
            Some("frac{${1:numerator}}{${2:denominator}}")
        );
    }

    #[test]
    fn labels_complete_inside_ref() {
        let (ms, pos) = at(r"\label{x}\label{sec:intro}\ref{|}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(completion.prefix, "");
        assert!(completion.span.is_empty());
        assert_eq!(texts(&completion), vec!["sec:intro", "x"]);
    }

    #[test]
    fn label_prefix_filters() {
        let (ms, pos) = at(r"\label{x}\label{sec:intro}\ref{sec|}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(completion.prefix, "sec");
        assert_eq!(texts(&completion), vec!["sec:intro"]);
    }

    #[test]
    fn bibitems_complete_inside_cite() {
        let (ms, pos) = at(r"\bibitem{knuth84}\cite{|}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(texts(&completion), vec!["knuth84"]);
        assert_eq!(
            completion.candidates[0].kind,
            CompletionItemKind::REFERENCE
        );
    }

    #[test]
    fn environment_names_complete_after_begin() {
        let (ms, pos) = at(r"\begin{ite|}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(texts(&completion), vec!["itemize"]);
    }

    #[test]
    fn keys_complete_inside_key_value_argument() {
        let (ms, pos) = at(r"\includegraphics[w|]{f}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(texts(&completion), vec!["width"]);
        assert_eq!(completion.candidates[0].kind, CompletionItemKind::PROPERTY);
    }

    #[test]
    fn second_key_after_comma_completes() {
        let (ms, pos) = at(r"\includegraphics[width=3cm, he|]{f}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(completion.prefix, "he");
        assert_eq!(texts(&completion), vec!["height"]);
    }

    #[test]
    fn enumerated_values_complete() {
        let (ms, pos) = at(r"\includegraphics[clip=|]{f}");
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert_eq!(texts(&completion), vec!["false", "true"]);
        assert_eq!(
            completion.candidates[0].kind,
            CompletionItemKind::ENUM_MEMBER
        );
    }

    #[test]
    fn plain_text_offers_nothing() {
        let (ms, pos) = at("plain te|xt");
        assert!(complete(&ms, &ms, pos, &[]).is_none());
    }

    #[test]
    fn file_candidates_respect_template_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chapter.tex"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let root_path = dir.path().join("main.tex");
        std::fs::write(&root_path, "\\input{}").unwrap();

        let mut cache = FileCache::new();
        let ms = Manuscript::new(&mut cache, root_path, Format::Latex).unwrap();
        // caret just inside \input{...}
        let pos = ms.src.find('{').unwrap() + 1;
        let completion = complete(&ms, &ms, pos, &[]).expect("candidates");
        assert!(texts(&completion).contains(&"chapter"));
        assert!(!texts(&completion).contains(&"notes.txt"));
        assert!(!texts(&completion).contains(&"notes"));
    }
}
