//! The local scan: from a caret position to a context stack.
//!
//! Scanning starts at the enclosing paragraph and walks forward until a
//! construct containing the caret is found. The result is a chain of
//! frames, innermost first: a caret inside the value of a key inside an
//! optional argument of `\includegraphics` yields
//! value → key → argument → command → root, each frame's range strictly
//! contained in its parent's.

use crate::manuscript::Manuscript;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use vellum_data::{Action, ArgSpec, Command, Environment, KeySpec, ValueSpec};
use vellum_parser::{paragraph_start, parse_args, parse_keys, ArgList, Span, Thing, ThingKind};

/// What a frame describes.
#[derive(Debug, Clone)]
pub enum FrameData {
    /// Bottom sentinel; spans the whole source.
    Root,
    /// Caret inside a control-sequence token or its invocation.
    Command {
        name: String,
        desc: Option<Arc<Command>>,
    },
    /// Caret inside an environment name or an environment's arguments.
    Environment {
        name: String,
        desc: Option<Arc<Environment>>,
    },
    /// Caret inside argument slot `index` (0-based) of the parent frame.
    Argument {
        index: usize,
        spec: Option<ArgSpec>,
        text: String,
    },
    /// Caret inside a key=value pair; the span covers the whole pair.
    Key {
        name: String,
        spec: Option<KeySpec>,
    },
    /// Caret inside the value part of a key=value pair.
    Value {
        text: String,
        key: Option<KeySpec>,
        spec: Option<ValueSpec>,
    },
}

/// One layer of the context stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub span: Span,
    pub data: FrameData,
    pub parent: Option<Box<Frame>>,
}

impl Frame {
    fn root(len: usize) -> Self {
        Self {
            span: Span::new(0, len),
            data: FrameData::Root,
            parent: None,
        }
    }

    fn push(parent: Frame, span: Span, data: FrameData) -> Self {
        Self {
            span,
            data,
            parent: Some(Box::new(parent)),
        }
    }

    /// Iterate innermost to outermost.
    pub fn chain(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(self), |frame| frame.parent.as_deref())
    }
}

/// Either the scan found the caret's frame, or it should resume further
/// along.
enum Visit {
    Done(Frame),
    Resume(usize),
}

/// Build the context stack at `pos`. Always returns at least the root
/// sentinel.
pub fn local_scan(ms: &Manuscript, pos: usize) -> Frame {
    let src: &str = &ms.src;
    let pos = pos.min(src.len());
    let base = Frame::root(src.len());
    let start = paragraph_start(src, pos);
    scan_region(ms, src, start, pos, &base).unwrap_or(base)
}

/// Walk tokens from `cursor`, looking for a construct that contains
/// `pos`. Returns `None` when the caret sits in plain text.
fn scan_region(
    ms: &Manuscript,
    src: &str,
    mut cursor: usize,
    pos: usize,
    base: &Frame,
) -> Option<Frame> {
    while let Some(thing) = vellum_parser::next_thing(src, cursor) {
        if thing.span.pos > pos {
            break;
        }
        match thing.kind {
            ThingKind::ControlSeq(name) => {
                match visit_control_seq(ms, src, &thing, name, pos, base) {
                    Visit::Done(frame) => return Some(frame),
                    Visit::Resume(next) => cursor = next.max(thing.resume),
                }
            }
            _ => cursor = thing.resume,
        }
    }
    None
}

fn visit_control_seq(
    ms: &Manuscript,
    src: &str,
    thing: &Thing,
    name: &str,
    pos: usize,
    base: &Frame,
) -> Visit {
    let desc = ms.commands().get(name);

    // Caret inside the token itself: the innermost frame is the command.
    if thing.span.touches(pos) {
        return Visit::Done(Frame::push(
            base.clone(),
            thing.span,
            FrameData::Command {
                name: name.to_string(),
                desc,
            },
        ));
    }

    let Some(cmd) = desc else {
        return Visit::Resume(thing.resume);
    };

    match &cmd.action {
        Some(Action::Begin) => begin_end(ms, src, thing, &cmd, pos, base, true),
        Some(Action::End) => begin_end(ms, src, thing, &cmd, pos, base, false),
        Some(Action::Extension(ext)) => match LOCAL_EXTENSIONS.get(ext.as_str()) {
            Some(handler) => handler(ms, src, thing, &cmd, pos, base),
            None => command_invocation(ms, src, thing, &cmd, pos, base),
        },
        _ => command_invocation(ms, src, thing, &cmd, pos, base),
    }
}

/// The generic case: parse the command's arguments and descend into the
/// slot holding the caret.
fn command_invocation(
    ms: &Manuscript,
    src: &str,
    thing: &Thing,
    cmd: &Arc<Command>,
    pos: usize,
    base: &Frame,
) -> Visit {
    if cmd.args.is_empty() {
        return Visit::Resume(thing.resume);
    }
    let args = parse_args(src, thing.resume, &cmd.shapes());
    let end = args.span.end().max(thing.resume);
    if !args.span.touches(pos) {
        return Visit::Resume(end);
    }
    let cmd_frame = Frame::push(
        base.clone(),
        Span::between(thing.span.pos, end),
        FrameData::Command {
            name: cmd.name.clone(),
            desc: Some(cmd.clone()),
        },
    );
    match args.slot_at(pos) {
        Some(index) => Visit::Done(descend_argument(ms, src, &args, &cmd.args, index, pos, cmd_frame)),
        None => Visit::Done(cmd_frame),
    }
}

/// Build the argument frame for slot `index` and keep drilling: a
/// key=value argument gets key/value frames, anything else is scanned
/// for nested invocations.
fn descend_argument(
    ms: &Manuscript,
    src: &str,
    args: &ArgList,
    specs: &[ArgSpec],
    index: usize,
    pos: usize,
    owner: Frame,
) -> Frame {
    let arg = args.args[index];
    let spec = specs.get(index).cloned();
    let arg_frame = Frame::push(
        owner,
        arg.outer,
        FrameData::Argument {
            index,
            spec: spec.clone(),
            text: arg.inner.slice(src).to_string(),
        },
    );
    let key_value = spec.as_ref().map(ArgSpec::is_key_value).unwrap_or(false);
    if key_value {
        return drill_keys(src, arg.inner, pos, spec.as_ref(), arg_frame);
    }
    if arg.inner.touches(pos) {
        if let Some(deeper) = scan_region(ms, src, arg.inner.pos, pos, &arg_frame) {
            return deeper;
        }
    }
    arg_frame
}

/// Locate the key=value pair holding the caret and frame it.
fn drill_keys(src: &str, region: Span, pos: usize, spec: Option<&ArgSpec>, arg_frame: Frame) -> Frame {
    for pair in parse_keys(src, region) {
        let pair_span = Span::between(
            pair.key.pos,
            pair.value.map(|value| value.end()).unwrap_or(pair.key.end()),
        );
        if !pair_span.touches(pos) {
            continue;
        }
        let key_name = pair.key.slice(src).to_string();
        let key_spec = spec.and_then(|s| s.key(&key_name)).cloned();
        let key_frame = Frame::push(
            arg_frame,
            pair_span,
            FrameData::Key {
                name: key_name,
                spec: key_spec.clone(),
            },
        );
        if let Some(value) = pair.value {
            if value.touches(pos) && value.pos > pair.key.end() {
                let text = value.slice(src).to_string();
                let value_spec = key_spec
                    .as_ref()
                    .and_then(|key| key.values.iter().find(|v| v.name == text))
                    .cloned();
                return Frame::push(
                    key_frame,
                    value,
                    FrameData::Value {
                        text,
                        key: key_spec,
                        spec: value_spec,
                    },
                );
            }
        }
        return key_frame;
    }
    arg_frame
}

/// `\begin` and `\end`: the environment name has its own completion and
/// hover semantics, and for `\begin` the environment's signature follows
/// the name.
fn begin_end(
    ms: &Manuscript,
    src: &str,
    thing: &Thing,
    cmd: &Arc<Command>,
    pos: usize,
    base: &Frame,
    is_begin: bool,
) -> Visit {
    let args = parse_args(src, thing.resume, &cmd.shapes());
    let mut end = args.span.end().max(thing.resume);
    let Some(slot) = cmd.first_mandatory() else {
        return Visit::Resume(end);
    };
    let arg = args.args[slot];
    if !arg.present {
        return Visit::Resume(end);
    }
    let env_name = arg.inner.slice(src).trim().to_string();
    let env_desc = ms.environments().get(&env_name);

    if arg.outer.touches(pos) {
        let cmd_frame = Frame::push(
            base.clone(),
            Span::between(thing.span.pos, end),
            FrameData::Command {
                name: cmd.name.clone(),
                desc: Some(cmd.clone()),
            },
        );
        let arg_frame = Frame::push(
            cmd_frame,
            arg.outer,
            FrameData::Argument {
                index: slot,
                spec: cmd.args.get(slot).cloned(),
                text: env_name.clone(),
            },
        );
        if arg.inner.touches(pos) {
            return Visit::Done(Frame::push(
                arg_frame,
                arg.inner,
                FrameData::Environment {
                    name: env_name,
                    desc: env_desc,
                },
            ));
        }
        return Visit::Done(arg_frame);
    }

    if is_begin {
        if let Some(env) = env_desc {
            if !env.args.is_empty() {
                let env_args = parse_args(src, end, &env.shapes());
                let env_end = env_args.span.end().max(end);
                if env_args.span.touches(pos) {
                    let env_frame = Frame::push(
                        base.clone(),
                        Span::between(thing.span.pos, env_end),
                        FrameData::Environment {
                            name: env_name,
                            desc: Some(env.clone()),
                        },
                    );
                    return match env_args.slot_at(pos) {
                        Some(index) => Visit::Done(descend_argument(
                            ms, src, &env_args, &env.args, index, pos, env_frame,
                        )),
                        None => Visit::Done(env_frame),
                    };
                }
                end = env_end;
            }
        }
    }
    Visit::Resume(end)
}

// ---------------------------------------------------------------------
// Extension callbacks: one per dictionary-defined action name.

type ExtensionHandler =
    fn(&Manuscript, &str, &Thing, &Arc<Command>, usize, &Frame) -> Visit;

static LOCAL_EXTENSIONS: Lazy<HashMap<&'static str, ExtensionHandler>> = Lazy::new(|| {
    let mut handlers: HashMap<&'static str, ExtensionHandler> = HashMap::new();
    handlers.insert("tikzpath", tikz_path);
    handlers
});

/// TikZ path commands run until a `;`, with bracketed option groups
/// interleaved among coordinates that the declared signature does not
/// cover. Any bracket group along the path completes against the
/// command's option schema.
fn tikz_path(
    ms: &Manuscript,
    src: &str,
    thing: &Thing,
    cmd: &Arc<Command>,
    pos: usize,
    base: &Frame,
) -> Visit {
    // Declared arguments first; they behave like any other command.
    match command_invocation(ms, src, thing, cmd, pos, base) {
        Visit::Done(frame) => return Visit::Done(frame),
        Visit::Resume(after_args) => {
            let options = cmd.args.iter().position(ArgSpec::is_key_value);
            let bytes = src.as_bytes();
            let mut depth = 0usize;
            let mut i = after_args;
            while i < bytes.len() {
                match bytes[i] {
                    b';' if depth == 0 => return Visit::Resume(i + 1),
                    b'\\' => i += 1,
                    b'{' => depth += 1,
                    b'}' => {
                        if depth == 0 {
                            break; // path leaked out of its group
                        }
                        depth -= 1;
                    }
                    b'[' if depth == 0 => {
                        let group = bracket_group(src, i);
                        if group.touches(pos) {
                            let frame = path_options_frame(
                                src, thing, cmd, options, group, pos, base,
                            );
                            return Visit::Done(frame);
                        }
                        i = group.end();
                        continue;
                    }
                    b'\n' if bytes.get(i + 1) == Some(&b'\n') => break,
                    _ => {}
                }
                i += 1;
            }
            Visit::Resume(i.max(after_args))
        }
    }
}

/// Frame chain for a bracketed option group found along a TikZ path.
fn path_options_frame(
    src: &str,
    thing: &Thing,
    cmd: &Arc<Command>,
    options: Option<usize>,
    group: Span,
    pos: usize,
    base: &Frame,
) -> Frame {
    let cmd_frame = Frame::push(
        base.clone(),
        Span::between(thing.span.pos, group.end()),
        FrameData::Command {
            name: cmd.name.clone(),
            desc: Some(cmd.clone()),
        },
    );
    let spec = options.and_then(|index| cmd.args.get(index)).cloned();
    let inner = Span::between(group.pos + 1, group.end().saturating_sub(1).max(group.pos + 1));
    let arg_frame = Frame::push(
        cmd_frame,
        group,
        FrameData::Argument {
            index: options.unwrap_or(0),
            spec: spec.clone(),
            text: inner.slice(src).to_string(),
        },
    );
    drill_keys(src, inner, pos, spec.as_ref(), arg_frame)
}

/// The bracket group starting at `open`; unterminated groups close at
/// end of text.
fn bracket_group(src: &str, open: usize) -> Span {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\\' => i += 1,
            b']' if depth == 0 => return Span::between(open, i + 1),
            _ => {}
        }
        i += 1;
    }
    Span::between(open, src.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::manuscript::Format;
    use std::path::PathBuf;

    fn manuscript(text: &str) -> Manuscript {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/ctx.tex");
        cache.put(path.clone(), text.to_string());
        Manuscript::new(&mut cache, path, Format::Latex).expect("builds")
    }

    /// Caret position marked with `|` in the fixture.
    fn caret(text: &str) -> (String, usize) {
        let pos = text.find('|').expect("fixture has a caret");
        (text.replace('|', ""), pos)
    }

    fn frames_at(fixture: &str) -> (Manuscript, usize) {
        let (text, pos) = caret(fixture);
        (manuscript(&text), pos)
    }

    fn kinds(frame: &Frame) -> Vec<&'static str> {
        frame
            .chain()
            .map(|f| match f.data {
                FrameData::Root => "root",
                FrameData::Command { .. } => "command",
                FrameData::Environment { .. } => "environment",
                FrameData::Argument { .. } => "argument",
                FrameData::Key { .. } => "key",
                FrameData::Value { .. } => "value",
            })
            .collect()
    }

    #[test]
    fn caret_in_command_name() {
        let (ms, pos) = frames_at(r"text \sec|tion{Intro}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["command", "root"]);
        match &frame.data {
            FrameData::Command { name, desc } => {
                assert_eq!(name, "section");
                assert!(desc.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn caret_in_plain_text_yields_root() {
        let (ms, pos) = frames_at(r"plain te|xt \section{Intro}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["root"]);
    }

    #[test]
    fn caret_in_mandatory_argument() {
        let (ms, pos) = frames_at(r"\section{In|tro}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["argument", "command", "root"]);
        match &frame.data {
            FrameData::Argument { index, spec, .. } => {
                assert_eq!(*index, 2); // star, toc title, title
                assert_eq!(spec.as_ref().unwrap().name.as_deref(), Some("title"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn caret_in_ref_argument() {
        let (ms, pos) = frames_at(r"\ref{se|c:intro}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["argument", "command", "root"]);
    }

    #[test]
    fn nested_command_wins() {
        let (ms, pos) = frames_at(r"\textbf{see \ref{x|}}");
        let frame = local_scan(&ms, pos);
        assert_eq!(
            kinds(&frame),
            vec!["argument", "command", "argument", "command", "root"]
        );
        let names: Vec<_> = frame
            .chain()
            .filter_map(|f| match &f.data {
                FrameData::Command { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["ref", "textbf"]);
    }

    #[test]
    fn caret_in_key_of_key_value_argument() {
        let (ms, pos) = frames_at(r"\includegraphics[wid|th=3cm]{fig}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["key", "argument", "command", "root"]);
        match &frame.data {
            FrameData::Key { name, spec } => {
                assert_eq!(name, "width");
                assert!(spec.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn caret_in_value_of_key_value_argument() {
        let (ms, pos) = frames_at(r"\includegraphics[clip=tr|ue]{fig}");
        let frame = local_scan(&ms, pos);
        assert_eq!(
            kinds(&frame),
            vec!["value", "key", "argument", "command", "root"]
        );
        match &frame.data {
            FrameData::Value { text, spec, .. } => {
                assert_eq!(text, "true");
                assert!(spec.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn caret_between_pairs_stops_at_argument() {
        let (ms, pos) = frames_at(r"\includegraphics[width=3cm, |]{fig}");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["argument", "command", "root"]);
    }

    #[test]
    fn caret_in_environment_name() {
        let (ms, pos) = frames_at(r"\begin{item|ize}");
        let frame = local_scan(&ms, pos);
        assert_eq!(
            kinds(&frame),
            vec!["environment", "argument", "command", "root"]
        );
        match &frame.data {
            FrameData::Environment { name, desc } => {
                assert_eq!(name, "itemize");
                assert!(desc.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn caret_in_end_name_too() {
        let (ms, pos) = frames_at("\\begin{center}x\\end{cen|ter}");
        let frame = local_scan(&ms, pos);
        assert!(matches!(frame.data, FrameData::Environment { .. }));
    }

    #[test]
    fn caret_in_environment_signature_argument() {
        let (ms, pos) = frames_at(r"\begin{tabular}{lc|r}");
        let frame = local_scan(&ms, pos);
        assert_eq!(
            kinds(&frame),
            vec!["argument", "environment", "root"]
        );
        match &frame.data {
            FrameData::Argument { spec, .. } => {
                assert_eq!(spec.as_ref().unwrap().name.as_deref(), Some("columns"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn scan_starts_at_enclosing_paragraph() {
        let (ms, pos) = frames_at("\\section{One\n\nplain he|re");
        // The unterminated argument from the previous paragraph does not
        // leak into this one.
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["root"]);
    }

    #[test]
    fn frame_ranges_nest_strictly() {
        let fixture = r"pre \includegraphics[clip=tr|ue]{fig} post";
        let (ms, pos) = frames_at(fixture);
        let frame = local_scan(&ms, pos);
        for f in frame.chain() {
            assert!(f.span.pos <= pos && pos <= f.span.end());
        }
        let spans: Vec<_> = frame.chain().map(|f| f.span).collect();
        for pair in spans.windows(2) {
            let (inner, outer) = (pair[0], pair[1]);
            assert!(outer.pos <= inner.pos && inner.end() <= outer.end());
            assert!(outer.len > inner.len);
        }
    }

    #[test]
    fn tikz_path_options_complete_anywhere_on_the_path() {
        let (ms, pos) = frames_at(r"\draw[color=red] (0,0) -- [rounded cor|ners] (1,1);");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["key", "argument", "command", "root"]);
        match &frame.data {
            FrameData::Key { name, spec } => {
                assert_eq!(name, "rounded corners");
                assert!(spec.is_some());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn tikz_declared_options_still_work() {
        let (ms, pos) = frames_at(r"\draw[col|or=red] (0,0) -- (1,1);");
        let frame = local_scan(&ms, pos);
        assert_eq!(kinds(&frame), vec!["key", "argument", "command", "root"]);
    }

    #[test]
    fn unknown_command_still_frames_its_name() {
        let (ms, pos) = frames_at(r"\mymacr|o{x}");
        let frame = local_scan(&ms, pos);
        match &frame.data {
            FrameData::Command { name, desc } => {
                assert_eq!(name, "mymacro");
                assert!(desc.is_none());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
