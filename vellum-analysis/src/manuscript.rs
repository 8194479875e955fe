//! The manuscript graph: one node per source file, linked by
//! `\input`-like commands.
//!
//! A node carries the file's source snapshot, scoped command and
//! environment tables inherited from its parent, and the indices built by
//! the global scan: labels, bibliography items, the heading outline, and
//! the input references the child graph is derived from.
//!
//! `refresh` is the sole way a node's source moves forward: it compares
//! the snapshot against the cache and rescans on a real change,
//! rebuilding the children as it goes.

use crate::cache::FileCache;
use crate::scope::Scope;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vellum_data::{load_module, Action, Command, Environment, Module};
use vellum_parser::{next_thing, parse_args, strip_comments, trim, Span, Thing, ThingKind};

/// Include recursion cap; breaks cycles like `a -> b -> a`.
pub const MAX_INCLUDE_DEPTH: usize = 15;

/// Document format; selects the module dictionary a root manuscript is
/// seeded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Latex,
    Plain,
}

impl Format {
    pub fn module_name(self) -> &'static str {
        match self {
            Format::Latex => "latex",
            Format::Plain => "tex",
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Format::Latex => "latex",
            Format::Plain => "plain",
        }
    }

    /// Map an editor-announced language identifier; unknown ids fall back
    /// to LaTeX.
    pub fn from_id(id: &str) -> Self {
        match id {
            "plain" | "tex" => Format::Plain,
            _ => Format::Latex,
        }
    }
}

/// A named, positioned extract: a label or a bibliography item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Span of the name argument in the source.
    pub span: Span,
    pub name: String,
}

/// A heading as recorded in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// From the command's backslash to the end of its arguments.
    pub span: Span,
    pub level: u8,
    pub title: String,
}

/// A node of the nested outline. Within a subtree, each descendant's
/// level is strictly greater than its ancestor's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub span: Span,
    pub level: u8,
    pub title: String,
    pub children: Vec<OutlineNode>,
}

/// An `\input`-like reference and the path it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    /// Span of the filename argument.
    pub span: Span,
    /// The name as written.
    pub name: String,
    /// Resolved against the referencing file's directory and the
    /// command's filename template.
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Manuscript {
    pub filename: PathBuf,
    /// Source snapshot as of the last global scan.
    pub src: Arc<str>,
    pub format: Format,
    /// Root is 1.
    pub depth: usize,

    commands: Arc<Scope<Command>>,
    environments: Arc<Scope<Environment>>,
    modules: Arc<Scope<Module>>,

    pub labels: Vec<IndexEntry>,
    pub bibitems: Vec<IndexEntry>,
    /// Headings in source order.
    pub section_index: Vec<HeadingEntry>,
    /// Headings nested by level.
    pub outline: Vec<OutlineNode>,
    pub input_index: Vec<InputEntry>,

    pub children: BTreeMap<PathBuf, Manuscript>,
}

impl Manuscript {
    /// Build a root manuscript from the cache contents of `filename`.
    /// Returns `None` when the file is neither open nor on disk.
    pub fn new(cache: &mut FileCache, filename: PathBuf, format: Format) -> Option<Self> {
        let src = cache.get(&filename)?;
        let mut commands = Scope::root();
        let mut environments = Scope::root();
        let mut modules = Scope::root();
        add_module(
            &mut commands,
            &mut environments,
            &mut modules,
            format.module_name(),
        );
        let mut manuscript = Self {
            filename,
            src,
            format,
            depth: 1,
            commands: Arc::new(commands),
            environments: Arc::new(environments),
            modules: Arc::new(modules),
            labels: Vec::new(),
            bibitems: Vec::new(),
            section_index: Vec::new(),
            outline: Vec::new(),
            input_index: Vec::new(),
            children: BTreeMap::new(),
        };
        manuscript.global_scan(cache);
        Some(manuscript)
    }

    fn child(cache: &mut FileCache, filename: PathBuf, parent: &Manuscript) -> Option<Self> {
        let src = cache.get(&filename)?;
        let mut manuscript = Self {
            filename,
            src,
            format: parent.format,
            depth: parent.depth + 1,
            commands: Arc::new(Scope::child_of(&parent.commands)),
            environments: Arc::new(Scope::child_of(&parent.environments)),
            modules: Arc::new(Scope::child_of(&parent.modules)),
            labels: Vec::new(),
            bibitems: Vec::new(),
            section_index: Vec::new(),
            outline: Vec::new(),
            input_index: Vec::new(),
            children: BTreeMap::new(),
        };
        manuscript.global_scan(cache);
        Some(manuscript)
    }

    pub fn commands(&self) -> &Arc<Scope<Command>> {
        &self.commands
    }

    pub fn environments(&self) -> &Arc<Scope<Environment>> {
        &self.environments
    }

    pub fn modules(&self) -> &Arc<Scope<Module>> {
        &self.modules
    }

    /// Labels ordered by position; same contents as `labels`, named for
    /// lookup-oriented callers.
    pub fn label_index(&self) -> &[IndexEntry] {
        &self.labels
    }

    /// The node owning `filename`, searching this subtree.
    pub fn find(&self, filename: &Path) -> Option<&Manuscript> {
        if self.filename == filename {
            return Some(self);
        }
        self.children
            .values()
            .find_map(|child| child.find(filename))
    }

    /// Visit this node and every descendant.
    pub fn for_each<'a>(&'a self, visit: &mut impl FnMut(&'a Manuscript)) {
        visit(self);
        for child in self.children.values() {
            child.for_each(visit);
        }
    }

    /// Labels across the whole subtree, paired with their owning node.
    pub fn all_labels(&self) -> Vec<(&Manuscript, &IndexEntry)> {
        let mut out = Vec::new();
        self.for_each(&mut |node| {
            out.extend(node.labels.iter().map(|entry| (node, entry)));
        });
        out
    }

    /// Bibliography items across the whole subtree.
    pub fn all_bibitems(&self) -> Vec<(&Manuscript, &IndexEntry)> {
        let mut out = Vec::new();
        self.for_each(&mut |node| {
            out.extend(node.bibitems.iter().map(|entry| (node, entry)));
        });
        out
    }

    /// Reconcile this subtree with the cache. Rescans any node whose
    /// snapshot is out of date; returns whether anything was rescanned.
    /// Idempotent for a fixed cache state.
    pub fn refresh(&mut self, cache: &mut FileCache) -> bool {
        match cache.get(&self.filename) {
            Some(text) if Arc::ptr_eq(&text, &self.src) || text == self.src => {
                let mut any = false;
                for child in self.children.values_mut() {
                    any |= child.refresh(cache);
                }
                any
            }
            Some(text) => {
                tracing::debug!(file = %self.filename.display(), "source changed, rescanning");
                self.src = text;
                self.global_scan(cache);
                true
            }
            None => false,
        }
    }

    /// Rebuild every extracted index from `src`, then re-derive the
    /// children. Linear in the source size.
    fn global_scan(&mut self, cache: &mut FileCache) {
        self.labels.clear();
        self.bibitems.clear();
        self.section_index.clear();
        self.input_index.clear();
        self.children = BTreeMap::new();

        let src = self.src.clone();
        let mut env_stack: Vec<String> = Vec::new();
        let mut pos = 0;
        while let Some(thing) = next_thing(&src, pos) {
            let next = self.global_step(&src, &thing, &mut env_stack);
            // A callback never moves backward; guard against a stuck scan
            // on degenerate input anyway.
            pos = next.max(thing.resume);
        }

        self.outline = build_outline(&self.section_index);
        self.build_children(cache);
    }

    /// One step of the global scan: dispatch on the command's action, or
    /// fall through for anything the command table does not know.
    fn global_step(&mut self, src: &str, thing: &Thing, env_stack: &mut Vec<String>) -> usize {
        let ThingKind::ControlSeq(name) = thing.kind else {
            return thing.resume;
        };
        let Some(cmd) = self.commands.get(name) else {
            return thing.resume;
        };
        match cmd.action {
            Some(Action::Input) => self.index_input(src, thing, &cmd),
            Some(Action::Heading) => self.index_heading(src, thing, &cmd),
            Some(Action::Label) => self.index_name(src, thing, &cmd, Extract::Label),
            Some(Action::Bibitem) => self.index_name(src, thing, &cmd, Extract::Bibitem),
            Some(Action::Begin) => self.enter_environment(src, thing, &cmd, env_stack),
            Some(Action::End) => {
                let args = parse_args(src, thing.resume, &cmd.shapes());
                env_stack.pop();
                args.span.end().max(thing.resume)
            }
            // Reference-class arguments contain no extractable
            // definitions; jump past them.
            Some(Action::Ref) | Some(Action::Cite) => {
                parse_args(src, thing.resume, &cmd.shapes())
                    .span
                    .end()
                    .max(thing.resume)
            }
            _ => thing.resume,
        }
    }

    fn index_name(&mut self, src: &str, thing: &Thing, cmd: &Arc<Command>, what: Extract) -> usize {
        let args = parse_args(src, thing.resume, &cmd.shapes());
        if let Some(slot) = cmd.first_mandatory() {
            let arg = args.args[slot];
            if arg.present {
                let name = trim(&strip_comments(arg.inner.slice(src)));
                if !name.is_empty() {
                    let entry = IndexEntry {
                        span: arg.inner,
                        name,
                    };
                    match what {
                        Extract::Label => self.labels.push(entry),
                        Extract::Bibitem => self.bibitems.push(entry),
                    }
                }
            }
        }
        args.span.end().max(thing.resume)
    }

    fn index_heading(&mut self, src: &str, thing: &Thing, cmd: &Arc<Command>) -> usize {
        let args = parse_args(src, thing.resume, &cmd.shapes());
        let end = args.span.end().max(thing.resume);
        if let Some(slot) = cmd.first_mandatory() {
            let arg = args.args[slot];
            if arg.present {
                self.section_index.push(HeadingEntry {
                    span: Span::between(thing.span.pos, end),
                    level: cmd.heading_level.unwrap_or(1),
                    title: trim(&strip_comments(arg.inner.slice(src))),
                });
            }
        }
        end
    }

    fn index_input(&mut self, src: &str, thing: &Thing, cmd: &Arc<Command>) -> usize {
        let args = parse_args(src, thing.resume, &cmd.shapes());
        let end = args.span.end().max(thing.resume);
        if let Some(slot) = cmd.first_mandatory() {
            let arg = args.args[slot];
            if arg.present {
                // The slot may name several files: \usepackage{a,b}.
                let listed = trim(&strip_comments(arg.inner.slice(src)));
                for name in listed.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let path = self.resolve_input(name, cmd.filename.as_deref());
                    self.input_index.push(InputEntry {
                        span: arg.inner,
                        name: name.to_string(),
                        path,
                    });
                }
            }
        }
        end
    }

    /// Apply the command's filename template and resolve against this
    /// file's directory. A name that already carries the template's
    /// extension is taken as written.
    fn resolve_input(&self, name: &str, template: Option<&str>) -> PathBuf {
        let template = template.unwrap_or("%s");
        let suffix = template.strip_prefix("%s").unwrap_or("");
        let resolved = if !suffix.is_empty() && name.ends_with(suffix) {
            name.to_string()
        } else {
            template.replace("%s", name)
        };
        let resolved = PathBuf::from(resolved);
        if resolved.is_absolute() {
            resolved
        } else {
            self.filename
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(resolved)
        }
    }

    fn enter_environment(
        &mut self,
        src: &str,
        thing: &Thing,
        begin: &Arc<Command>,
        env_stack: &mut Vec<String>,
    ) -> usize {
        let begin_args = parse_args(src, thing.resume, &begin.shapes());
        let mut end = begin_args.span.end().max(thing.resume);
        let Some(slot) = begin.first_mandatory() else {
            return end;
        };
        let arg = begin_args.args[slot];
        if !arg.present {
            return end;
        }
        let env_name = trim(&strip_comments(arg.inner.slice(src)));
        if env_name.is_empty() {
            return end;
        }
        env_stack.push(env_name.clone());
        // The environment's own signature follows `\begin{name}`.
        if let Some(env) = self.environments.get(&env_name) {
            if !env.args.is_empty() {
                let env_args = parse_args(src, end, &env.shapes());
                end = env_args.span.end().max(end);
            }
        }
        end
    }

    fn build_children(&mut self, cache: &mut FileCache) {
        if self.depth >= MAX_INCLUDE_DEPTH {
            if !self.input_index.is_empty() {
                tracing::warn!(
                    file = %self.filename.display(),
                    depth = self.depth,
                    "include depth cap reached, not descending"
                );
            }
            return;
        }
        let inputs: Vec<PathBuf> = self
            .input_index
            .iter()
            .map(|entry| entry.path.clone())
            .collect();
        for path in inputs {
            if path == self.filename || self.children.contains_key(&path) {
                continue;
            }
            if let Some(child) = Manuscript::child(cache, path.clone(), self) {
                self.children.insert(path, child);
            }
        }
    }
}

enum Extract {
    Label,
    Bibitem,
}

/// Merge a module and its transitive dependencies into the given scopes.
/// The module's own entries shadow its dependencies'. Safe on dependency
/// cycles: a module already in scope is not revisited.
fn add_module(
    commands: &mut Scope<Command>,
    environments: &mut Scope<Environment>,
    modules: &mut Scope<Module>,
    name: &str,
) {
    if modules.contains(name) {
        return;
    }
    let Some(module) = load_module(name) else {
        tracing::warn!(module = name, "module dictionary not found");
        return;
    };
    modules.insert(name, module.clone());
    for dependency in &module.dependencies {
        add_module(commands, environments, modules, dependency);
    }
    for (cmd_name, cmd) in &module.commands {
        commands.insert(cmd_name.clone(), cmd.clone());
    }
    for (env_name, env) in &module.environments {
        environments.insert(env_name.clone(), env.clone());
    }
}

/// Nest headings by level: each heading becomes a child of the most
/// recent strictly shallower one.
fn build_outline(flat: &[HeadingEntry]) -> Vec<OutlineNode> {
    let mut roots: Vec<OutlineNode> = Vec::new();
    let mut stack: Vec<OutlineNode> = Vec::new();

    fn attach(roots: &mut Vec<OutlineNode>, stack: &mut [OutlineNode], done: OutlineNode) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }

    for heading in flat {
        let node = OutlineNode {
            span: heading.span,
            level: heading.level,
            title: heading.title.clone(),
            children: Vec::new(),
        };
        while stack.last().is_some_and(|top| top.level >= node.level) {
            if let Some(done) = stack.pop() {
                attach(&mut roots, &mut stack, done);
            }
        }
        stack.push(node);
    }
    while let Some(done) = stack.pop() {
        attach(&mut roots, &mut stack, done);
    }
    roots
}
