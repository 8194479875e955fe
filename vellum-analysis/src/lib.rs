//! The Vellum document model and query layer.
//!
//! This crate turns TeX sources into answers for an editor: a file cache
//! with position arithmetic, a manuscript graph linking files through
//! `\input`-style commands, a scan engine extracting labels, headings,
//! and bibliography items, and a local scan that turns a caret position
//! into a context stack for completion, hover, and signature help.
//!
//! Everything here is synchronous and single-owner; the protocol shell
//! serializes requests into a [`Workspace`]. Query misses are `None`,
//! never errors: outside a recognized construct the editor's intent is
//! undefined, so the shell answers with its protocol's null.

pub mod cache;
pub mod completion;
pub mod context;
pub mod error;
pub mod help;
pub mod manuscript;
pub mod scope;
pub mod workspace;

pub use cache::FileCache;
pub use completion::{complete, Candidate, Completion};
pub use context::{local_scan, Frame, FrameData};
pub use error::CacheError;
pub use help::{get_help, Help, ParamInfo, SignatureInfo};
pub use manuscript::{
    Format, HeadingEntry, IndexEntry, InputEntry, Manuscript, OutlineNode, MAX_INCLUDE_DEPTH,
};
pub use scope::Scope;
pub use workspace::{
    Change, CompletionItem, Hover, Location, Settings, SignatureHelp, Workspace,
};
