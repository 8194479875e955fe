//! TeX parsing primitives for the Vellum language server.
//!
//! This crate is the lowest layer of the document model: byte-offset spans,
//! a line index for position arithmetic, and a stateless tokenizer exposing
//! primitive matchers over `(text, byte offset)` inputs.
//!
//! Everything here operates on plain `&str` slices and byte offsets. Nothing
//! in this crate allocates per token, holds parser state between calls, or
//! fails on malformed input: unterminated groups close at end of text,
//! missing optional arguments come back marked absent, and unknown control
//! sequences are still reported as control sequences.

pub mod args;
pub mod line_index;
pub mod span;
pub mod text;
pub mod token;

pub use args::{parse_args, parse_keys, Arg, ArgList, ArgShape, KeyVal};
pub use line_index::LineIndex;
pub use span::Span;
pub use text::{blank, strip_comments, trim};
pub use token::{next_thing, paragraph_start, Thing, ThingKind};
