//! The "next interesting thing" matcher.
//!
//! [`next_thing`] scans forward from a byte offset, skipping ordinary text
//! and comments, and stops at the next syntactically significant token:
//! a control sequence, a math shift, a paragraph break, or a brace group
//! delimiter. It is the single primitive both the global and the local scan
//! are driven by.

use crate::span::Span;

/// A syntactically significant token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThingKind<'a> {
    /// A control sequence; the payload is the name without the backslash.
    /// Control words are runs of `[A-Za-z@]`, control symbols a single
    /// non-letter character (so `\(` has name `(` and `\%` name `%`).
    ControlSeq(&'a str),
    /// `$` or `$$`.
    MathShift,
    /// A blank line (newlines separated by horizontal whitespace and
    /// comments only).
    Par,
    /// `{`
    Open,
    /// `}`
    Close,
}

/// One token as reported by [`next_thing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thing<'a> {
    /// Where the token begins and how far it extends.
    pub span: Span,
    pub kind: ThingKind<'a>,
    /// Where scanning should continue when the caller does not consume
    /// anything beyond the token itself.
    pub resume: usize,
}

impl<'a> Thing<'a> {
    fn new(start: usize, end: usize, kind: ThingKind<'a>) -> Self {
        Self {
            span: Span::between(start, end),
            kind,
            resume: end,
        }
    }
}

/// Scan forward from `pos` to the next significant token. Returns `None`
/// at end of text. Comments run from an unescaped `%` to the end of the
/// line; the text inside them is never reported.
pub fn next_thing(text: &str, pos: usize) -> Option<Thing<'_>> {
    let bytes = text.as_bytes();
    let mut i = pos.min(text.len());
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => return Some(control_seq(text, i)),
            b'$' => {
                let end = if bytes.get(i + 1) == Some(&b'$') {
                    i + 2
                } else {
                    i + 1
                };
                return Some(Thing::new(i, end, ThingKind::MathShift));
            }
            b'{' => return Some(Thing::new(i, i + 1, ThingKind::Open)),
            b'}' => return Some(Thing::new(i, i + 1, ThingKind::Close)),
            b'%' => i = skip_comment(bytes, i),
            b'\n' => {
                if let Some(end) = par_break_end(bytes, i) {
                    return Some(Thing::new(i, end, ThingKind::Par));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Start of the paragraph enclosing `pos`: the end of the last paragraph
/// break at or before it, or the start of text. Single linear scan.
pub fn paragraph_start(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let limit = pos.min(bytes.len());
    let mut start = 0;
    let mut i = 0;
    while i < limit {
        match bytes[i] {
            b'%' => i = skip_comment(bytes, i),
            b'\n' => match par_break_end(bytes, i) {
                Some(end) if end <= limit => {
                    start = end;
                    i = end;
                }
                Some(_) => break, // pos sits inside the blank stretch
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    start
}

fn control_seq(text: &str, start: usize) -> Thing<'_> {
    let bytes = text.as_bytes();
    let name_start = start + 1;
    let mut end = name_start;
    while end < bytes.len() && (bytes[end].is_ascii_alphabetic() || bytes[end] == b'@') {
        end += 1;
    }
    if end == name_start && end < bytes.len() {
        // Control symbol: exactly one character, which may be multi-byte.
        end += text[end..].chars().next().map(char::len_utf8).unwrap_or(0);
    }
    Thing::new(start, end, ThingKind::ControlSeq(&text[name_start..end]))
}

/// Skip a comment starting at `%`. Stops just before the terminating
/// newline so the paragraph-break logic still sees it.
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// If the newline at `start` opens a paragraph break, the offset just past
/// the blank stretch; otherwise `None`. A break requires a second newline
/// with only horizontal whitespace and comments in between.
fn par_break_end(bytes: &[u8], start: usize) -> Option<usize> {
    debug_assert_eq!(bytes[start], b'\n');
    let mut i = start + 1;
    let mut second_newline = false;
    loop {
        match bytes.get(i) {
            Some(b' ') | Some(b'\t') | Some(b'\r') => i += 1,
            Some(b'%') => {
                i = skip_comment(bytes, i);
                // the comment's newline counts toward the break
                if i < bytes.len() {
                    i += 1;
                    second_newline = true;
                }
            }
            Some(b'\n') => {
                i += 1;
                second_newline = true;
            }
            _ => break,
        }
    }
    second_newline.then_some(i)
}
