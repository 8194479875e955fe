//! Signature-driven argument parsing.
//!
//! [`parse_args`] consumes the argument list of a control sequence, driven
//! by the shapes declared in its signature. [`parse_keys`] splits a
//! key\[=value\] list inside a delimited region. Both return byte spans into
//! the original text and never fail: absent optionals come back with
//! `present = false`, unterminated groups close at end of text.

use crate::span::Span;
use crate::token::{next_thing, ThingKind};

/// The delimiter shape of one formal argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgShape {
    /// Mandatory `{…}`. A bare token (control sequence or single
    /// character) is accepted where TeX would accept it.
    Group,
    /// Optional `[…]`, possibly absent.
    Bracket,
    /// Optional `*`.
    Star,
    /// A literal delimiter such as `(` that is consumed if present.
    Literal(String),
}

/// One parsed argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    /// Delimiters included.
    pub outer: Span,
    /// Content between the delimiters. For star and literal arguments this
    /// equals `outer`.
    pub inner: Span,
    /// False for an absent optional; the spans are then empty and anchored
    /// where the argument would have started.
    pub present: bool,
}

/// The parsed argument list. `args.len()` always equals the signature
/// length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgList {
    /// From the start of the first argument to the end of the last present
    /// one.
    pub span: Span,
    pub args: Vec<Arg>,
}

impl ArgList {
    /// Index of the argument whose outer span touches `pos`, if any.
    pub fn slot_at(&self, pos: usize) -> Option<usize> {
        self.args
            .iter()
            .position(|arg| arg.present && arg.outer.touches(pos))
    }
}

/// Parse the argument list that starts at `pos` (just past the control
/// sequence name), consuming one slot per entry in `shapes`.
pub fn parse_args(text: &str, pos: usize, shapes: &[ArgShape]) -> ArgList {
    let mut cursor = pos.min(text.len());
    let mut args = Vec::with_capacity(shapes.len());
    let mut first_start = None;
    let mut last_end = cursor;

    for shape in shapes {
        let start = skip_space(text, cursor);
        let arg = match shape {
            ArgShape::Group => group_arg(text, start),
            ArgShape::Bracket => delimited_arg(text, start, b'[', b']'),
            ArgShape::Star => literal_arg(text, start, "*"),
            ArgShape::Literal(token) => literal_arg(text, start, token),
        };
        if arg.present {
            first_start.get_or_insert(arg.outer.pos);
            last_end = arg.outer.end();
            cursor = arg.outer.end();
        }
        args.push(arg);
    }

    let span_start = first_start.unwrap_or(pos.min(text.len()));
    ArgList {
        span: Span::between(span_start, last_end.max(span_start)),
        args,
    }
}

/// Parse a comma-separated key\[=value\] list within `region`. Whitespace
/// around keys and values is not part of the returned spans; braces in
/// values are honoured, so a comma inside `{…}` does not split.
pub fn parse_keys(text: &str, region: Span) -> Vec<KeyVal> {
    let end = region.end().min(text.len());
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut item_start = region.pos.min(end);
    let mut depth = 0usize;
    let mut i = item_start;
    while i <= end {
        let at_sep = i == end || (depth == 0 && bytes[i] == b',');
        if at_sep {
            if let Some(item) = split_key_val(text, item_start, i) {
                items.push(item);
            }
            item_start = i + 1;
        } else {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        i += 1;
    }
    items
}

/// One key\[=value\] pair as found by [`parse_keys`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyVal {
    pub key: Span,
    pub value: Option<Span>,
}

fn split_key_val(text: &str, start: usize, end: usize) -> Option<KeyVal> {
    let bytes = text.as_bytes();
    let mut eq = None;
    let mut depth = 0usize;
    for i in start..end {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 && eq.is_none() => eq = Some(i),
            _ => {}
        }
    }
    let key_end = eq.unwrap_or(end);
    let key = trimmed_span(text, start, key_end)?;
    // A present `=` with nothing after it still yields a value slot: an
    // empty span anchored where the value would start.
    let value = eq.map(|e| {
        trimmed_span(text, e + 1, end).unwrap_or_else(|| {
            let slice = &text[e + 1..end];
            let leading = slice.len() - slice.trim_start().len();
            Span::empty(e + 1 + leading)
        })
    });
    Some(KeyVal { key, value })
}

/// Span of `start..end` with surrounding whitespace stripped; `None` when
/// nothing but whitespace remains.
fn trimmed_span(text: &str, start: usize, end: usize) -> Option<Span> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let offset = trimmed.as_ptr() as usize - slice.as_ptr() as usize;
    Some(Span::new(start + offset, trimmed.len()))
}

fn group_arg(text: &str, start: usize) -> Arg {
    let bytes = text.as_bytes();
    if bytes.get(start) == Some(&b'{') {
        // matching_brace returns text.len() for an unterminated group, so
        // the inner span runs to end of text in that case.
        let close = matching_brace(text, start);
        return Arg {
            outer: Span::between(start, (close + 1).min(text.len())),
            inner: Span::between(start + 1, close),
            present: true,
        };
    }
    // Brace-less mandatory argument: a single control sequence or a single
    // character stands in for the group.
    match next_thing(text, start) {
        Some(thing) if thing.span.pos == start => match thing.kind {
            ThingKind::Close | ThingKind::Par => absent(start),
            _ => Arg {
                outer: thing.span,
                inner: thing.span,
                present: true,
            },
        },
        _ => match text[start.min(text.len())..].chars().next() {
            Some(ch) if ch != '\n' => {
                let span = Span::new(start, ch.len_utf8());
                Arg {
                    outer: span,
                    inner: span,
                    present: true,
                }
            }
            _ => absent(start.min(text.len())),
        },
    }
}

fn delimited_arg(text: &str, start: usize, open: u8, close: u8) -> Arg {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&open) {
        return absent(start.min(text.len()));
    }
    let mut depth = 0usize;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\\' => i += 1, // skip the escaped character
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b if b == close && depth == 0 => {
                return Arg {
                    outer: Span::between(start, i + 1),
                    inner: Span::between(start + 1, i),
                    present: true,
                };
            }
            _ => {}
        }
        i += 1;
    }
    // Unterminated: closes at end of text.
    Arg {
        outer: Span::between(start, text.len()),
        inner: Span::between(start + 1, text.len()),
        present: true,
    }
}

fn literal_arg(text: &str, start: usize, token: &str) -> Arg {
    if text[start.min(text.len())..].starts_with(token) {
        let span = Span::new(start, token.len());
        Arg {
            outer: span,
            inner: span,
            present: true,
        }
    } else {
        absent(start.min(text.len()))
    }
}

fn absent(pos: usize) -> Arg {
    Arg {
        outer: Span::empty(pos),
        inner: Span::empty(pos),
        present: false,
    }
}

/// Offset of the `}` matching the `{` at `open_pos`, or `text.len()` when
/// the group is unterminated. Comments and escaped braces are honoured.
fn matching_brace(text: &str, open_pos: usize) -> usize {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes[open_pos], b'{');
    let mut depth = 0usize;
    let mut i = open_pos;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            b'\\' => i += 1,
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    text.len()
}

fn skip_space(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos.min(bytes.len());
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
        i += 1;
    }
    i
}
