//! Line/column to byte-offset conversion.
//!
//! Editors address positions as `(line, character)` pairs where `character`
//! counts UTF-8 codepoints; the document model works in byte offsets. The
//! [`LineIndex`] holds the byte offset of every line start so both
//! directions run in O(log n) plus the width of one line.
//!
//! Out-of-range inputs clamp rather than fail: a column past the end of a
//! line clamps to the line's final byte offset, a line past the end of the
//! text clamps to the text length.

/// Byte offsets where each line of a text starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (pos, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(pos + 1);
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of the start of `line` (0-based).
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Byte offset just past the content of `line`, excluding its newline.
    pub fn line_content_end(&self, line: usize) -> Option<usize> {
        self.line_start(line)?;
        Some(
            self.line_start(line + 1)
                .map(|next| next - 1)
                .unwrap_or(self.text_len),
        )
    }

    /// Convert a 0-based `(line, column)` pair to a byte offset. `column`
    /// counts codepoints; the result is the offset of that codepoint's
    /// first byte. Columns past end-of-line clamp to the line's content
    /// end; lines past end-of-text clamp to the text length.
    pub fn offset(&self, text: &str, line: usize, column: usize) -> usize {
        let Some(start) = self.line_start(line) else {
            return self.text_len;
        };
        let end = self.line_content_end(line).unwrap_or(self.text_len);
        let mut offset = start;
        let mut remaining = column;
        let mut chars = text[start..end].char_indices();
        while remaining > 0 {
            match chars.next() {
                Some((_, ch)) => {
                    offset += ch.len_utf8();
                    remaining -= 1;
                }
                None => return end,
            }
        }
        offset
    }

    /// Convert a byte offset to a 0-based `(line, column)` pair, column in
    /// codepoints. Offsets past end-of-text clamp to the final position.
    pub fn line_col(&self, text: &str, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text_len);
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i - 1);
        let start = self.line_starts[line];
        let column = text[start..offset].chars().count();
        (line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_text() {
        let text = "alpha\nbeta\ngamma";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, 0, 0), 0);
        assert_eq!(index.offset(text, 1, 0), 6);
        assert_eq!(index.offset(text, 2, 3), 14);
        assert_eq!(index.line_col(text, 14), (2, 3));
        assert_eq!(index.line_col(text, 6), (1, 0));
    }

    #[test]
    fn columns_count_codepoints_not_bytes() {
        let text = "ä§\nx";
        let index = LineIndex::new(text);
        // 'ä' is 2 bytes, '§' is 2 bytes
        assert_eq!(index.offset(text, 0, 1), 2);
        assert_eq!(index.offset(text, 0, 2), 4);
        assert_eq!(index.line_col(text, 2), (0, 1));
        assert_eq!(index.line_col(text, 5), (1, 0));
    }

    #[test]
    fn column_past_line_end_clamps_to_content_end() {
        let text = "ab\ncd\n";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, 0, 99), 2);
        assert_eq!(index.offset(text, 1, 99), 5);
    }

    #[test]
    fn line_past_text_end_clamps_to_text_len() {
        let text = "ab\ncd";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, 7, 0), 5);
    }

    #[test]
    fn trailing_newline_counts_as_line_start() {
        let index = LineIndex::new("ab\n");
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.line_start(1), Some(3));
    }

    #[test]
    fn offset_past_text_end_clamps_in_line_col() {
        let text = "ab";
        let index = LineIndex::new(text);
        assert_eq!(index.line_col(text, 50), (0, 2));
    }
}
