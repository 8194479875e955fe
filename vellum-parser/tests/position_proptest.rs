//! Property tests for position arithmetic.
//!
//! The round-trip law: for any text and any codepoint-aligned byte offset
//! `p`, converting to `(line, column)` and back yields `p` again.

use proptest::prelude::*;
use vellum_parser::LineIndex;

fn text_strategy() -> impl Strategy<Value = String> {
    // Mix of ASCII, multi-byte characters, newlines, and blank lines.
    proptest::collection::vec(
        prop_oneof![
            "[ -~]{0,12}",
            "[äöü§λ≤]{0,4}",
            Just("\n".to_string()),
            Just("\n\n".to_string()),
        ],
        0..24,
    )
    .prop_map(|pieces| pieces.concat())
}

proptest! {
    #[test]
    fn round_trip_at_every_codepoint(text in text_strategy()) {
        let index = LineIndex::new(&text);
        for (offset, _) in text.char_indices() {
            let (line, col) = index.line_col(&text, offset);
            prop_assert_eq!(index.offset(&text, line, col), offset);
        }
        // End-of-text round-trips too.
        let (line, col) = index.line_col(&text, text.len());
        prop_assert_eq!(index.offset(&text, line, col), text.len());
    }

    #[test]
    fn line_col_is_monotonic(text in text_strategy()) {
        let index = LineIndex::new(&text);
        let mut prev = (0usize, 0usize);
        for (offset, _) in text.char_indices().skip(1) {
            let cur = index.line_col(&text, offset);
            prop_assert!(cur > prev);
            prev = cur;
        }
    }

    #[test]
    fn out_of_range_positions_clamp(
        text in text_strategy(),
        line in 0usize..64,
        col in 0usize..128,
    ) {
        let index = LineIndex::new(&text);
        let offset = index.offset(&text, line, col);
        prop_assert!(offset <= text.len());
        // The clamped offset must sit on a codepoint boundary.
        prop_assert!(text.is_char_boundary(offset));
    }
}
