//! Evaluation-block location over masked SuperCollider source.
//!
//! A block is the outermost balanced-parenthesis region whose `(` is
//! line-initial and whose `)` is followed only by horizontal whitespace
//! before a line terminator, a `;`, or end of text. This mirrors the
//! SuperCollider IDE's convention of evaluating the enclosing top-level
//! `( ... )` region at the cursor. Only `(`/`)` participate in depth
//! counting; executable blocks in the language are parenthesized
//! exclusively, so `[]`/`{}` are ignored on purpose.

use std::ops::Range;

use super::mask::mask;

/// The text to send to the interpreter for a cursor position, together with
/// the byte range it was sliced from.
///
/// When no enclosing block exists this is the trimmed current line; callers
/// cannot distinguish that fallback from a legitimate one-line block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Half-open byte range into the original source.
    pub range: Range<usize>,
    /// The original-text slice covered by `range`.
    pub text: String,
}

/// Find the outermost enclosing evaluable block around `cursor` in masked
/// text. Returns the half-open byte range including both parentheses, or
/// `None` when no valid block encloses the cursor.
pub fn find_region(masked: &str, cursor: usize) -> Option<Range<usize>> {
    let bytes = masked.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let cursor = cursor.min(bytes.len());

    // Backward scan, inclusive of the cursor offset itself so a cursor
    // sitting on a delimiter still sees it.
    let scan_start = cursor.min(bytes.len() - 1);
    let mut depth: i32 = 0;
    let mut winner: Option<Range<usize>> = None;

    for open in (0..=scan_start).rev() {
        match bytes[open] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth <= 0 && is_line_initial(bytes, open) {
                    if let Some(close) = matching_close(bytes, open) {
                        let reaches_cursor =
                            close >= cursor || on_same_line(bytes, close, cursor);
                        if reaches_cursor && close_is_terminated(bytes, close) {
                            // Later finds are further left, hence more
                            // enclosing. The outermost valid block wins.
                            winner = Some(open..close + 1);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    winner
}

/// Resolve the evaluation target at `cursor`: the enclosing block's original
/// text, or the trimmed text of the cursor's line when no block is found.
pub fn evaluation_selection(source: &str, cursor: usize) -> Selection {
    let cursor = cursor.min(source.len());
    let masked = mask(source);

    if let Some(range) = find_region(&masked, cursor) {
        return Selection {
            text: source[range.clone()].to_string(),
            range,
        };
    }

    let line = line_bounds(source.as_bytes(), cursor);
    let raw = &source[line.clone()];
    let trimmed = raw.trim();
    let start = line.start + (raw.len() - raw.trim_start().len());
    Selection {
        range: start..start + trimmed.len(),
        text: trimmed.to_string(),
    }
}

/// Only spaces/tabs between `pos` and the previous line terminator (or start
/// of text).
fn is_line_initial(bytes: &[u8], pos: usize) -> bool {
    let mut i = pos;
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b' ' | b'\t' => {}
            b'\n' | b'\r' => return true,
            _ => return false,
        }
    }
    true
}

/// Offset of the `)` matching the `(` at `open`, using a fresh depth
/// counter. `None` when the region is never closed.
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, &c) in bytes.iter().enumerate().skip(open) {
        match c {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// After the close paren, only spaces/tabs may precede a line terminator,
/// a `;`, or end of text.
fn close_is_terminated(bytes: &[u8], close: usize) -> bool {
    let mut i = close + 1;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b'\n' | b'\r' | b';' => return true,
            _ => return false,
        }
    }
    true
}

/// No line terminator strictly between the two offsets.
fn on_same_line(bytes: &[u8], a: usize, b: usize) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let hi = hi.min(bytes.len());
    !bytes[lo..hi].iter().any(|&c| c == b'\n' || c == b'\r')
}

/// Byte range of the line containing `cursor`, excluding the terminator.
fn line_bounds(bytes: &[u8], cursor: usize) -> Range<usize> {
    let cursor = cursor.min(bytes.len());
    let mut start = cursor;
    while start > 0 && bytes[start - 1] != b'\n' && bytes[start - 1] != b'\r' {
        start -= 1;
    }
    let mut end = cursor;
    while end < bytes.len() && bytes[end] != b'\n' && bytes[end] != b'\r' {
        end += 1;
    }
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Offset of the first occurrence of `needle`, for cursor placement.
    fn at(source: &str, needle: &str) -> usize {
        source.find(needle).expect("needle present")
    }

    #[test]
    fn simple_block() {
        let src = "(\nvar sig = SinOsc.ar(440);\nsig.play;\n)";
        let sel = evaluation_selection(src, at(src, "sig.play"));
        assert_eq!(sel.text, src);
        assert_eq!(sel.range, 0..src.len());
    }

    #[test]
    fn outermost_block_wins() {
        let src = "(\n    (\n        ~x = 1;\n    )\n)";
        let sel = evaluation_selection(src, at(src, "~x"));
        assert_eq!(sel.text, src);
    }

    #[test]
    fn inner_block_when_outer_open_not_line_initial() {
        let src = "x = (\n    (\n        ~x = 1;\n    )\n)";
        // The outer `(` follows `x = ` and is never a candidate, so the
        // inner block is the result.
        let sel = evaluation_selection(src, at(src, "~x"));
        assert_eq!(sel.text, "(\n        ~x = 1;\n    )");
    }

    #[test]
    fn non_line_initial_paren_falls_back_to_line() {
        let src = "foo(1, 2)";
        let sel = evaluation_selection(src, at(src, "1,"));
        assert_eq!(sel.text, "foo(1, 2)");
        assert_eq!(sel.range, 0..src.len());
    }

    #[test]
    fn trailing_content_invalidates_candidate() {
        let src = "(\n  1 + 1\n) + 2";
        let sel = evaluation_selection(src, at(src, "1 +"));
        assert_eq!(sel.text, "1 + 1");
    }

    #[test]
    fn close_followed_by_semicolon_is_valid() {
        let src = "(\n  1 + 1\n);";
        let sel = evaluation_selection(src, at(src, "1 +"));
        assert_eq!(sel.text, "(\n  1 + 1\n)");
    }

    #[test]
    fn close_followed_by_spaces_then_newline_is_valid() {
        let src = "(\n  1 + 1\n)  \nx";
        let sel = evaluation_selection(src, at(src, "1 +"));
        assert_eq!(sel.text, "(\n  1 + 1\n)");
    }

    #[test]
    fn indented_open_is_still_line_initial() {
        let src = "\t  (\n  1 + 1\n)";
        let sel = evaluation_selection(src, at(src, "1 +"));
        assert_eq!(sel.text, "(\n  1 + 1\n)");
    }

    #[test]
    fn unbalanced_open_falls_back() {
        let src = "(\n  1 + 1\n";
        let sel = evaluation_selection(src, at(src, "1 +"));
        assert_eq!(sel.text, "1 + 1");
    }

    #[test]
    fn cursor_before_block_not_enclosed() {
        let src = "x;\n(\n  1 + 1\n)";
        let sel = evaluation_selection(src, 0);
        assert_eq!(sel.text, "x;");
    }

    #[test]
    fn cursor_after_close_on_same_line_still_selects() {
        let src = "(\n  1 + 1\n) ";
        let sel = evaluation_selection(src, src.len());
        assert_eq!(sel.text, "(\n  1 + 1\n)");
    }

    #[test]
    fn cursor_on_open_paren_selects_block() {
        let src = "(\n  1 + 1\n)";
        let sel = evaluation_selection(src, 0);
        assert_eq!(sel.text, src);
    }

    #[test]
    fn cursor_on_close_paren_selects_block() {
        let src = "(\n  1 + 1\n)";
        let sel = evaluation_selection(src, src.len() - 1);
        assert_eq!(sel.text, src);
    }

    #[test]
    fn block_after_cursor_line_not_selected() {
        let src = "a;\nb;\n(\n  1 + 1\n)";
        let sel = evaluation_selection(src, at(src, "b;"));
        assert_eq!(sel.text, "b;");
    }

    #[test]
    fn sibling_block_before_cursor_not_selected() {
        let src = "(\n  a;\n)\n(\n  b;\n)";
        let sel = evaluation_selection(src, at(src, "b;"));
        assert_eq!(sel.text, "(\n  b;\n)");
    }

    #[test]
    fn paren_inside_string_does_not_break_matching() {
        let src = "(\n  \"(\".postln;\n)";
        let sel = evaluation_selection(src, at(src, "postln"));
        assert_eq!(sel.text, src);
    }

    #[test]
    fn paren_inside_comment_does_not_break_matching() {
        let src = "(\n  x; // )\n  y;\n)";
        let sel = evaluation_selection(src, at(src, "y;"));
        assert_eq!(sel.text, src);
    }

    #[test]
    fn paren_inside_array_literal_counts() {
        // Only ()/() are balanced; a `(` inside `[...]` still participates.
        let src = "(\n  x = [SinOsc.ar(440)];\n)";
        let sel = evaluation_selection(src, at(src, "x ="));
        assert_eq!(sel.text, src);
    }

    #[test]
    fn empty_document_yields_empty_selection() {
        let sel = evaluation_selection("", 0);
        assert_eq!(sel.text, "");
        assert_eq!(sel.range, 0..0);
    }

    #[test]
    fn cursor_past_end_is_clamped() {
        let src = "(\n  1 + 1\n)";
        let sel = evaluation_selection(src, src.len() + 100);
        assert_eq!(sel.text, src);
    }

    #[test]
    fn fallback_line_is_trimmed_with_matching_range() {
        let src = "  foo.play;  \n";
        let sel = evaluation_selection(src, 4);
        assert_eq!(sel.text, "foo.play;");
        assert_eq!(sel.range, 2..11);
        assert_eq!(&src[sel.range.clone()], "foo.play;");
    }

    #[test]
    fn find_region_ignores_masked_delimiters() {
        let src = "(\n  \")\".postln;\n)";
        let masked = mask(src);
        assert_eq!(find_region(&masked, at(src, "postln")), Some(0..src.len()));
    }

    #[test]
    fn find_region_none_without_block() {
        let masked = mask("foo.play;");
        assert_eq!(find_region(&masked, 2), None);
    }
}
