//! Comment and literal masking for SuperCollider source text.
//!
//! Delimiter matching in [`super::block`] must not be confused by parentheses
//! that appear inside comments, string literals, or symbol literals. `mask`
//! produces a same-length copy of the source with the contents of those
//! regions (delimiters included) replaced by blanks, so byte offsets computed
//! against the masked text are always valid offsets into the original.

/// Return a same-length copy of `source` with comments, double-quoted
/// strings, and single-quoted symbols blanked out.
///
/// Rules:
/// - `//` blanks to (but excluding) the next line terminator.
/// - `/* */` blanks through the matching close; block comments nest.
/// - `"..."` and `'...'` blank through the closing quote; a backslash
///   escapes the following character. A `'` preceded by `$` is a character
///   literal, not a symbol open.
/// - Line terminators are always preserved so line/column math stays valid.
/// - Unterminated regions blank to end of text.
pub fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut masked = bytes.to_vec();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let next = bytes.get(pos + 1).copied();

        if c == b'/' && next == Some(b'/') {
            pos = blank_line_comment(&mut masked, bytes, pos);
        } else if c == b'/' && next == Some(b'*') {
            pos = blank_block_comment(&mut masked, bytes, pos);
        } else if c == b'"' {
            pos = blank_quoted(&mut masked, bytes, pos, b'"');
        } else if c == b'\'' && (pos == 0 || bytes[pos - 1] != b'$') {
            pos = blank_quoted(&mut masked, bytes, pos, b'\'');
        } else {
            pos += 1;
        }
    }

    // Only ASCII blanks were written, over regions that start and end at
    // ASCII delimiters, so the buffer is still valid UTF-8.
    String::from_utf8(masked).expect("masking writes only ASCII blanks")
}

/// Blank a `//` comment starting at `pos`. Returns the offset just past it.
fn blank_line_comment(masked: &mut [u8], bytes: &[u8], pos: usize) -> usize {
    let mut pos = pos;
    while pos < bytes.len() && bytes[pos] != b'\n' && bytes[pos] != b'\r' {
        masked[pos] = b' ';
        pos += 1;
    }
    pos
}

/// Blank a `/* */` comment starting at `pos`, honoring nesting. Returns the
/// offset just past the matching close, or end of text if unterminated.
fn blank_block_comment(masked: &mut [u8], bytes: &[u8], pos: usize) -> usize {
    let mut depth = 0usize;
    let mut pos = pos;
    while pos < bytes.len() {
        let c = bytes[pos];
        if c == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            depth += 1;
            masked[pos] = b' ';
            masked[pos + 1] = b' ';
            pos += 2;
        } else if c == b'*' && bytes.get(pos + 1) == Some(&b'/') {
            depth -= 1;
            masked[pos] = b' ';
            masked[pos + 1] = b' ';
            pos += 2;
            if depth == 0 {
                return pos;
            }
        } else {
            if c != b'\n' && c != b'\r' {
                masked[pos] = b' ';
            }
            pos += 1;
        }
    }
    pos
}

/// Blank a quoted region (string or symbol) opened by `quote` at `pos`.
/// Returns the offset just past the closing quote, or end of text if
/// unterminated.
fn blank_quoted(masked: &mut [u8], bytes: &[u8], pos: usize, quote: u8) -> usize {
    masked[pos] = b' ';
    let mut pos = pos + 1;
    while pos < bytes.len() {
        let c = bytes[pos];
        if c == b'\\' {
            masked[pos] = b' ';
            pos += 1;
            // The escaped character is part of the literal. Line terminators
            // stay verbatim to keep line numbering intact.
            if pos < bytes.len() {
                if bytes[pos] != b'\n' && bytes[pos] != b'\r' {
                    masked[pos] = b' ';
                }
                pos += 1;
            }
        } else if c == quote {
            masked[pos] = b' ';
            return pos + 1;
        } else {
            if c != b'\n' && c != b'\r' {
                masked[pos] = b' ';
            }
            pos += 1;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_code_unchanged() {
        let src = "var sig = SinOsc.ar(440);";
        assert_eq!(mask(src), src);
    }

    #[test]
    fn length_invariant() {
        let inputs = [
            "",
            "x",
            "// comment\ncode",
            "/* a /* b */ c */ d",
            "\"unterminated",
            "'sym' + \"str\"",
            "/* unterminated\nsecond line",
            "a $\u{20ac} b", // multibyte neighbors
        ];
        for src in inputs {
            assert_eq!(mask(src).len(), src.len(), "input: {:?}", src);
        }
    }

    #[test]
    fn line_comment_blanked_to_line_end() {
        assert_eq!(mask("x; // note\ny;"), "x;        \ny;");
    }

    #[test]
    fn line_comment_at_end_of_text() {
        assert_eq!(mask("x; // note"), "x;        ");
    }

    #[test]
    fn block_comments_nest() {
        assert_eq!(mask("/* a /* b */ c */ d"), "                  d");
    }

    #[test]
    fn unterminated_block_comment_consumes_to_end() {
        assert_eq!(mask("a /* b\nc"), "a     \n ");
    }

    #[test]
    fn string_blanked_including_quotes() {
        assert_eq!(mask("x = \"(hello)\";"), "x =          ;");
    }

    #[test]
    fn escaped_quote_does_not_terminate_string() {
        assert_eq!(mask("\"a\\\"b\""), "      ");
    }

    #[test]
    fn unterminated_string_preserves_newlines() {
        assert_eq!(mask("\"abc\ndef"), "    \n   ");
    }

    #[test]
    fn symbol_blanked() {
        assert_eq!(mask("x = 'freq';"), "x =       ;");
    }

    #[test]
    fn char_literal_quote_not_a_symbol_open() {
        assert_eq!(mask("$' x"), "$' x");
    }

    #[test]
    fn char_literal_then_real_symbol() {
        // The first quote is a character literal; the next one opens a symbol.
        assert_eq!(mask("$' 'a'"), "$'    ");
    }

    #[test]
    fn comment_markers_inside_string_ignored() {
        assert_eq!(mask("\"//not a comment\" x"), "                  x");
    }

    #[test]
    fn string_quote_inside_comment_ignored() {
        assert_eq!(mask("// \"open\nx"), "        \nx");
    }

    #[test]
    fn line_comment_wins_over_block_comment() {
        // The `/*` sits inside a line comment and does not open a block.
        assert_eq!(mask("// /*\nx"), "     \nx");
    }

    #[test]
    fn idempotent_given_same_input() {
        let src = "( // open\nSinOsc.ar(\"f\")\n)";
        assert_eq!(mask(src), mask(src));
    }

    #[test]
    fn multibyte_inside_string_blanked_per_byte() {
        let src = "\"\u{20ac}\" x";
        let masked = mask(src);
        assert_eq!(masked.len(), src.len());
        assert_eq!(masked, "      x");
    }

    #[test]
    fn crlf_preserved_in_comment() {
        assert_eq!(mask("// a\r\nb"), "    \r\nb");
    }
}
