//! Math extraction ahead of the Markdown parser.
//!
//! Every math span is swapped for a placeholder token built from two
//! private-use code points around the decimal span id. Comrak gives those
//! characters no meaning, so a token always survives parsing as an atomic run
//! inside a single text, code or HTML node.
//!
//! Placeholder code points already present in the source are rewritten to
//! `TOKEN_OPEN 's' <offset> TOKEN_CLOSE` first. That form never parses as
//! a span id, and [`unescape_sentinels`] turns it back into the original
//! character once rendering is done.

use std::borrow::Cow;

use crate::application::render::types::{MathDelimiter, MathSpan};

pub(crate) const TOKEN_OPEN: char = '\u{E000}';
pub(crate) const TOKEN_CLOSE: char = '\u{E001}';

/// Marks an escaped source character; never an ASCII digit.
const SENTINEL_MARK: char = 's';
const SENTINEL_FIRST: char = '\u{E000}';
const SENTINEL_LAST: char = '\u{E003}';

#[derive(Debug, Default)]
pub(crate) struct Extraction {
    pub(crate) text: String,
    pub(crate) spans: Vec<MathSpan>,
}

pub(crate) fn placeholder_token(id: usize) -> String {
    format!("{TOKEN_OPEN}{id}{TOKEN_CLOSE}")
}

/// Replace math spans with placeholder tokens.
///
/// Display spans are collected before inline ones so a `$$` pair is never
/// read as two adjacent `$` spans.
pub(crate) fn extract_math(source: &str, latex_delimiters: bool) -> Extraction {
    let source = escape_sentinels(source);
    let mut passes = vec![MathDelimiter::DisplayDollars];
    if latex_delimiters {
        passes.push(MathDelimiter::DisplayBracket);
    }
    passes.push(MathDelimiter::InlineDollar);
    if latex_delimiters {
        passes.push(MathDelimiter::InlineParen);
    }

    let mut spans = Vec::new();
    let text = passes.into_iter().fold(source.into_owned(), |text, delimiter| {
        replace_spans(&text, delimiter, &mut spans)
    });

    Extraction { text, spans }
}

fn is_sentinel(ch: char) -> bool {
    (SENTINEL_FIRST..=SENTINEL_LAST).contains(&ch)
}

/// Rewrite placeholder code points so they cannot be mistaken for tokens.
pub(crate) fn escape_sentinels(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_sentinel) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if is_sentinel(ch) {
            let offset = u32::from(ch) - u32::from(SENTINEL_FIRST);
            escaped.push(TOKEN_OPEN);
            escaped.push(SENTINEL_MARK);
            escaped.extend(char::from_digit(offset, 10));
            escaped.push(TOKEN_CLOSE);
        } else {
            escaped.push(ch);
        }
    }
    Cow::Owned(escaped)
}

/// Inverse of [`escape_sentinels`]. Anything else is copied through.
pub(crate) fn unescape_sentinels(text: &str) -> Cow<'_, str> {
    if !text.contains(TOKEN_OPEN) {
        return Cow::Borrowed(text);
    }

    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != TOKEN_OPEN {
            output.push(ch);
            continue;
        }

        let mut lookahead = chars.clone();
        let decoded = match (lookahead.next(), lookahead.next(), lookahead.next()) {
            (Some(SENTINEL_MARK), Some(digit), Some(TOKEN_CLOSE)) => digit
                .to_digit(10)
                .and_then(|offset| char::from_u32(u32::from(SENTINEL_FIRST) + offset))
                .filter(|decoded| is_sentinel(*decoded)),
            _ => None,
        };

        match decoded {
            Some(decoded) => {
                output.push(decoded);
                chars = lookahead;
            }
            None => output.push(ch),
        }
    }
    Cow::Owned(output)
}

fn replace_spans(text: &str, delimiter: MathDelimiter, spans: &mut Vec<MathSpan>) -> String {
    let open = delimiter.open();
    let close = delimiter.close();

    let mut output = String::with_capacity(text.len());
    let mut copied_up_to = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        let body_start = start + open.len();

        match find_close(&text[body_start..], delimiter) {
            Some(body_len) => {
                let end = body_start + body_len + close.len();
                output.push_str(&text[copied_up_to..start]);
                output.push_str(&placeholder_token(spans.len()));
                spans.push(MathSpan {
                    id: spans.len(),
                    literal: text[start..end].to_string(),
                    delimiter,
                });
                copied_up_to = end;
                search_from = end;
            }
            // Delimiters are ASCII, so stepping one byte stays on a char boundary.
            None => search_from = start + 1,
        }
    }

    output.push_str(&text[copied_up_to..]);
    output
}

/// Length of the span body when `rest` holds a valid body followed by the
/// closing delimiter.
fn find_close(rest: &str, delimiter: MathDelimiter) -> Option<usize> {
    let close = delimiter.close();
    let body_len = rest.find(close)?;
    let body = &rest[..body_len];

    if body.contains(TOKEN_OPEN) {
        return None;
    }

    if delimiter.is_display() {
        return Some(body_len);
    }

    if body.is_empty() || body.contains('\n') {
        return None;
    }
    Some(body_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(extraction: &Extraction) -> Vec<&str> {
        extraction
            .spans
            .iter()
            .map(|span| span.literal.as_str())
            .collect()
    }

    #[test]
    fn display_spans_are_taken_before_inline() {
        let extraction = extract_math("a $$x$$ b $y$ c", false);
        assert_eq!(literals(&extraction), ["$$x$$", "$y$"]);
        assert_eq!(
            extraction.text,
            format!("a {} b {} c", placeholder_token(0), placeholder_token(1))
        );
    }

    #[test]
    fn display_span_keeps_inner_single_dollar() {
        let extraction = extract_math("$$a $ b$$", false);
        assert_eq!(literals(&extraction), ["$$a $ b$$"]);
        assert_eq!(extraction.spans[0].delimiter, MathDelimiter::DisplayDollars);
    }

    #[test]
    fn display_spans_may_cross_lines() {
        let extraction = extract_math("$$\n\\sum_i x_i\n$$", false);
        assert_eq!(literals(&extraction), ["$$\n\\sum_i x_i\n$$"]);
    }

    #[test]
    fn inline_spans_reject_newlines_and_empty_bodies() {
        let extraction = extract_math("$a\nb$", false);
        assert!(extraction.spans.is_empty());
        assert_eq!(extraction.text, "$a\nb$");

        let extraction = extract_math("x $$ y", false);
        assert!(extraction.spans.is_empty());
    }

    #[test]
    fn unmatched_opener_is_skipped() {
        let extraction = extract_math("price $5 and $x$", false);
        assert_eq!(literals(&extraction), ["$5 and $"]);
    }

    #[test]
    fn latex_delimiters_are_optional() {
        let source = r"\[a\] and \(b\)";
        assert!(extract_math(source, false).spans.is_empty());

        let extraction = extract_math(source, true);
        assert_eq!(literals(&extraction), [r"\[a\]", r"\(b\)"]);
        assert_eq!(extraction.spans[1].delimiter, MathDelimiter::InlineParen);
    }

    #[test]
    fn inline_span_never_swallows_a_placeholder() {
        let extraction = extract_math("$a $$b$$ c$", false);
        assert_eq!(literals(&extraction), ["$$b$$"]);
    }

    #[test]
    fn source_sentinels_are_escaped_and_recovered() {
        let source = "$a$ \u{E000}0\u{E001} \u{E002}\u{E003}";
        let extraction = extract_math(source, false);
        assert_eq!(literals(&extraction), ["$a$"]);
        assert_eq!(extraction.text.matches(TOKEN_OPEN).count(), 5);
        assert!(!extraction.text.contains('\u{E002}'));

        let restored = extraction.text.replacen(&placeholder_token(0), "$a$", 1);
        assert_eq!(unescape_sentinels(&restored), source);
    }

    #[test]
    fn escaped_form_in_the_source_survives_a_round_trip() {
        let source = "\u{E000}s0\u{E001}";
        let escaped = escape_sentinels(source);
        assert_eq!(unescape_sentinels(&escaped), source);
    }

    #[test]
    fn text_without_sentinels_is_borrowed() {
        assert!(matches!(escape_sentinels("plain $x$"), Cow::Borrowed(_)));
        assert!(matches!(unescape_sentinels("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn ids_are_sequential_across_passes() {
        let extraction = extract_math("$1$ $$2$$ $3$", false);
        let ids: Vec<_> = extraction.spans.iter().map(|span| span.id).collect();
        assert_eq!(ids, [0, 1, 2]);
        assert_eq!(literals(&extraction), ["$$2$$", "$1$", "$3$"]);
    }
}
