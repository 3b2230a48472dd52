use std::borrow::Cow;

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use katex::{OptsBuilder, OutputType};
use tracing::warn;

use crate::application::render::types::{MathDelimiter, RenderError};

use super::extract::TOKEN_OPEN;

const FRAGMENT_OPEN: char = '\u{E002}';
const FRAGMENT_CLOSE: char = '\u{E003}';

/// Elements whose content is never scanned for math inside raw HTML.
const RAW_TEXT_TAGS: &[&str] = &["pre", "code", "script", "style", "textarea"];

/// Typeset HTML kept out of the sanitiser and spliced back afterwards.
#[derive(Debug, Default)]
pub(crate) struct TypesetOutcome {
    pub(crate) fragments: Vec<String>,
    pub(crate) failures: usize,
}

impl TypesetOutcome {
    fn push_fragment(&mut self, html: String) -> String {
        let placeholder = format!("{FRAGMENT_OPEN}{}{FRAGMENT_CLOSE}", self.fragments.len());
        self.fragments.push(html);
        placeholder
    }

    /// Replace fragment placeholders in `html` with the typeset markup.
    pub(crate) fn splice(&self, html: String) -> String {
        self.fragments
            .iter()
            .enumerate()
            .fold(html, |acc, (index, fragment)| {
                acc.replace(
                    &format!("{FRAGMENT_OPEN}{index}{FRAGMENT_CLOSE}"),
                    fragment,
                )
            })
    }
}

/// Render a KaTeX expression to HTML.
pub(crate) fn render_math_html(literal: &str, display_mode: bool) -> Result<String, RenderError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Html);

    let opts = builder.build().map_err(|err| RenderError::Typesetting {
        message: format!("failed to build KaTeX options: {err}"),
    })?;

    katex::render_with_opts(literal, opts).map_err(|err| RenderError::Typesetting {
        message: err.to_string(),
    })
}

/// Find delimited formulas in text nodes and raw HTML blocks and typeset
/// them.
///
/// Code and image descriptions are left alone.
pub(crate) fn typeset_math<'a>(
    root: &'a AstNode<'a>,
    delimiters: &[MathDelimiter],
) -> TypesetOutcome {
    let mut outcome = TypesetOutcome::default();
    visit(root, delimiters, &mut outcome);
    outcome
}

fn visit<'a>(node: &'a AstNode<'a>, delimiters: &[MathDelimiter], outcome: &mut TypesetOutcome) {
    let replacement = {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Image(_) | NodeValue::CodeBlock(_) => return,
            NodeValue::Text(text) => {
                typeset_run(text, delimiters, outcome, Markup::Text).map(NodeValue::HtmlInline)
            }
            NodeValue::HtmlBlock(block) => typeset_html_block(&block.literal, delimiters, outcome)
                .map(|literal| {
                    NodeValue::HtmlBlock(NodeHtmlBlock {
                        block_type: block.block_type,
                        literal,
                    })
                }),
            _ => None,
        }
    };

    if let Some(value) = replacement {
        node.data.borrow_mut().value = value;
        return;
    }

    let mut child = node.first_child();
    while let Some(next) = child {
        visit(next, delimiters, outcome);
        child = next.next_sibling();
    }
}

/// How the run being typeset reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Markup {
    /// Node text: plain runs are escaped, formulas are taken as written.
    Text,
    /// Raw HTML: plain runs are kept, formulas carry entity escapes.
    Html,
}

fn typeset_run(
    text: &str,
    delimiters: &[MathDelimiter],
    outcome: &mut TypesetOutcome,
    markup: Markup,
) -> Option<String> {
    let segments: Vec<Segment<'_>> = split_at_delimiters(text, delimiters)
        .into_iter()
        .map(|segment| match segment {
            // An escaped placeholder character is never part of a formula.
            Segment::Math { raw, .. } if raw.contains(TOKEN_OPEN) => Segment::Text(raw),
            segment => segment,
        })
        .collect();
    if !segments
        .iter()
        .any(|segment| matches!(segment, Segment::Math { .. }))
    {
        return None;
    }

    let verbatim = |plain: &str| match markup {
        Markup::Text => ammonia::clean_text(plain),
        Markup::Html => plain.to_string(),
    };

    let mut html = String::with_capacity(text.len());
    for segment in segments {
        match segment {
            Segment::Text(plain) => html.push_str(&verbatim(plain)),
            Segment::Math {
                tex,
                raw,
                delimiter,
            } => {
                let tex = match markup {
                    Markup::Text => Cow::Borrowed(tex),
                    Markup::Html => decode_entities(tex),
                };
                match render_math_html(&tex, delimiter.is_display()) {
                    Ok(rendered) => {
                        let container = if delimiter.is_display() {
                            format!(
                                "<span data-role=\"math-block\" data-math-style=\"display\">{rendered}</span>"
                            )
                        } else {
                            format!(
                                "<span data-role=\"math-inline\" data-math-style=\"inline\">{rendered}</span>"
                            )
                        };
                        html.push_str(&outcome.push_fragment(container));
                    }
                    Err(err) => {
                        warn!(
                            target = "application::render::math",
                            formula = raw,
                            "KaTeX rendering failed: {err}"
                        );
                        outcome.failures += 1;
                        html.push_str(&verbatim(raw));
                    }
                }
            }
        }
    }

    Some(html)
}

/// Typeset the text between tags of a raw HTML block. `None` when nothing
/// was typeset.
fn typeset_html_block(
    html: &str,
    delimiters: &[MathDelimiter],
    outcome: &mut TypesetOutcome,
) -> Option<String> {
    let mut output = String::with_capacity(html.len());
    let mut changed = false;
    let mut raw_text_depth = 0usize;
    let mut rest = html;

    while !rest.is_empty() {
        let (text, tail) = rest.split_at(next_markup(rest).unwrap_or(rest.len()));
        if !text.is_empty() {
            let typeset = if raw_text_depth == 0 {
                typeset_run(text, delimiters, outcome, Markup::Html)
            } else {
                None
            };
            match typeset {
                Some(typeset) => {
                    output.push_str(&typeset);
                    changed = true;
                }
                None => output.push_str(text),
            }
        }
        if tail.is_empty() {
            break;
        }

        let (markup, after) = tail.split_at(markup_len(tail));
        raw_text_depth = track_raw_text(markup, raw_text_depth);
        output.push_str(markup);
        rest = after;
    }

    changed.then_some(output)
}

/// Offset of the next `<` that opens a tag, comment or declaration.
fn next_markup(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    text.match_indices('<').map(|(index, _)| index).find(|index| {
        bytes
            .get(index + 1)
            .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?'))
    })
}

/// Length of the markup starting at `tail[0] == '<'`, quotes respected.
fn markup_len(tail: &str) -> usize {
    if tail.starts_with("<!--") {
        return tail[4..]
            .find("-->")
            .map_or(tail.len(), |end| 4 + end + 3);
    }

    let mut quote = None;
    for (index, byte) in tail.bytes().enumerate().skip(1) {
        match (quote, byte) {
            (Some(open), _) if byte == open => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(byte),
            (None, b'>') => return index + 1,
            (None, _) => {}
        }
    }
    tail.len()
}

fn track_raw_text(markup: &str, depth: usize) -> usize {
    let Some(inner) = markup.strip_prefix('<') else {
        return depth;
    };
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(inner) => (true, inner),
        None => (false, inner),
    };
    let name = inner
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !RAW_TEXT_TAGS.contains(&name.as_str()) {
        return depth;
    }

    if closing {
        depth.saturating_sub(1)
    } else if markup.trim_end_matches('>').ends_with('/') {
        depth
    } else {
        depth + 1
    }
}

fn decode_entities(tex: &str) -> Cow<'_, str> {
    if !tex.contains('&') {
        return Cow::Borrowed(tex);
    }
    Cow::Owned(
        tex.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'t> {
    Text(&'t str),
    Math {
        /// Formula handed to KaTeX.
        tex: &'t str,
        /// Formula with its delimiters.
        raw: &'t str,
        delimiter: MathDelimiter,
    },
}

fn split_at_delimiters<'t>(text: &'t str, delimiters: &[MathDelimiter]) -> Vec<Segment<'t>> {
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        let Some((start, delimiter)) = find_left_delimiter(rest, delimiters) else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
            rest = &rest[start..];
        }

        let open = delimiter.open().len();
        let Some(end) = find_end_of_math(rest, delimiter.close(), open) else {
            break;
        };

        let raw = &rest[..end + delimiter.close().len()];
        let tex = if raw.contains("\\begin{") {
            raw
        } else {
            &rest[open..end]
        };
        segments.push(Segment::Math {
            tex,
            raw,
            delimiter,
        });
        rest = &rest[raw.len()..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Earliest left delimiter; at equal offsets the first entry of
/// `delimiters` wins.
fn find_left_delimiter(text: &str, delimiters: &[MathDelimiter]) -> Option<(usize, MathDelimiter)> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find_map(|index| {
        delimiters
            .iter()
            .find(|delimiter| bytes[index..].starts_with(delimiter.open().as_bytes()))
            .map(|delimiter| (index, *delimiter))
    })
}

/// Offset of the closing delimiter outside any brace group, skipping
/// backslash escapes.
fn find_end_of_math(text: &str, close: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let close = close.as_bytes();
    let mut index = start;
    let mut brace_level: i32 = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if brace_level <= 0 && bytes[index..].starts_with(close) {
            return Some(index);
        } else if byte == b'\\' {
            index += 1;
        } else if byte == b'{' {
            brace_level += 1;
        } else if byte == b'}' {
            brace_level -= 1;
        }
        index += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::service::config::parser_options;
    use crate::application::render::service::extract::extract_math;
    use crate::application::render::service::restore::restore_placeholders;
    use comrak::{Arena, format_html, parse_document};
    use std::collections::HashSet;

    const DOLLARS: &[MathDelimiter] = &[MathDelimiter::DisplayDollars, MathDelimiter::InlineDollar];

    #[test]
    fn splits_display_before_inline() {
        let segments = split_at_delimiters("a $$x$$ b $y$", DOLLARS);
        assert_eq!(
            segments,
            vec![
                Segment::Text("a "),
                Segment::Math {
                    tex: "x",
                    raw: "$$x$$",
                    delimiter: MathDelimiter::DisplayDollars
                },
                Segment::Text(" b "),
                Segment::Math {
                    tex: "y",
                    raw: "$y$",
                    delimiter: MathDelimiter::InlineDollar
                },
            ]
        );
    }

    #[test]
    fn unbalanced_braces_leave_text_untouched() {
        let segments = split_at_delimiters(r"$\frac{1$", DOLLARS);
        assert_eq!(segments, vec![Segment::Text(r"$\frac{1$")]);
    }

    #[test]
    fn escaped_close_is_skipped() {
        let segments = split_at_delimiters(r"$a\$b$", DOLLARS);
        assert!(matches!(segments[0], Segment::Math { tex: r"a\$b", .. }));
    }

    #[test]
    fn environments_keep_their_delimiters() {
        let tex = r"$$\begin{matrix}a\end{matrix}$$";
        let segments = split_at_delimiters(tex, DOLLARS);
        assert!(matches!(segments[0], Segment::Math { tex: t, .. } if t == tex));
    }

    fn typeset_source(source: &str) -> (String, TypesetOutcome) {
        let options = parser_options();
        let extraction = extract_math(source, false);
        let arena = Arena::new();
        let root = parse_document(&arena, &extraction.text, &options);
        restore_placeholders(root, &extraction.spans, &mut HashSet::new());

        let outcome = typeset_math(root, DOLLARS);
        let mut html = String::new();
        format_html(root, &options, &mut html).expect("html");
        (outcome.splice(html), outcome)
    }

    #[test]
    fn typesets_text_nodes_and_skips_code() {
        let (html, outcome) = typeset_source("Area $a^2$ and `$b$`");
        assert_eq!(outcome.fragments.len(), 1);
        assert_eq!(outcome.failures, 0);
        assert!(html.contains("data-role=\"math-inline\""));
        assert!(html.contains("class=\"katex"));
        assert!(html.contains("<code>$b$</code>"));
    }

    #[test]
    fn invalid_formula_stays_literal() {
        let (html, outcome) = typeset_source(r"bad $\frac{1}$ here");
        assert!(outcome.fragments.is_empty());
        assert_eq!(outcome.failures, 1);
        assert!(html.contains(r"$\frac{1}$"));
        assert!(html.contains("bad"));
        assert!(html.contains("here"));
    }

    #[test]
    fn typesets_text_between_tags_of_an_html_block() {
        let (html, outcome) = typeset_source("<div>\n$x^2$\n</div>\n");
        assert_eq!(outcome.fragments.len(), 1);
        assert!(html.starts_with("<div>\n<span data-role=\"math-inline\""));
        assert!(html.ends_with("</span>\n</div>\n"));
    }

    #[test]
    fn raw_text_elements_in_html_blocks_are_skipped() {
        let (html, outcome) = typeset_source("<pre>$x$</pre>\n");
        assert!(outcome.fragments.is_empty());
        assert_eq!(html, "<pre>$x$</pre>\n");

        let (_, outcome) = typeset_source("<div><code>$x$</code> $y$</div>\n");
        assert_eq!(outcome.fragments.len(), 1);
    }

    #[test]
    fn html_block_formula_sees_decoded_entities() {
        let (html, outcome) = typeset_source("<div>$a<b$</div>\n");
        assert_eq!(outcome.fragments.len(), 1);
        assert_eq!(outcome.failures, 0);
        assert!(!html.contains("&lt;b"));
    }

    #[test]
    fn markup_scanner_respects_quotes_and_comments() {
        assert_eq!(markup_len("<a title=\"x>y\">"), 15);
        assert_eq!(markup_len("<!-- $x$ -->tail"), 12);
        assert_eq!(next_markup("1 < 2 <b>"), Some(6));
        assert_eq!(track_raw_text("<PRE class=\"x\">", 0), 1);
        assert_eq!(track_raw_text("</pre>", 1), 0);
        assert_eq!(track_raw_text("<code/>", 0), 0);
    }
}
