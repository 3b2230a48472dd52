use std::collections::HashSet;

use comrak::nodes::{AstNode, NodeValue};

use crate::application::render::types::MathSpan;

use super::escape_attribute;
use super::extract::{TOKEN_CLOSE, TOKEN_OPEN};

/// Where a restored literal lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insert {
    /// Node text that comrak escapes when it serialises the tree.
    IntoText,
    /// Markup emitted verbatim, so the literal is escaped first.
    IntoHtml,
}

/// Put every math span back into the parsed tree, matching tokens by id.
///
/// Ids of restored spans are collected into `restored`, so a span reached
/// twice (a reference definition shared by several links) counts once.
/// Tokens carrying an unknown id are dropped.
pub(crate) fn restore_placeholders<'a>(
    root: &'a AstNode<'a>,
    spans: &[MathSpan],
    restored: &mut HashSet<usize>,
) {
    for node in root.descendants() {
        let mut data = node.data.borrow_mut();
        match &mut data.value {
            NodeValue::Text(text) => {
                if let Some(replaced) = replace_tokens(text, spans, Insert::IntoText, restored) {
                    *text = replaced.into();
                }
            }
            NodeValue::Code(code) => {
                if let Some(replaced) =
                    replace_tokens(&code.literal, spans, Insert::IntoText, restored)
                {
                    code.literal = replaced;
                }
            }
            NodeValue::CodeBlock(block) => {
                if let Some(replaced) =
                    replace_tokens(&block.literal, spans, Insert::IntoText, restored)
                {
                    block.literal = replaced;
                }
            }
            NodeValue::HtmlInline(html) => {
                if let Some(replaced) = replace_tokens(html, spans, Insert::IntoHtml, restored) {
                    *html = replaced;
                }
            }
            NodeValue::HtmlBlock(block) => {
                if let Some(replaced) =
                    replace_tokens(&block.literal, spans, Insert::IntoHtml, restored)
                {
                    block.literal = replaced;
                }
            }
            NodeValue::Link(link) | NodeValue::Image(link) => {
                if let Some(replaced) = replace_tokens(&link.url, spans, Insert::IntoText, restored)
                {
                    link.url = replaced;
                }
                if let Some(replaced) =
                    replace_tokens(&link.title, spans, Insert::IntoText, restored)
                {
                    link.title = replaced;
                }
            }
            _ => {}
        }
    }
}

/// Replace tokens that survived into serialised HTML with their escaped
/// literal.
pub(crate) fn sweep_tokens(
    html: String,
    spans: &[MathSpan],
    restored: &mut HashSet<usize>,
) -> String {
    replace_tokens(&html, spans, Insert::IntoHtml, restored).unwrap_or(html)
}

/// `None` when `input` holds no token at all. Escaped source sentinels are
/// not tokens and pass through unchanged.
fn replace_tokens(
    input: &str,
    spans: &[MathSpan],
    insert: Insert,
    restored: &mut HashSet<usize>,
) -> Option<String> {
    if !input.contains(TOKEN_OPEN) {
        return None;
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find(TOKEN_OPEN) {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + TOKEN_OPEN.len_utf8()..];

        let Some(close) = after_open.find(TOKEN_CLOSE) else {
            output.push(TOKEN_OPEN);
            rest = after_open;
            continue;
        };

        let digits = &after_open[..close];
        match digits.parse::<usize>() {
            Ok(id) => {
                if let Some(span) = spans.get(id) {
                    match insert {
                        Insert::IntoText => output.push_str(&span.literal),
                        Insert::IntoHtml => output.push_str(&escape_attribute(&span.literal)),
                    }
                    restored.insert(id);
                }
                rest = &after_open[close + TOKEN_CLOSE.len_utf8()..];
            }
            Err(_) => {
                output.push(TOKEN_OPEN);
                rest = after_open;
            }
        }
    }

    output.push_str(rest);
    Some(output)
}
