use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::warn;

use crate::application::render::types::{CodeBlockSummary, RenderError};

use super::escape_attribute;
use super::extract::{escape_sentinels, unescape_sentinels};

#[derive(Debug, Default)]
pub(crate) struct HighlightOutcome {
    pub(crate) blocks: Vec<CodeBlockSummary>,
    pub(crate) failures: usize,
}

/// Replace every code block with highlighted markup, once per block.
///
/// Escaped placeholder characters are decoded before highlighting and
/// escaped again in the markup, so a highlighter never splits one apart.
pub(crate) fn highlight_blocks<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> HighlightOutcome {
    let mut outcome = HighlightOutcome::default();

    for node in root.descendants() {
        let Some((info, literal)) = extract_code_block(node) else {
            continue;
        };
        let literal = unescape_sentinels(&literal).into_owned();
        let language = info.split_whitespace().next().map(str::to_ascii_lowercase);

        let html = match highlight_code(language.as_deref(), &literal, syntax_set, class_style) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "application::render::highlight",
                    language = language.as_deref().unwrap_or("auto"),
                    "Syntax highlighting failed: {err}"
                );
                outcome.failures += 1;
                build_plain_code_block(language.as_deref(), &literal)
            }
        };

        outcome.blocks.push(CodeBlockSummary {
            language,
            text: literal,
        });

        let mut data = node.data.borrow_mut();
        data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: escape_sentinels(&html).into_owned(),
        });
    }

    outcome
}

pub(crate) fn highlight_code(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<String, RenderError> {
    let (syntax, label) = match language {
        Some(token) => (
            find_syntax(syntax_set, token).unwrap_or_else(|| syntax_set.find_syntax_plain_text()),
            Some(token.to_string()),
        ),
        None => match detect_syntax(syntax_set, code) {
            Some(syntax) => (syntax, Some(syntax_label(syntax))),
            None => (syntax_set.find_syntax_plain_text(), None),
        },
    };

    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);

    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlighting {
                language: label.clone().unwrap_or_else(|| syntax.name.clone()),
                message: err.to_string(),
            })?;
    }

    let highlighted = generator.finalize();

    let html = match label {
        Some(label) => {
            let label = escape_attribute(&label);
            format!(
                "<pre class=\"syntax-highlight syntax-lang-{label}\" data-language=\"{label}\"><code class=\"language-{label} syntax-code\">{highlighted}</code></pre>"
            )
        }
        None => format!(
            "<pre class=\"syntax-highlight\"><code class=\"syntax-code\">{highlighted}</code></pre>"
        ),
    };
    Ok(html)
}

/// Resolve a language token by syntect token, then name, then extension.
pub(crate) fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(&lowercase))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

fn detect_syntax<'a>(syntax_set: &'a SyntaxSet, code: &str) -> Option<&'a SyntaxReference> {
    let first_line = code.lines().next()?;
    syntax_set
        .find_syntax_by_first_line(first_line)
        .filter(|syntax| syntax.name != syntax_set.find_syntax_plain_text().name)
}

fn syntax_label(syntax: &SyntaxReference) -> String {
    let name = syntax.name.to_ascii_lowercase();
    if name.chars().all(|ch| ch.is_ascii_alphanumeric() || "+#-".contains(ch)) {
        return name;
    }
    syntax
        .file_extensions
        .first()
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or(name.replace(' ', "-"))
}

fn build_plain_code_block(language: Option<&str>, literal: &str) -> String {
    let escaped_code = ammonia::clean_text(literal);
    let mut html = String::from("<pre class=\"syntax-highlight highlight-error\"");
    if let Some(language) = language.filter(|language| !language.is_empty()) {
        html.push_str(" data-language=\"");
        html.push_str(&escape_attribute(language));
        html.push('"');
    }
    html.push_str("><code>");
    html.push_str(&escaped_code);
    if !literal.ends_with('\n') {
        html.push('\n');
    }
    html.push_str("</code></pre>");
    html
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        let info = block.info.trim().to_string();
        let literal = block.literal.clone();
        Some((info, literal))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::service::config::parser_options;
    use comrak::{Arena, format_html, parse_document};

    fn syntax_and_style() -> (SyntaxSet, ClassStyle) {
        (
            SyntaxSet::load_defaults_newlines(),
            ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        )
    }

    #[test]
    fn labelled_block_gets_language_classes() {
        let (syntax_set, class_style) = syntax_and_style();
        let html =
            highlight_code(Some("python"), "print(1)", &syntax_set, &class_style).expect("html");
        assert!(html.starts_with(
            "<pre class=\"syntax-highlight syntax-lang-python\" data-language=\"python\">"
        ));
        assert!(html.contains("<code class=\"language-python syntax-code\">"));
        assert!(html.contains("syntax-"));
    }

    #[test]
    fn unknown_language_keeps_its_label() {
        let (syntax_set, class_style) = syntax_and_style();
        let html =
            highlight_code(Some("mermaid"), "graph TD;", &syntax_set, &class_style).expect("html");
        assert!(html.contains("language-mermaid"));
    }

    #[test]
    fn plain_block_without_hint_has_no_language_class() {
        let (syntax_set, class_style) = syntax_and_style();
        let html = highlight_code(None, "just words", &syntax_set, &class_style).expect("html");
        assert!(html.contains("<code class=\"syntax-code\">"));
        assert!(!html.contains("language-"));
    }

    #[test]
    fn shebang_line_selects_a_syntax() {
        let (syntax_set, class_style) = syntax_and_style();
        let html = highlight_code(None, "#!/usr/bin/env python\nprint(1)\n", &syntax_set, &class_style)
            .expect("html");
        assert!(html.contains("language-python"));
    }

    #[test]
    fn walker_replaces_blocks_and_records_text() {
        let options = parser_options();
        let arena = Arena::new();
        let root = parse_document(&arena, "```rust\nfn main() {}\n```\n\n    indented\n", &options);
        let (syntax_set, class_style) = syntax_and_style();

        let outcome = highlight_blocks(root, &syntax_set, &class_style);
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.blocks.len(), 2);
        assert_eq!(outcome.blocks[0].language.as_deref(), Some("rust"));
        assert_eq!(outcome.blocks[0].text, "fn main() {}\n");
        assert_eq!(outcome.blocks[1].language, None);

        let mut html = String::new();
        format_html(root, &options, &mut html).expect("html");
        assert_eq!(html.matches("<pre class=\"syntax-highlight").count(), 2);
    }

    #[test]
    fn fallback_block_is_flagged_and_escaped() {
        let html = build_plain_code_block(Some("c"), "a < b");
        assert_eq!(
            html,
            "<pre class=\"syntax-highlight highlight-error\" data-language=\"c\"><code>a&#32;&lt;&#32;b\n</code></pre>"
        );
    }
}
