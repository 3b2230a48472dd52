//! Toolbar text surgery: wrap the current selection in Markdown syntax or
//! insert a placeholder that is immediately re-selected for replacement.
//!
//! Offsets are byte offsets into the buffer and must fall on `char`
//! boundaries.

use std::{ops::Range, str::FromStr};

use thiserror::Error;

const CODE_PLACEHOLDER: &str = "Your code here";
const LIST_PLACEHOLDER: &str = "List item";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolbarError {
    #[error("selection {start}..{end} is not valid for a buffer of {len} bytes")]
    InvalidSelection { start: usize, end: usize, len: usize },
    #[error("heading level {0} is outside 1..=6")]
    InvalidHeadingLevel(u8),
    #[error("a destination URL is required")]
    MissingUrl,
    #[error("unknown toolbar action `{0}`")]
    UnknownAction(String),
}

/// Markdown construct to apply at the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    Bold,
    Italic,
    Strikethrough,
    InlineCode,
    Link { url: String },
    CodeBlock { language: String },
    Image { alt: String, url: String },
    Heading(u8),
    UnorderedList,
    OrderedList,
    Blockquote,
    HorizontalRule,
}

/// New buffer contents plus the selection to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub text: String,
    pub selection: Range<usize>,
}

impl TextEdit {
    fn caret(text: String, at: usize) -> Self {
        Self {
            text,
            selection: at..at,
        }
    }

    /// The currently selected slice of the edited text.
    pub fn selected(&self) -> &str {
        &self.text[self.selection.clone()]
    }
}

struct Selection<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl<'a> Selection<'a> {
    fn new(text: &'a str, range: Range<usize>) -> Result<Self, ToolbarError> {
        let Range { start, end } = range;
        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            return Err(ToolbarError::InvalidSelection {
                start,
                end,
                len: text.len(),
            });
        }
        Ok(Self { text, start, end })
    }

    fn before(&self) -> &'a str {
        &self.text[..self.start]
    }

    fn selected(&self) -> &'a str {
        &self.text[self.start..self.end]
    }

    fn after(&self) -> &'a str {
        &self.text[self.end..]
    }

    fn line_start(&self) -> usize {
        self.before().rfind('\n').map_or(0, |idx| idx + 1)
    }
}

/// Apply `kind` to `text` at `selection`.
pub fn apply(
    text: &str,
    selection: Range<usize>,
    kind: &SyntaxKind,
) -> Result<TextEdit, ToolbarError> {
    let selection = Selection::new(text, selection)?;

    let edit = match kind {
        SyntaxKind::Bold => wrap(&selection, "**", "**", "bold text"),
        SyntaxKind::Italic => wrap(&selection, "*", "*", "italic text"),
        SyntaxKind::Strikethrough => wrap(&selection, "~~", "~~", "strikethrough"),
        SyntaxKind::InlineCode => wrap(&selection, "`", "`", "code"),
        SyntaxKind::Link { url } => {
            let url = url.trim();
            if url.is_empty() {
                return Err(ToolbarError::MissingUrl);
            }
            wrap(&selection, "[", &format!("]({url})"), "link text")
        }
        SyntaxKind::CodeBlock { language } => code_block(&selection, language.trim()),
        SyntaxKind::Image { alt, url } => {
            let url = url.trim();
            if url.is_empty() {
                return Err(ToolbarError::MissingUrl);
            }
            image(&selection, alt, url)
        }
        SyntaxKind::Heading(level) => {
            if !(1..=6).contains(level) {
                return Err(ToolbarError::InvalidHeadingLevel(*level));
            }
            let prefix = format!("{} ", "#".repeat(usize::from(*level)));
            prefix_lines(&selection, &prefix, &format!("Heading {level}"))
        }
        SyntaxKind::UnorderedList => prefix_lines(&selection, "- ", LIST_PLACEHOLDER),
        SyntaxKind::OrderedList => ordered_list(&selection),
        SyntaxKind::Blockquote => prefix_lines(&selection, "> ", "Blockquote"),
        SyntaxKind::HorizontalRule => horizontal_rule(&selection),
    };

    Ok(edit)
}

fn wrap(selection: &Selection<'_>, open: &str, close: &str, placeholder: &str) -> TextEdit {
    let selected = selection.selected();
    if selected.is_empty() {
        let text = format!(
            "{}{open}{placeholder}{close}{}",
            selection.before(),
            selection.after()
        );
        let from = selection.start + open.len();
        return TextEdit {
            text,
            selection: from..from + placeholder.len(),
        };
    }

    let text = format!(
        "{}{open}{selected}{close}{}",
        selection.before(),
        selection.after()
    );
    let caret = selection.start + open.len() + selected.len() + close.len();
    TextEdit::caret(text, caret)
}

fn prefix_lines(selection: &Selection<'_>, prefix: &str, placeholder: &str) -> TextEdit {
    let line_start = selection.line_start();
    let head = &selection.text[..line_start];
    let selected = selection.selected();

    if selected.contains('\n') {
        let region = &selection.text[line_start..selection.end];
        let lines: Vec<&str> = region.split('\n').collect();
        let prefixed = lines
            .iter()
            .map(|line| format!("{prefix}{line}"))
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!("{head}{prefixed}{}", selection.after());
        let end = selection.end + lines.len() * prefix.len();
        return TextEdit {
            text,
            selection: line_start + prefix.len()..end,
        };
    }

    let tail = &selection.text[line_start..];
    if selected.is_empty() {
        let text = format!("{head}{prefix}{placeholder}{tail}");
        let from = line_start + prefix.len();
        return TextEdit {
            text,
            selection: from..from + placeholder.len(),
        };
    }

    let text = format!("{head}{prefix}{tail}");
    TextEdit {
        text,
        selection: selection.start + prefix.len()..selection.end + prefix.len(),
    }
}

fn ordered_list(selection: &Selection<'_>) -> TextEdit {
    if !selection.selected().contains('\n') {
        return prefix_lines(selection, "1. ", LIST_PLACEHOLDER);
    }

    let line_start = selection.line_start();
    let region = &selection.text[line_start..selection.end];
    let mut added = 0;
    let numbered = region
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            let prefix = format!("{}. ", index + 1);
            added += prefix.len();
            format!("{prefix}{line}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let text = format!(
        "{}{numbered}{}",
        &selection.text[..line_start],
        selection.after()
    );
    TextEdit {
        text,
        selection: line_start + "1. ".len()..selection.end + added,
    }
}

fn code_block(selection: &Selection<'_>, language: &str) -> TextEdit {
    let before = selection.before();
    let open = if before.is_empty() || before.ends_with('\n') {
        format!("```{language}\n")
    } else {
        format!("\n```{language}\n")
    };
    let close = if selection.after().starts_with('\n') {
        "\n```"
    } else {
        "\n```\n"
    };
    wrap(selection, &open, close, CODE_PLACEHOLDER)
}

fn image(selection: &Selection<'_>, alt: &str, url: &str) -> TextEdit {
    let before = selection.before();
    let after = selection.after();
    let prefix = if !before.is_empty() && !before.ends_with('\n') {
        "\n"
    } else {
        ""
    };
    let suffix = if !after.is_empty() && !after.starts_with('\n') {
        "\n"
    } else {
        ""
    };
    let markdown = format!("![{alt}]({url})");
    let caret = selection.start + prefix.len() + markdown.len();
    TextEdit::caret(format!("{before}{prefix}{markdown}{suffix}{after}"), caret)
}

fn horizontal_rule(selection: &Selection<'_>) -> TextEdit {
    let before = selection.before();
    let prefix = if before.is_empty() || before.ends_with("\n\n") {
        ""
    } else if before.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };
    let rule = "---\n";
    let caret = selection.start + prefix.len() + rule.len();
    TextEdit::caret(
        format!("{before}{prefix}{rule}{}", selection.after()),
        caret,
    )
}

/// Toolbar buttons, addressed by their `data-syntax` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarButton {
    Bold,
    Italic,
    Strikethrough,
    InlineCode,
    Link,
    CodeBlock,
    Image,
    Heading1,
    Heading2,
    Heading3,
    UnorderedList,
    OrderedList,
    Blockquote,
    HorizontalRule,
}

/// Answers collected from the user before a button can produce an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInput {
    pub url: Option<String>,
    pub alt: Option<String>,
    pub language: Option<String>,
}

impl ToolbarButton {
    /// Ctrl/Cmd keyboard shortcut mapping.
    pub fn shortcut(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'b' => Some(ToolbarButton::Bold),
            'i' => Some(ToolbarButton::Italic),
            'k' => Some(ToolbarButton::Link),
            _ => None,
        }
    }

    pub fn needs_prompt(self) -> bool {
        matches!(
            self,
            ToolbarButton::Link | ToolbarButton::CodeBlock | ToolbarButton::Image
        )
    }

    /// Resolve the button into an edit kind. `None` means the user cancelled a
    /// required prompt.
    pub fn into_kind(self, input: PromptInput) -> Option<SyntaxKind> {
        let kind = match self {
            ToolbarButton::Bold => SyntaxKind::Bold,
            ToolbarButton::Italic => SyntaxKind::Italic,
            ToolbarButton::Strikethrough => SyntaxKind::Strikethrough,
            ToolbarButton::InlineCode => SyntaxKind::InlineCode,
            ToolbarButton::Link => {
                let url = input.url.filter(|url| !url.trim().is_empty())?;
                SyntaxKind::Link { url }
            }
            ToolbarButton::CodeBlock => SyntaxKind::CodeBlock {
                language: input.language.unwrap_or_default(),
            },
            ToolbarButton::Image => {
                let alt = input.alt?;
                let url = input.url.filter(|url| !url.trim().is_empty())?;
                SyntaxKind::Image { alt, url }
            }
            ToolbarButton::Heading1 => SyntaxKind::Heading(1),
            ToolbarButton::Heading2 => SyntaxKind::Heading(2),
            ToolbarButton::Heading3 => SyntaxKind::Heading(3),
            ToolbarButton::UnorderedList => SyntaxKind::UnorderedList,
            ToolbarButton::OrderedList => SyntaxKind::OrderedList,
            ToolbarButton::Blockquote => SyntaxKind::Blockquote,
            ToolbarButton::HorizontalRule => SyntaxKind::HorizontalRule,
        };
        Some(kind)
    }
}

impl FromStr for ToolbarButton {
    type Err = ToolbarError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let button = match value {
            "bold" => ToolbarButton::Bold,
            "italic" => ToolbarButton::Italic,
            "strikethrough" => ToolbarButton::Strikethrough,
            "inline-code" => ToolbarButton::InlineCode,
            "link" => ToolbarButton::Link,
            "code-block" => ToolbarButton::CodeBlock,
            "image" => ToolbarButton::Image,
            "h1" => ToolbarButton::Heading1,
            "h2" => ToolbarButton::Heading2,
            "h3" => ToolbarButton::Heading3,
            "ul-list" => ToolbarButton::UnorderedList,
            "ol-list" => ToolbarButton::OrderedList,
            "blockquote" => ToolbarButton::Blockquote,
            "hr" => ToolbarButton::HorizontalRule,
            other => return Err(ToolbarError::UnknownAction(other.to_string())),
        };
        Ok(button)
    }
}
