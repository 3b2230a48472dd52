use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RenderSettings;
use crate::domain::presentation::{Direction, PresentationState};

/// Markup shown in place of the document when a render pass fails.
pub const RENDER_ERROR_PANEL: &str = "<div class=\"alert alert-danger\">Error rendering content. Please check your Markdown and console for details.</div>";

/// Read-only presentation inputs for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub text_direction: Direction,
    pub inline_code_direction: Direction,
    pub code_direction: Direction,
    /// Also recognise `\[ \]` and `\( \)` math delimiters.
    pub latex_delimiters: bool,
    pub sanitize: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            text_direction: Direction::Ltr,
            inline_code_direction: Direction::Ltr,
            code_direction: Direction::Ltr,
            latex_delimiters: true,
            sanitize: true,
        }
    }
}

impl RenderOptions {
    pub fn with_render_settings(mut self, settings: &RenderSettings) -> Self {
        self.latex_delimiters = settings.latex_delimiters;
        self.sanitize = settings.sanitize;
        self
    }
}

impl From<&PresentationState> for RenderOptions {
    fn from(state: &PresentationState) -> Self {
        Self {
            text_direction: state.text_direction,
            inline_code_direction: state.inline_code_direction,
            code_direction: state.code_direction,
            ..Self::default()
        }
    }
}

/// Rendering request passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Source markdown captured from the editor.
    pub markdown: String,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

/// Delimiter pair that introduced a math span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathDelimiter {
    /// `$$ ... $$`
    DisplayDollars,
    /// `\[ ... \]`
    DisplayBracket,
    /// `$ ... $`
    InlineDollar,
    /// `\( ... \)`
    InlineParen,
}

impl MathDelimiter {
    pub fn open(self) -> &'static str {
        match self {
            MathDelimiter::DisplayDollars => "$$",
            MathDelimiter::DisplayBracket => "\\[",
            MathDelimiter::InlineDollar => "$",
            MathDelimiter::InlineParen => "\\(",
        }
    }

    pub fn close(self) -> &'static str {
        match self {
            MathDelimiter::DisplayDollars => "$$",
            MathDelimiter::DisplayBracket => "\\]",
            MathDelimiter::InlineDollar => "$",
            MathDelimiter::InlineParen => "\\)",
        }
    }

    pub fn is_display(self) -> bool {
        matches!(
            self,
            MathDelimiter::DisplayDollars | MathDelimiter::DisplayBracket
        )
    }

    /// Delimiters active for a pass, in matching priority order.
    pub fn active(latex_delimiters: bool) -> &'static [MathDelimiter] {
        const DOLLARS: &[MathDelimiter] = &[MathDelimiter::DisplayDollars, MathDelimiter::InlineDollar];
        const ALL: &[MathDelimiter] = &[
            MathDelimiter::DisplayDollars,
            MathDelimiter::InlineDollar,
            MathDelimiter::InlineParen,
            MathDelimiter::DisplayBracket,
        ];
        if latex_delimiters { ALL } else { DOLLARS }
    }
}

/// Formula substring pulled out of the source before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathSpan {
    pub id: usize,
    /// Original text, delimiters included.
    pub literal: String,
    pub delimiter: MathDelimiter,
}

/// Plain text of a rendered code block, as offered by its copy control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockSummary {
    pub language: Option<String>,
    pub text: String,
}

/// Output of one render pass. Rebuilt from scratch on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Final HTML fragment for the output panel.
    pub html: String,
    pub text_direction: Direction,
    /// Spans extracted before parsing, in id order.
    pub math_spans: Vec<MathSpan>,
    /// Placeholders replaced by their literal span.
    pub restored_spans: usize,
    /// Formulas typeset successfully.
    pub typeset_spans: usize,
    /// Formulas left as literal text after a typesetting error.
    pub typeset_failures: usize,
    pub code_blocks: Vec<CodeBlockSummary>,
    /// Wrappers added by this pass.
    pub wrapped_blocks: usize,
    pub highlight_failures: usize,
}

impl RenderedDocument {
    pub fn empty(text_direction: Direction) -> Self {
        Self {
            html: String::new(),
            text_direction,
            math_spans: Vec::new(),
            restored_spans: 0,
            typeset_spans: 0,
            typeset_failures: 0,
            code_blocks: Vec::new(),
            wrapped_blocks: 0,
            highlight_failures: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// The fragment wrapped in the output container carrying the prose direction.
    pub fn container_html(&self) -> String {
        format!(
            "<div class=\"markdown-output\" data-text-direction=\"{}\">{}</div>",
            self.text_direction, self.html
        )
    }

    /// Text offered by the copy control of the `index`-th code block.
    pub fn code_text(&self, index: usize) -> Option<&str> {
        self.code_blocks.get(index).map(|block| block.text.as_str())
    }
}

/// Structured errors surfaced by the rendering pipeline.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown parsing failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("math typesetting failed: {message}")]
    Typesetting { message: String },
    #[error("document processing failed: {message}")]
    Document { message: String },
}

impl RenderError {
    /// Replacement panel for the whole output area.
    pub fn panel_html(&self) -> &'static str {
        RENDER_ERROR_PANEL
    }
}

/// Trait exposed by the rendering pipeline. Implementations must be pure and
/// deterministic: given the same input, they return identical outputs or errors.
pub trait RenderService: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError>;
}
