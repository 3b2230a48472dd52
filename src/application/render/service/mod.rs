mod config;
mod direction;
mod enhance;
mod extract;
mod highlight;
mod math;
mod restore;

use std::{
    any::Any,
    collections::HashSet,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use once_cell::sync::Lazy;
use syntect::{dumps::from_uncompressed_data, html::ClassStyle, parsing::SyntaxSet};
use tracing::{debug, warn};

use crate::application::render::types::{
    MathDelimiter, RenderError, RenderRequest, RenderService, RenderedDocument,
};

pub use config::parser_options;
pub use direction::{
    CODE_DIRECTION_ATTRIBUTE, INLINE_CODE_DIRECTION_ATTRIBUTE, TEXT_DIRECTION_ATTRIBUTE,
    reapply_directions,
};
pub use enhance::WRAPPED_ATTRIBUTE;

use config::build_sanitizer;
use enhance::enhance_code_blocks;
use extract::{extract_math, unescape_sentinels};
use highlight::{HighlightOutcome, find_syntax, highlight_blocks};
use math::{TypesetOutcome, typeset_math};
use restore::{restore_placeholders, sweep_tokens};

/// Default Comrak-based rendering pipeline with KaTeX typesetting, Syntect
/// highlighting and Ammonia sanitisation.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakRenderService {
    /// Construct a new renderer with syntax highlighting configured to emit
    /// `syntax-` prefixed CSS classes.
    fn new() -> Self {
        let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
        let syntax_set: SyntaxSet =
            from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid");

        Self {
            options: parser_options(),
            syntax_set,
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
            sanitizer: build_sanitizer(),
        }
    }

    /// Whether a bare class name names a language the highlighter knows.
    pub fn recognises_language(&self, name: &str) -> bool {
        find_syntax(&self.syntax_set, name).is_some()
    }
}

static RENDER_SERVICE: Lazy<Arc<ComrakRenderService>> =
    Lazy::new(|| Arc::new(ComrakRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<ComrakRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for ComrakRenderService {
    fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        let options = &request.options;
        if request.markdown.is_empty() {
            return Ok(RenderedDocument::empty(options.text_direction));
        }

        let extraction = extract_math(&request.markdown, options.latex_delimiters);

        let arena = Arena::new();
        let root = catch_unwind(AssertUnwindSafe(|| {
            parse_document(&arena, &extraction.text, &self.options)
        }))
        .map_err(parser_panic)?;

        let mut restored = HashSet::new();
        restore_placeholders(root, &extraction.spans, &mut restored);
        let typeset = typeset_stage(root, MathDelimiter::active(options.latex_delimiters));
        let HighlightOutcome {
            blocks: code_blocks,
            failures: highlight_failures,
        } = highlight_blocks(root, &self.syntax_set, &self.class_style);

        let rendered_html = render_html_stage(root, &self.options)?;
        let rendered_html = sweep_tokens(rendered_html, &extraction.spans, &mut restored);
        let restored_spans = restored.len();

        let sanitized_html = if options.sanitize {
            sanitize_stage(rendered_html, &self.sanitizer)
        } else {
            rendered_html
        };
        let html = unescape_sentinels(&typeset.splice(sanitized_html)).into_owned();

        let (html, wrapped_blocks) = match enhance_code_blocks(&html, |name| {
            self.recognises_language(name)
        }) {
            Ok(enhanced) => (enhanced.html, enhanced.wrapped),
            Err(err) => {
                warn!(
                    target = "application::render::enhance",
                    "Code block enhancement failed: {err}"
                );
                (html, 0)
            }
        };

        let html = match reapply_directions(&html, options) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "application::render::direction",
                    "Direction reapplication failed: {err}"
                );
                html
            }
        };

        debug!(
            target = "application::render",
            math_spans = extraction.spans.len(),
            restored_spans,
            typeset = typeset.fragments.len(),
            code_blocks = code_blocks.len(),
            wrapped_blocks,
            "Render pass complete"
        );

        Ok(RenderedDocument {
            html,
            text_direction: options.text_direction,
            math_spans: extraction.spans,
            restored_spans,
            typeset_spans: typeset.fragments.len(),
            typeset_failures: typeset.failures,
            code_blocks,
            wrapped_blocks,
            highlight_failures,
        })
    }
}

fn typeset_stage<'a>(root: &'a AstNode<'a>, delimiters: &[MathDelimiter]) -> TypesetOutcome {
    typeset_math(root, delimiters)
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::Options<'static>,
) -> Result<String, RenderError> {
    let mut html = String::new();
    catch_unwind(AssertUnwindSafe(|| format_html(root, options, &mut html)))
        .map_err(parser_panic)?
        .map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;
    Ok(html)
}

fn sanitize_stage(html: String, sanitizer: &ammonia::Builder<'static>) -> String {
    sanitizer.clean(&html).to_string()
}

fn parser_panic(payload: Box<dyn Any + Send>) -> RenderError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "parser panicked".to_string());
    RenderError::Markdown { message }
}

/// Escape a value placed inside a double-quoted attribute or raw HTML.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
