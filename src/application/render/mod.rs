//! Rendering pipeline: Markdown source in, display-ready HTML out.
//!
//! The pipeline is pure: it accepts markdown plus presentation options,
//! produces deterministic HTML, and surfaces structured errors. Presentation
//! state lives with the caller and is passed in as [`RenderOptions`].

mod service;
mod types;

pub use service::{
    CODE_DIRECTION_ATTRIBUTE, ComrakRenderService, INLINE_CODE_DIRECTION_ATTRIBUTE,
    TEXT_DIRECTION_ATTRIBUTE, WRAPPED_ATTRIBUTE, parser_options, reapply_directions,
    render_service,
};
pub use types::{
    CodeBlockSummary, MathDelimiter, MathSpan, RENDER_ERROR_PANEL, RenderError, RenderOptions,
    RenderRequest, RenderService, RenderedDocument,
};
