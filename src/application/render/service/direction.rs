use lol_html::{RewriteStrSettings, element, rewrite_str};

use crate::application::render::types::{RenderError, RenderOptions};

pub const CODE_DIRECTION_ATTRIBUTE: &str = "data-code-direction";
pub const INLINE_CODE_DIRECTION_ATTRIBUTE: &str = "data-inline-code-direction";
pub const TEXT_DIRECTION_ATTRIBUTE: &str = "data-text-direction";

/// Set the configured direction on every code block wrapper and every inline
/// code element. Block code is recognised by its `syntax-code` class, which
/// enhancement guarantees.
pub fn reapply_directions(html: &str, options: &RenderOptions) -> Result<String, RenderError> {
    let code_direction = options.code_direction.as_str();
    let inline_direction = options.inline_code_direction.as_str();

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("div.code-block-wrapper", move |el| {
                    el.set_attribute(CODE_DIRECTION_ATTRIBUTE, code_direction)?;
                    Ok(())
                }),
                element!("code:not(.syntax-code)", move |el| {
                    el.set_attribute(INLINE_CODE_DIRECTION_ATTRIBUTE, inline_direction)?;
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::presentation::Direction;

    fn rtl_everywhere() -> RenderOptions {
        RenderOptions {
            inline_code_direction: Direction::Rtl,
            code_direction: Direction::Rtl,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn marks_wrappers_and_inline_code() {
        let html = "<p><code>x</code></p><div class=\"code-block-wrapper\"><pre><code class=\"syntax-code\">y</code></pre></div>";
        let out = reapply_directions(html, &rtl_everywhere()).unwrap();
        assert!(out.contains("<code data-inline-code-direction=\"rtl\">x</code>"));
        assert!(out.contains("<div class=\"code-block-wrapper\" data-code-direction=\"rtl\">"));
        assert!(out.contains("<code class=\"syntax-code\">y</code>"));
    }

    #[test]
    fn reapplying_overwrites_previous_direction() {
        let html = "<p><code>x</code></p>";
        let rtl = reapply_directions(html, &rtl_everywhere()).unwrap();
        let ltr = reapply_directions(&rtl, &RenderOptions::default()).unwrap();
        assert_eq!(ltr, "<p><code data-inline-code-direction=\"ltr\">x</code></p>");
        assert_eq!(reapply_directions(&ltr, &RenderOptions::default()).unwrap(), ltr);
    }
}
