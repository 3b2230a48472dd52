//! Code block chrome: a header with language label, copy control and
//! collapse toggle around every `<pre>` holding code.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str};

use crate::application::render::types::RenderError;

/// Marker placed on each `<pre>` once it sits inside a wrapper.
pub const WRAPPED_ATTRIBUTE: &str = "data-code-wrapped";

const PLAINTEXT: &str = "plaintext";
const THEME_CODE_CLASS: &str = "syntax-code";

#[derive(Debug, Clone, Default)]
struct PreSurvey {
    wrapped: bool,
    has_code: bool,
    code_classes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WrapPlan {
    language: String,
    added_classes: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct Enhanced {
    pub(crate) html: String,
    pub(crate) wrapped: usize,
}

/// Wrap every unwrapped `<pre>` that contains a `<code>` element.
///
/// `recognises` reports whether a bare class name is a language the
/// highlighter knows.
pub(crate) fn enhance_code_blocks(
    html: &str,
    recognises: impl Fn(&str) -> bool,
) -> Result<Enhanced, RenderError> {
    let surveys = survey_blocks(html)?;
    let plans: Vec<Option<WrapPlan>> = surveys
        .iter()
        .map(|survey| {
            (survey.has_code && !survey.wrapped)
                .then(|| plan_wrap(survey.code_classes.as_deref(), &recognises))
        })
        .collect();

    let wrapped = plans.iter().filter(|plan| plan.is_some()).count();
    if wrapped == 0 {
        return Ok(Enhanced {
            html: html.to_string(),
            wrapped,
        });
    }

    let plans = Rc::new(plans);
    let next_pre = Rc::new(Cell::new(0usize));
    let current = Rc::new(Cell::new(None::<usize>));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("pre", {
                    let plans = Rc::clone(&plans);
                    let next_pre = Rc::clone(&next_pre);
                    let current = Rc::clone(&current);
                    move |el| {
                        let index = next_pre.get();
                        next_pre.set(index + 1);
                        current.set(None);

                        if let Some(Some(plan)) = plans.get(index) {
                            el.before(&wrapper_open(&plan.language), ContentType::Html);
                            el.set_attribute(WRAPPED_ATTRIBUTE, "true")?;
                            el.after("</div>", ContentType::Html);
                            current.set(Some(index));
                        }
                        Ok(())
                    }
                }),
                element!("pre code", {
                    let plans = Rc::clone(&plans);
                    let current = Rc::clone(&current);
                    move |el| {
                        let Some(index) = current.take() else {
                            return Ok(());
                        };
                        if let Some(Some(plan)) = plans.get(index) {
                            let mut classes: Vec<String> = el
                                .get_attribute("class")
                                .map(|value| value.split_whitespace().map(str::to_string).collect())
                                .unwrap_or_default();
                            for class in &plan.added_classes {
                                if !classes.contains(class) {
                                    classes.push(class.clone());
                                }
                            }
                            el.set_attribute("class", &classes.join(" "))?;
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })?;

    Ok(Enhanced {
        html: rewritten,
        wrapped,
    })
}

fn survey_blocks(html: &str) -> Result<Vec<PreSurvey>, RenderError> {
    let surveys = Rc::new(RefCell::new(Vec::<PreSurvey>::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("pre", {
                    let surveys = Rc::clone(&surveys);
                    move |el| {
                        surveys.borrow_mut().push(PreSurvey {
                            wrapped: el.get_attribute(WRAPPED_ATTRIBUTE).is_some(),
                            ..PreSurvey::default()
                        });
                        Ok(())
                    }
                }),
                element!("pre code", {
                    let surveys = Rc::clone(&surveys);
                    move |el| {
                        if let Some(survey) = surveys.borrow_mut().last_mut()
                            && !survey.has_code
                        {
                            survey.has_code = true;
                            survey.code_classes = el.get_attribute("class");
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })?;

    let surveys = Rc::try_unwrap(surveys)
        .map(|cell| cell.into_inner())
        .unwrap_or_else(|rc| rc.borrow().clone());
    Ok(surveys)
}

/// Pick the label for a block: an explicit `language-*` class, else a class
/// the highlighter recognises, else plain text.
fn plan_wrap(code_classes: Option<&str>, recognises: &impl Fn(&str) -> bool) -> WrapPlan {
    let classes: Vec<&str> = code_classes
        .map(|value| value.split_whitespace().collect())
        .unwrap_or_default();

    let mut added_classes = Vec::new();
    let language = if let Some(explicit) = classes
        .iter()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|name| !name.is_empty())
    {
        explicit.to_string()
    } else if let Some(known) = classes.iter().find(|class| {
        !class.starts_with("syntax-") && **class != "hljs" && recognises(class)
    }) {
        added_classes.push(format!("language-{known}"));
        (*known).to_string()
    } else {
        added_classes.push(format!("language-{PLAINTEXT}"));
        PLAINTEXT.to_string()
    };

    if !classes.contains(&THEME_CODE_CLASS) {
        added_classes.push(THEME_CODE_CLASS.to_string());
    }

    WrapPlan {
        language,
        added_classes,
    }
}

fn wrapper_open(language: &str) -> String {
    format!(
        concat!(
            "<div class=\"code-block-wrapper\">",
            "<div class=\"code-block-header\">",
            "<span class=\"language\">{language}</span>",
            "<button type=\"button\" class=\"btn btn-secondary btn-sm copy-code-button\" ",
            "title=\"Copy code to clipboard\" aria-label=\"Copy code to clipboard\">",
            "<i class=\"bi bi-clipboard\"></i></button>",
            "<span class=\"collapse-icon\" title=\"Toggle Collapse\"></span>",
            "</div>"
        ),
        language = ammonia::clean_text(language)
    )
}
