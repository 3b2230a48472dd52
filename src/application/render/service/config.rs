use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

/// Comrak options used by the pipeline: hard line breaks plus the GFM
/// extensions. Dollar math stays off so math delimiters are owned by the
/// extraction stage.
pub fn parser_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "ins",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "u",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
        "dl",
        "dt",
        "dd",
        "del",
        "mark",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
        "data-footnote-backref-idx",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes("img", &["title", "width", "height", "alt", "loading"]);
    builder.add_tag_attributes("code", &["data-language", "class"]);
    builder.add_tag_attributes("pre", &["class", "data-language"]);
    builder.add_tag_attributes("div", &["class", "data-footnotes"]);
    builder.add_tag_attributes("span", &["class"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled", "class"]);

    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.math_dollars = false;
    ext.math_code = false;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.r#unsafe = true;
    render.sourcepos = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_strips_scripts_and_handlers() {
        let html = build_sanitizer()
            .clean("<p onclick=\"x()\">hi</p><script>alert(1)</script>")
            .to_string();
        assert_eq!(html, "<p>hi</p>");
    }

    #[test]
    fn sanitizer_keeps_highlighter_markup() {
        let html = build_sanitizer()
            .clean(
                "<pre class=\"syntax-highlight\" data-language=\"rust\"><code class=\"language-rust syntax-code\"><span class=\"syntax-keyword\">fn</span></code></pre>",
            )
            .to_string();
        assert!(html.contains("data-language=\"rust\""));
        assert!(html.contains("class=\"language-rust syntax-code\""));
        assert!(html.contains("<span class=\"syntax-keyword\">fn</span>"));
    }

    #[test]
    fn sanitizer_preserves_strikethrough() {
        let html = build_sanitizer()
            .clean("<p><del>Removed</del> text</p>")
            .to_string();
        assert!(html.contains("<del>Removed</del>"));
    }

    #[test]
    fn line_breaks_become_br() {
        let html = comrak::markdown_to_html("one\ntwo", &parser_options());
        assert_eq!(html, "<p>one<br />\ntwo</p>\n");
    }
}
