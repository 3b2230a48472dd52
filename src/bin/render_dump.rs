use std::{error::Error, fs};

use livemark::{
    application::render::{RenderOptions, RenderRequest, RenderService, render_service},
    config,
    domain::stats::TextStats,
    infra::telemetry,
};
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    let (args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let markdown = fs::read_to_string(&args.input)?;

    let defaults = RenderOptions::default();
    let options = RenderOptions {
        text_direction: args.directions.text.unwrap_or(defaults.text_direction),
        inline_code_direction: args
            .directions
            .inline_code
            .unwrap_or(defaults.inline_code_direction),
        code_direction: args.directions.code.unwrap_or(defaults.code_direction),
        ..defaults
    }
    .with_render_settings(&settings.render);

    let renderer = render_service();
    let document = renderer.render(&RenderRequest::new(markdown.as_str()).with_options(options))?;

    if args.container {
        println!("{}", document.container_html());
    } else {
        println!("{}", document.html);
    }

    info!(
        target = "render_dump",
        input = %args.input.display(),
        sanitize = options.sanitize,
        "Rendered document"
    );

    if args.stats {
        let stats = TextStats::of(&markdown);
        eprintln!("{}  {}", stats.chars_label(), stats.words_label());
        eprintln!(
            "math spans: {} (restored {}, typeset {}, failed {})",
            document.math_spans.len(),
            document.restored_spans,
            document.typeset_spans,
            document.typeset_failures
        );
        eprintln!(
            "code blocks: {} (wrapped {}, highlight failures {})",
            document.code_blocks.len(),
            document.wrapped_blocks,
            document.highlight_failures
        );
    }

    Ok(())
}
