//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::presentation::Direction;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "livemark";
const ENV_PREFIX: &str = "LIVEMARK";
const DEFAULT_RENDER_DEBOUNCE_MS: u64 = 300;
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_COPY_FEEDBACK_MS: u64 = 2000;
const DEFAULT_SETTINGS_FILE: &str = "livemark-settings.json";

/// Command-line arguments for the `render_dump` diagnostics binary.
#[derive(Debug, Parser)]
#[command(
    name = "render_dump",
    version,
    about = "Render a Markdown file through the livemark pipeline and print the HTML"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LIVEMARK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Markdown file to render.
    #[arg(value_name = "MARKDOWN", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Wrap the fragment in the output container carrying `data-text-direction`.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub container: bool,

    /// Print per-pass statistics to stderr after the HTML.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stats: bool,

    #[command(flatten)]
    pub directions: DirectionArgs,

    #[command(flatten)]
    pub overrides: RenderOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DirectionArgs {
    /// Prose direction (ltr|rtl).
    #[arg(long = "text-dir", value_name = "DIR")]
    pub text: Option<Direction>,

    /// Inline code direction (ltr|rtl).
    #[arg(long = "inline-code-dir", value_name = "DIR")]
    pub inline_code: Option<Direction>,

    /// Code block direction (ltr|rtl).
    #[arg(long = "code-dir", value_name = "DIR")]
    pub code: Option<Direction>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Skip the HTML sanitiser.
    #[arg(long = "no-sanitize", action = clap::ArgAction::SetTrue)]
    pub no_sanitize: bool,

    /// Only recognise `$$` and `$` math delimiters.
    #[arg(long = "no-latex-delimiters", action = clap::ArgAction::SetTrue)]
    pub no_latex_delimiters: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub editor: EditorSettings,
    pub render: RenderSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Editor timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorSettings {
    pub render_debounce: Duration,
    pub save_debounce: Duration,
    pub copy_feedback: Duration,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            render_debounce: Duration::from_millis(DEFAULT_RENDER_DEBOUNCE_MS),
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            copy_feedback: Duration::from_millis(DEFAULT_COPY_FEEDBACK_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Also recognise `\[ \]` and `\( \)` math delimiters.
    pub latex_delimiters: bool,
    pub sanitize: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            latex_delimiters: true,
            sanitize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub settings_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut raw = load_raw(cli.config_file.as_ref())?;
    raw.apply_render_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// Load settings from files and environment only.
pub fn load_without_cli(config_file: Option<&PathBuf>) -> Result<Settings, LoadError> {
    Settings::from_raw(load_raw(config_file)?)
}

fn load_raw(config_file: Option<&PathBuf>) -> Result<RawSettings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    Ok(builder.build()?.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    editor: RawEditorSettings,
    render: RawRenderSettings,
    storage: RawStorageSettings,
}

impl RawSettings {
    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if overrides.no_sanitize {
            self.render.sanitize = Some(false);
        }
        if overrides.no_latex_delimiters {
            self.render.latex_delimiters = Some(false);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            editor,
            render,
            storage,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let editor = build_editor_settings(editor)?;
        let render = build_render_settings(render);
        let storage = build_storage_settings(storage)?;

        Ok(Self {
            logging,
            editor,
            render,
            storage,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_editor_settings(editor: RawEditorSettings) -> Result<EditorSettings, LoadError> {
    let render_debounce = positive_millis(
        editor.render_debounce_ms.unwrap_or(DEFAULT_RENDER_DEBOUNCE_MS),
        "editor.render_debounce_ms",
    )?;
    let save_debounce = positive_millis(
        editor.save_debounce_ms.unwrap_or(DEFAULT_SAVE_DEBOUNCE_MS),
        "editor.save_debounce_ms",
    )?;
    let copy_feedback = positive_millis(
        editor.copy_feedback_ms.unwrap_or(DEFAULT_COPY_FEEDBACK_MS),
        "editor.copy_feedback_ms",
    )?;

    Ok(EditorSettings {
        render_debounce,
        save_debounce,
        copy_feedback,
    })
}

fn build_render_settings(render: RawRenderSettings) -> RenderSettings {
    let defaults = RenderSettings::default();
    RenderSettings {
        latex_delimiters: render.latex_delimiters.unwrap_or(defaults.latex_delimiters),
        sanitize: render.sanitize.unwrap_or(defaults.sanitize),
    }
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let settings_file = storage
        .settings_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    if settings_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.settings_file",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings { settings_file })
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEditorSettings {
    render_debounce_ms: Option<u64>,
    save_debounce_ms: Option<u64>,
    copy_feedback_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    latex_delimiters: Option<bool>,
    sanitize: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    settings_file: Option<PathBuf>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
