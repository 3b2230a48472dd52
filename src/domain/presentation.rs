//! Presentation flags that shape the displayed document: reading directions,
//! theme and layout toggles.
//!
//! These values are owned by the editor session and persisted through the
//! settings store. The render pipeline only ever receives them as read-only
//! input (see [`crate::application::render::RenderOptions`]).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LIGHT_THEME_CSS: &str = include_str!(env!("THEME_CSS_LIGHT_FILE"));
const DARK_THEME_CSS: &str = include_str!(env!("THEME_CSS_DARK_FILE"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised {kind} value `{value}`")]
pub struct ParseFlagError {
    kind: &'static str,
    value: String,
}

impl ParseFlagError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Reading direction applied through `data-*-direction` styling hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Ltr => Direction::Rtl,
            Direction::Rtl => Direction::Ltr,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseFlagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(Direction::Ltr),
            "rtl" => Ok(Direction::Rtl),
            _ => Err(ParseFlagError::new("direction", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Value for the root `data-bs-theme` attribute.
    pub fn root_attribute(self) -> &'static str {
        self.as_str()
    }

    /// Highlighter stylesheet matching the `syntax-` class prefix emitted by the
    /// render pipeline.
    pub fn highlight_css(self) -> &'static str {
        match self {
            Theme::Light => LIGHT_THEME_CSS,
            Theme::Dark => DARK_THEME_CSS,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParseFlagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(ParseFlagError::new("theme", value)),
        }
    }
}

/// Full set of user-facing presentation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationState {
    pub theme: Theme,
    pub auto_render: bool,
    /// Direction of prose in the output container.
    pub text_direction: Direction,
    /// Direction of inline `code` spans.
    pub inline_code_direction: Direction,
    /// Direction of fenced code block wrappers.
    pub code_direction: Direction,
    pub full_height: bool,
    pub input_visible: bool,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            auto_render: true,
            text_direction: Direction::Ltr,
            inline_code_direction: Direction::Ltr,
            code_direction: Direction::Ltr,
            full_height: false,
            input_visible: true,
        }
    }
}

/// Parse a persisted boolean flag (`"true"`/`"false"`).
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
