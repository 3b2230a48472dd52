//! Interactive state of the chrome added around rendered code blocks.
//!
//! Timing is passed in explicitly so the controls stay deterministic; callers
//! feed the current instant from whatever clock drives the UI.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::EditorSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyFeedback {
    #[default]
    Idle,
    Copied,
    Failed,
}

impl CopyFeedback {
    /// Icon markup shown inside the button.
    pub fn icon_html(self) -> &'static str {
        match self {
            CopyFeedback::Idle => "<i class=\"bi bi-clipboard\"></i>",
            CopyFeedback::Copied => "<i class=\"bi bi-check-lg\"></i>",
            CopyFeedback::Failed => "<i class=\"bi bi-x-octagon-fill text-danger\"></i>",
        }
    }

    /// Button classes for this state.
    pub fn button_classes(self) -> &'static str {
        match self {
            CopyFeedback::Copied => "btn btn-sm copy-code-button copied btn-success",
            CopyFeedback::Idle | CopyFeedback::Failed => {
                "btn btn-secondary btn-sm copy-code-button"
            }
        }
    }
}

/// Copy control of one code block.
#[derive(Debug, Clone)]
pub struct CopyButton {
    feedback_window: Duration,
    shown: CopyFeedback,
    since: Option<Instant>,
}

impl CopyButton {
    pub fn new(feedback_window: Duration) -> Self {
        Self {
            feedback_window,
            shown: CopyFeedback::Idle,
            since: None,
        }
    }

    /// Button whose feedback lasts for the configured copy window.
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self::new(settings.copy_feedback)
    }

    /// Record the outcome of a clipboard write made at `now`.
    pub fn record<E: std::fmt::Display>(&mut self, result: Result<(), E>, now: Instant) {
        self.shown = match result {
            Ok(()) => CopyFeedback::Copied,
            Err(err) => {
                warn!(target = "application::controls", "Failed to copy code: {err}");
                CopyFeedback::Failed
            }
        };
        self.since = Some(now);
    }

    /// State displayed at `now`; feedback reverts to idle once the window passes.
    pub fn state(&self, now: Instant) -> CopyFeedback {
        match self.since {
            Some(since) if now.saturating_duration_since(since) < self.feedback_window => {
                self.shown
            }
            _ => CopyFeedback::Idle,
        }
    }
}

/// Part of a code block header that received a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderTarget {
    Header,
    Language,
    CollapseIcon,
    CopyButton,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseToggle {
    collapsed: bool,
}

impl CollapseToggle {
    pub fn is_collapsed(self) -> bool {
        self.collapsed
    }

    /// Handle a header click. Returns whether the state changed.
    pub fn click(&mut self, target: HeaderTarget) -> bool {
        if target == HeaderTarget::CopyButton {
            return false;
        }
        self.collapsed = !self.collapsed;
        true
    }

    /// Wrapper classes for the current state.
    pub fn wrapper_classes(self) -> &'static str {
        if self.collapsed {
            "code-block-wrapper collapsed"
        } else {
            "code-block-wrapper"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(2);

    #[test]
    fn copy_feedback_reverts_after_window() {
        let start = Instant::now();
        let mut button = CopyButton::new(WINDOW);
        assert_eq!(button.state(start), CopyFeedback::Idle);

        button.record(Ok::<(), String>(()), start);
        assert_eq!(button.state(start + Duration::from_millis(1999)), CopyFeedback::Copied);
        assert_eq!(button.state(start + WINDOW), CopyFeedback::Idle);
    }

    #[test]
    fn feedback_window_comes_from_editor_settings() {
        let settings = EditorSettings {
            copy_feedback: Duration::from_millis(500),
            ..EditorSettings::default()
        };
        let start = Instant::now();
        let mut button = CopyButton::from_settings(&settings);
        button.record(Ok::<(), String>(()), start);

        assert_eq!(button.state(start + Duration::from_millis(499)), CopyFeedback::Copied);
        assert_eq!(button.state(start + Duration::from_millis(500)), CopyFeedback::Idle);
    }

    #[test]
    fn clipboard_failure_shows_error_icon() {
        let start = Instant::now();
        let mut button = CopyButton::new(WINDOW);
        button.record(Err("denied"), start);

        let state = button.state(start);
        assert_eq!(state, CopyFeedback::Failed);
        assert!(state.icon_html().contains("bi-x-octagon-fill"));
        assert_eq!(button.state(start + Duration::from_secs(3)), CopyFeedback::Idle);
    }

    #[test]
    fn copy_button_click_does_not_collapse() {
        let mut toggle = CollapseToggle::default();
        assert!(!toggle.click(HeaderTarget::CopyButton));
        assert!(!toggle.is_collapsed());

        assert!(toggle.click(HeaderTarget::Language));
        assert_eq!(toggle.wrapper_classes(), "code-block-wrapper collapsed");
        assert!(toggle.click(HeaderTarget::CollapseIcon));
        assert!(!toggle.is_collapsed());
    }
}
