//! Live Markdown preview core.
//!
//! [`application::render`] turns Markdown with LaTeX math into sanitized,
//! highlighted HTML. [`application::editor`] and [`application::live`] hold
//! the editing session that drives it.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
