//! Server settings
//!
//! Settings arrive as JSON, either as `initializationOptions` or through
//! `workspace/didChangeConfiguration`. Clients may send them flat or nested
//! under a `"refactor-css"` key; both shapes are accepted.

use std::time::Duration;

use eyre::{Result, WrapErr};
use refactor_css_core::{CaretWindow, DEFAULT_EXCLUDE, DEFAULT_INCLUDE, GlobFilter, Thresholds};
use serde::Deserialize;
use serde_json::Value;

/// Key under which clients usually namespace the settings
pub const SETTINGS_SECTION: &str = "refactor-css";

/// Root configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Minimum distinct classes for an attribute to be highlighted
    pub highlight_minimum_classes: usize,

    /// Minimum workspace-wide occurrences for an attribute to be highlighted
    pub highlight_minimum_occurrences: usize,

    /// Glob patterns for files to index, relative to the workspace root
    pub include: Patterns,

    /// Glob patterns for files to leave out
    pub exclude: Patterns,

    /// Quiet period after an edit before the document is re-indexed
    pub debounce_ms: u64,

    /// How many lines above the caret a hover may look for `class="`
    pub hover_lines_before: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            highlight_minimum_classes: 3,
            highlight_minimum_occurrences: 3,
            include: Patterns(vec![DEFAULT_INCLUDE.to_string()]),
            exclude: Patterns(vec![DEFAULT_EXCLUDE.to_string()]),
            debounce_ms: 500,
            hover_lines_before: 5,
        }
    }
}

impl Config {
    /// Parse settings sent by the client.
    ///
    /// `null` yields the defaults. Missing keys take their default value and
    /// unknown keys are ignored.
    pub fn from_settings(settings: &Value) -> Result<Self> {
        let section = match settings {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map.get(SETTINGS_SECTION).unwrap_or(settings),
            _ => settings,
        };
        if section.is_null() {
            return Ok(Self::default());
        }

        Config::deserialize(section).wrap_err("Invalid refactor-css settings")
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(
            self.highlight_minimum_classes,
            self.highlight_minimum_occurrences,
        )
    }

    pub fn caret_window(&self) -> CaretWindow {
        CaretWindow {
            lines_before: self.hover_lines_before,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Compile the include/exclude patterns
    pub fn filter(&self) -> Result<GlobFilter> {
        GlobFilter::new(self.include.iter(), self.exclude.iter())
    }

    /// Whether switching from `self` to `other` changes which files belong
    /// to the workspace
    pub fn discovery_changed(&self, other: &Config) -> bool {
        self.include != other.include || self.exclude != other.exclude
    }
}

/// One or more glob patterns. Accepts a single string or an array of
/// strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "PatternsRepr")]
pub struct Patterns(pub Vec<String>);

impl Patterns {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<PatternsRepr> for Patterns {
    fn from(repr: PatternsRepr) -> Self {
        match repr {
            PatternsRepr::One(pattern) => Patterns(vec![pattern]),
            PatternsRepr::Many(patterns) => Patterns(patterns),
        }
    }
}
