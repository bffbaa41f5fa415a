#![forbid(unsafe_code)]

//! Engine configuration (deterministic, env-overridable).
//!
//! # Environment Variables
//! - `FTUI_VSCROLL_DEFAULT_ITEM_HEIGHT` (f64, px)
//! - `FTUI_VSCROLL_RENDER_DISTANCE` (f64, px)
//! - `FTUI_VSCROLL_STICK_TO_EDGE` (bool)
//! - `FTUI_VSCROLL_START_INDEX` (usize)
//! - `FTUI_VSCROLL_SHOW_JUMP_TO_NEW` (bool)
//! - `FTUI_VSCROLL_EDGE_THRESHOLD` (f64, px)
//! - `FTUI_VSCROLL_LOCK_MS` (u64)
//! - `FTUI_VSCROLL_DEBOUNCE_MS` (u64)

use std::time::Duration;

use crate::error::ConfigError;

const ENV_DEFAULT_ITEM_HEIGHT: &str = "FTUI_VSCROLL_DEFAULT_ITEM_HEIGHT";
const ENV_RENDER_DISTANCE: &str = "FTUI_VSCROLL_RENDER_DISTANCE";
const ENV_STICK_TO_EDGE: &str = "FTUI_VSCROLL_STICK_TO_EDGE";
const ENV_START_INDEX: &str = "FTUI_VSCROLL_START_INDEX";
const ENV_SHOW_JUMP_TO_NEW: &str = "FTUI_VSCROLL_SHOW_JUMP_TO_NEW";
const ENV_EDGE_THRESHOLD: &str = "FTUI_VSCROLL_EDGE_THRESHOLD";
const ENV_LOCK_MS: &str = "FTUI_VSCROLL_LOCK_MS";
const ENV_DEBOUNCE_MS: &str = "FTUI_VSCROLL_DEBOUNCE_MS";

/// Distance from the follow edge under which the view counts as "at" it.
pub const DEFAULT_EDGE_THRESHOLD: f64 = 70.0;
/// Drift from the follow edge tolerated before stick-to-edge re-snaps.
pub const DEFAULT_SNAP_TOLERANCE: f64 = 2.0;
/// How long a locked height pins an item's size.
pub const DEFAULT_HEIGHT_LOCK: Duration = Duration::from_millis(250);
/// Quiet period before the fetch-more callback fires.
pub const DEFAULT_LOAD_MORE_DEBOUNCE: Duration = Duration::from_millis(50);

/// Tuning knobs for the windowing engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualScrollConfig {
    /// Height assumed for items that have never been measured (px).
    pub default_item_height: f64,
    /// Extra pixels realized above and below the viewport.
    pub render_distance: f64,
    /// Auto-follow the bottom edge as content is appended (chat feeds).
    pub stick_to_edge: bool,
    /// Index to seed the first render from. Overrides `stick_to_edge` for
    /// the first render only.
    pub start_index: Option<usize>,
    /// Raise the "new content available" indicator instead of moving the
    /// view when content arrives away from the follow edge.
    pub show_jump_to_new: bool,
    /// Near-edge and load-more threshold (px).
    pub edge_threshold: f64,
    /// Allowed drift from the follow edge before re-snapping (px).
    pub snap_tolerance: f64,
    /// Lifetime of a height lock.
    pub height_lock_duration: Duration,
    /// Debounce window for the fetch-more callback.
    pub load_more_debounce: Duration,
}

impl Default for VirtualScrollConfig {
    fn default() -> Self {
        Self {
            default_item_height: 50.0,
            render_distance: 0.0,
            stick_to_edge: false,
            start_index: None,
            show_jump_to_new: false,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            height_lock_duration: DEFAULT_HEIGHT_LOCK,
            load_more_debounce: DEFAULT_LOAD_MORE_DEBOUNCE,
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct ConfigParse {
    pub config: VirtualScrollConfig,
    pub errors: Vec<ConfigError>,
}

impl VirtualScrollConfig {
    /// Create a config with the given default item height.
    #[must_use]
    pub fn new(default_item_height: f64) -> Self {
        Self {
            default_item_height,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_render_distance(mut self, px: f64) -> Self {
        self.render_distance = px;
        self
    }

    #[must_use]
    pub fn with_stick_to_edge(mut self, stick: bool) -> Self {
        self.stick_to_edge = stick;
        self
    }

    #[must_use]
    pub fn with_start_index(mut self, index: usize) -> Self {
        self.start_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_show_jump_to_new(mut self, show: bool) -> Self {
        self.show_jump_to_new = show;
        self
    }

    #[must_use]
    pub fn with_edge_threshold(mut self, px: f64) -> Self {
        self.edge_threshold = px;
        self
    }

    #[must_use]
    pub fn with_height_lock_duration(mut self, duration: Duration) -> Self {
        self.height_lock_duration = duration;
        self
    }

    #[must_use]
    pub fn with_load_more_debounce(mut self, duration: Duration) -> Self {
        self.load_more_debounce = duration;
        self
    }

    /// Apply `FTUI_VSCROLL_*` overrides from the process environment.
    #[must_use]
    pub fn from_env(base: Self) -> ConfigParse {
        Self::from_env_with(base, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparsable values are reported and leave the base value in place.
    #[must_use]
    pub fn from_env_with<F>(base: Self, mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = base;
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_DEFAULT_ITEM_HEIGHT) {
            match parse_f64(&value) {
                Some(parsed) => config.default_item_height = parsed,
                None => errors.push(ConfigError::new(
                    "default_item_height",
                    value,
                    "expected number",
                )),
            }
        }

        if let Some(value) = get(ENV_RENDER_DISTANCE) {
            match parse_f64(&value) {
                Some(parsed) => config.render_distance = parsed,
                None => errors.push(ConfigError::new(
                    "render_distance",
                    value,
                    "expected number",
                )),
            }
        }

        if let Some(value) = get(ENV_STICK_TO_EDGE) {
            match parse_bool(&value) {
                Some(parsed) => config.stick_to_edge = parsed,
                None => errors.push(ConfigError::new(
                    "stick_to_edge",
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }

        if let Some(value) = get(ENV_START_INDEX) {
            match value.trim().parse::<usize>() {
                Ok(parsed) => config.start_index = Some(parsed),
                Err(_) => errors.push(ConfigError::new(
                    "start_index",
                    value,
                    "expected non-negative integer",
                )),
            }
        }

        if let Some(value) = get(ENV_SHOW_JUMP_TO_NEW) {
            match parse_bool(&value) {
                Some(parsed) => config.show_jump_to_new = parsed,
                None => errors.push(ConfigError::new(
                    "show_jump_to_new",
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }

        if let Some(value) = get(ENV_EDGE_THRESHOLD) {
            match parse_f64(&value) {
                Some(parsed) => config.edge_threshold = parsed,
                None => errors.push(ConfigError::new(
                    "edge_threshold",
                    value,
                    "expected number",
                )),
            }
        }

        if let Some(value) = get(ENV_LOCK_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.height_lock_duration = Duration::from_millis(ms),
                Err(_) => errors.push(ConfigError::new(
                    "height_lock_duration",
                    value,
                    "expected milliseconds",
                )),
            }
        }

        if let Some(value) = get(ENV_DEBOUNCE_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.load_more_debounce = Duration::from_millis(ms),
                Err(_) => errors.push(ConfigError::new(
                    "load_more_debounce",
                    value,
                    "expected milliseconds",
                )),
            }
        }

        ConfigParse { config, errors }
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if !(self.default_item_height.is_finite() && self.default_item_height > 0.0) {
            errors.push(ConfigError::new(
                "default_item_height",
                self.default_item_height.to_string(),
                "must be a finite number > 0",
            ));
        }
        validate_non_negative("render_distance", self.render_distance, &mut errors);
        validate_non_negative("edge_threshold", self.edge_threshold, &mut errors);
        validate_non_negative("snap_tolerance", self.snap_tolerance, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_non_negative(field: &'static str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(ConfigError::new(
            field,
            value.to_string(),
            "must be a finite number >= 0",
        ));
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_engine_constants() {
        let config = VirtualScrollConfig::default();
        assert_eq!(config.render_distance, 0.0);
        assert!(!config.stick_to_edge);
        assert_eq!(config.start_index, None);
        assert!(!config.show_jump_to_new);
        assert_eq!(config.edge_threshold, 70.0);
        assert_eq!(config.snap_tolerance, 2.0);
        assert_eq!(config.height_lock_duration, Duration::from_millis(250));
        assert_eq!(config.load_more_debounce, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let vars = env(&[
            (ENV_DEFAULT_ITEM_HEIGHT, "32"),
            (ENV_RENDER_DISTANCE, "200"),
            (ENV_STICK_TO_EDGE, "yes"),
            (ENV_START_INDEX, "17"),
            (ENV_LOCK_MS, "100"),
        ]);
        let parsed =
            VirtualScrollConfig::from_env_with(VirtualScrollConfig::default(), |key| {
                vars.get(key).cloned()
            });
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config.default_item_height, 32.0);
        assert_eq!(parsed.config.render_distance, 200.0);
        assert!(parsed.config.stick_to_edge);
        assert_eq!(parsed.config.start_index, Some(17));
        assert_eq!(
            parsed.config.height_lock_duration,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn env_parse_errors_keep_base_values() {
        let vars = env(&[(ENV_STICK_TO_EDGE, "maybe"), (ENV_RENDER_DISTANCE, "NaN")]);
        let base = VirtualScrollConfig::new(20.0).with_render_distance(10.0);
        let parsed = VirtualScrollConfig::from_env_with(base, |key| vars.get(key).cloned());
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.config.render_distance, 10.0);
        assert!(!parsed.config.stick_to_edge);
    }

    #[test]
    fn validate_reports_all_violations() {
        let config = VirtualScrollConfig::new(0.0).with_render_distance(-5.0);
        let errors = config.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["default_item_height", "render_distance"]);
    }
}
