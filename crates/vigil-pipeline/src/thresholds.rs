//! Detection confidence thresholds.
//!
//! Three levels, most specific first:
//! 1. an override for a `(model, label)` pair
//! 2. a model-agnostic default for the label
//! 3. the global default
//!
//! Levels 2 and 3 never drop below [`DEFAULT_THRESHOLD`] or the configured
//! global default, whichever is higher. Only explicit overrides can go lower.

use std::collections::HashMap;

use vigil_models::normalize_label;

use crate::error::ConfigError;

/// Floor for every non-override threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.75;

/// Immutable threshold lookup table, built once at startup.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    default: f32,
    label_defaults: HashMap<String, f32>,
    overrides: HashMap<(String, String), f32>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl ThresholdTable {
    pub fn new(default: f32) -> Self {
        Self {
            default,
            label_defaults: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// Set the threshold for one label of one model.
    pub fn with_override(mut self, model_id: &str, label: &str, threshold: f32) -> Self {
        self.overrides
            .insert((model_id.trim().to_string(), normalize_label(label)), threshold);
        self
    }

    /// Set the threshold for a label regardless of model.
    pub fn with_label_default(mut self, label: &str, threshold: f32) -> Self {
        self.label_defaults.insert(normalize_label(label), threshold);
        self
    }

    /// The global default.
    pub fn global_default(&self) -> f32 {
        self.default
    }

    /// Exact `(model, label)` override, if configured.
    pub fn lookup(&self, model_id: &str, label: &str) -> Option<f32> {
        self.overrides
            .get(&(model_id.to_string(), normalize_label(label)))
            .copied()
    }

    /// Model-agnostic threshold for a label.
    pub fn default_for(&self, label: &str) -> f32 {
        self.label_defaults
            .get(&normalize_label(label))
            .copied()
            .unwrap_or(self.default)
            .max(self.default)
            .max(DEFAULT_THRESHOLD)
    }

    /// Minimum confidence a detection needs to enter aggregation.
    pub fn required(&self, model_id: &str, label: &str) -> f32 {
        self.lookup(model_id, label)
            .unwrap_or_else(|| self.default_for(label))
    }

    /// Parse `model:label=0.8,label=0.9` entries on top of this table.
    ///
    /// Entries with a `model:` prefix are overrides; bare labels (or `*:label`)
    /// are label defaults. `var` names the source for error messages.
    pub fn parse_entries(mut self, var: &str, spec: &str) -> Result<Self, ConfigError> {
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::invalid(var, format!("expected key=value, got '{}'", entry)))?;

            let threshold: f32 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(var, format!("'{}' is not a number", value.trim())))?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::ThresholdOutOfRange {
                    var: var.to_string(),
                    value: threshold,
                });
            }

            match key.split_once(':') {
                Some(("*", label)) => self = self.with_label_default(label, threshold),
                Some((model, label)) if !model.trim().is_empty() && !label.trim().is_empty() => {
                    self = self.with_override(model, label, threshold)
                }
                Some(_) => {
                    return Err(ConfigError::invalid(var, format!("empty model or label in '{}'", entry)))
                }
                None if !key.trim().is_empty() => self = self.with_label_default(key, threshold),
                None => return Err(ConfigError::invalid(var, format!("empty label in '{}'", entry))),
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let table = ThresholdTable::default().with_override("gunonly", "pistol", 0.5);
        assert_eq!(table.required("gunonly", "Pistol "), 0.5);
        assert_eq!(table.required("total", "pistol"), 0.75);
    }

    #[test]
    fn test_label_default_never_below_global() {
        let table = ThresholdTable::default()
            .with_label_default("smoke", 0.6)
            .with_label_default("fire", 0.9);
        assert_eq!(table.default_for("smoke"), 0.75);
        assert_eq!(table.default_for("fire"), 0.9);
        assert_eq!(table.default_for("person"), 0.75);
    }

    #[test]
    fn test_lowered_global_default_keeps_floor() {
        let table = ThresholdTable::new(0.5)
            .with_label_default("smoke", 0.6)
            .with_override("gunonly", "pistol", 0.4);
        assert_eq!(table.default_for("smoke"), DEFAULT_THRESHOLD);
        assert_eq!(table.required("firesmoke", "fire"), DEFAULT_THRESHOLD);
        assert_eq!(table.required("gunonly", "pistol"), 0.4);

        assert_eq!(ThresholdTable::new(0.9).default_for("fire"), 0.9);
    }

    #[test]
    fn test_parse_entries() {
        let table = ThresholdTable::default()
            .parse_entries("T", "firesmoke:fire=0.8, smoke=0.85, *:person=0.9")
            .unwrap();
        assert_eq!(table.lookup("firesmoke", "fire"), Some(0.8));
        assert_eq!(table.required("other", "smoke"), 0.85);
        assert_eq!(table.required("other", "person"), 0.9);
    }

    #[test]
    fn test_parse_entries_rejects_bad_input() {
        assert!(ThresholdTable::default().parse_entries("T", "fire").is_err());
        assert!(ThresholdTable::default().parse_entries("T", "fire=abc").is_err());
        assert!(matches!(
            ThresholdTable::default().parse_entries("T", "m:fire=1.5"),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));
        assert!(ThresholdTable::default().parse_entries("T", ":fire=0.5").is_err());
        assert!(ThresholdTable::default().parse_entries("T", "").is_ok());
    }
}
