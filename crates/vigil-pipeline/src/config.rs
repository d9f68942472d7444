//! Pipeline configuration.
//!
//! Loaded once from the environment at startup. Plain numeric knobs fall back
//! to their defaults when malformed; model lists, label sets and thresholds
//! fail with a [`ConfigError`] naming the variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vigil_models::normalize_label;

use crate::error::ConfigError;
use crate::hub::{DEFAULT_SEND_TIMEOUT, DEFAULT_SUBSCRIBER_BUFFER};
use crate::policy::PolicyConfig;
use crate::thresholds::{ThresholdTable, DEFAULT_THRESHOLD};

pub const DEFAULT_DETECTOR_MODELS: &str = "firesmoke=http://localhost:9001,gunonly=http://localhost:9002";
pub const DEFAULT_THRESHOLD_OVERRIDES: &str =
    "firesmoke:fire=0.75,firesmoke:smoke=0.75,gunonly:pistol=0.75,total:person=0.75";

/// One configured detector model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSpec {
    pub model_id: String,
    pub base_url: String,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Detector models, in invocation order
    pub detectors: Vec<DetectorSpec>,
    /// Per-call detector timeout
    pub detector_timeout: Duration,
    /// Retries on retryable detector errors
    pub detector_retries: u32,
    /// Concurrent calls allowed into one model context
    pub model_concurrency: usize,
    pub thresholds: ThresholdTable,
    pub policy: PolicyConfig,
    /// Concurrent frames allowed through the detectors
    pub admission_pool_size: usize,
    pub admission_timeout: Duration,
    pub subscriber_send_timeout: Duration,
    pub subscriber_buffer: usize,
    /// Caption font replacing the bundled one
    pub font_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detectors: parse_models("DETECTOR_MODELS", DEFAULT_DETECTOR_MODELS).unwrap_or_default(),
            detector_timeout: Duration::from_secs(10),
            detector_retries: 0,
            model_concurrency: 1,
            thresholds: ThresholdTable::default()
                .parse_entries("THRESHOLD_OVERRIDES", DEFAULT_THRESHOLD_OVERRIDES)
                .unwrap_or_default(),
            policy: PolicyConfig::default(),
            admission_pool_size: 1,
            admission_timeout: Duration::from_millis(2000),
            subscriber_send_timeout: DEFAULT_SEND_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            font_path: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PolicyConfig::default();

        let detectors = parse_models(
            "DETECTOR_MODELS",
            &lookup("DETECTOR_MODELS").unwrap_or_else(|| DEFAULT_DETECTOR_MODELS.to_string()),
        )?;

        let default_threshold = threshold(&lookup, "DEFAULT_THRESHOLD", DEFAULT_THRESHOLD)?;
        let thresholds = ThresholdTable::new(default_threshold).parse_entries(
            "THRESHOLD_OVERRIDES",
            &lookup("THRESHOLD_OVERRIDES").unwrap_or_else(|| DEFAULT_THRESHOLD_OVERRIDES.to_string()),
        )?;

        let policy = PolicyConfig {
            weapon_labels: labels(&lookup, "WEAPON_LABELS", &defaults.weapon_labels)?,
            reportable_labels: labels(&lookup, "REPORTABLE_LABELS", &defaults.reportable_labels)?,
            immediate_threshold: threshold(&lookup, "IMMEDIATE_THRESHOLD", defaults.immediate_threshold)?,
            reportable_threshold: threshold(&lookup, "REPORTABLE_THRESHOLD", defaults.reportable_threshold)?,
            critical_threshold: threshold(&lookup, "CRITICAL_THRESHOLD", defaults.critical_threshold)?,
        };

        Ok(Self {
            detectors,
            detector_timeout: Duration::from_secs(number(&lookup, "DETECTOR_TIMEOUT_SECS", 10)),
            detector_retries: number(&lookup, "DETECTOR_RETRIES", 0),
            model_concurrency: number::<usize, _>(&lookup, "MODEL_CONCURRENCY", 1).max(1),
            thresholds,
            policy,
            admission_pool_size: number::<usize, _>(&lookup, "ADMISSION_POOL_SIZE", 1).max(1),
            admission_timeout: Duration::from_millis(number(&lookup, "ADMISSION_TIMEOUT_MS", 2000)),
            subscriber_send_timeout: Duration::from_millis(number(
                &lookup,
                "SUBSCRIBER_SEND_TIMEOUT_MS",
                DEFAULT_SEND_TIMEOUT.as_millis() as u64,
            )),
            subscriber_buffer: number::<usize, _>(&lookup, "SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER)
                .max(1),
            font_path: lookup("ANNOTATION_FONT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn number<T, F>(lookup: &F, var: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn threshold<F>(lookup: &F, var: &str, default: f32) -> Result<f32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(var, format!("'{}' is not a number", raw.trim())))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange {
            var: var.to_string(),
            value,
        });
    }
    Ok(value)
}

fn labels<F>(lookup: &F, var: &str, default: &[String]) -> Result<Vec<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default.to_vec());
    };

    let mut out: Vec<String> = Vec::new();
    for label in raw.split(',').map(normalize_label).filter(|l| !l.is_empty()) {
        if !out.contains(&label) {
            out.push(label);
        }
    }

    if out.is_empty() {
        return Err(ConfigError::invalid(var, "at least one label is required"));
    }
    Ok(out)
}

/// Parse `id=url,id=url` into an ordered detector list.
pub fn parse_models(var: &str, raw: &str) -> Result<Vec<DetectorSpec>, ConfigError> {
    let mut detectors: Vec<DetectorSpec> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (model_id, base_url) = entry
            .split_once('=')
            .map(|(id, url)| (id.trim(), url.trim()))
            .filter(|(id, url)| !id.is_empty() && !url.is_empty())
            .ok_or_else(|| ConfigError::invalid(var, format!("expected model=url, got '{}'", entry)))?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                var,
                format!("'{}' is not an http(s) URL", base_url),
            ));
        }
        if detectors.iter().any(|d| d.model_id == model_id) {
            return Err(ConfigError::invalid(var, format!("duplicate model '{}'", model_id)));
        }

        detectors.push(DetectorSpec {
            model_id: model_id.to_string(),
            base_url: base_url.to_string(),
        });
    }

    if detectors.is_empty() {
        return Err(ConfigError::NoDetectors);
    }
    Ok(detectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.detectors.len(), 2);
        assert_eq!(config.detectors[0].model_id, "firesmoke");
        assert_eq!(config.detectors[1].base_url, "http://localhost:9002");
        assert_eq!(config.detector_timeout, Duration::from_secs(10));
        assert_eq!(config.model_concurrency, 1);
        assert_eq!(config.admission_pool_size, 1);
        assert_eq!(config.admission_timeout, Duration::from_millis(2000));
        assert_eq!(config.subscriber_send_timeout, Duration::from_millis(500));
        assert_eq!(config.subscriber_buffer, 16);
        assert_eq!(config.thresholds.lookup("gunonly", "pistol"), Some(0.75));
        assert_eq!(config.policy.weapon_labels, vec!["pistol", "gun"]);
        assert!(config.font_path.is_none());

        let default = PipelineConfig::default();
        assert_eq!(default.detectors, config.detectors);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DETECTOR_MODELS", "total=http://m:1/ , gunonly=https://g"),
            ("WEAPON_LABELS", "Pistol, gun, pistol"),
            ("IMMEDIATE_THRESHOLD", "0.9"),
            ("THRESHOLD_OVERRIDES", "total:person=0.6"),
            ("ADMISSION_POOL_SIZE", "4"),
            ("ANNOTATION_FONT_PATH", "/fonts/DejaVuSans.ttf"),
        ])
        .unwrap();

        assert_eq!(config.detectors[0].model_id, "total");
        assert_eq!(config.detectors[0].base_url, "http://m:1/");
        assert_eq!(config.policy.weapon_labels, vec!["pistol", "gun"]);
        assert_eq!(config.policy.immediate_threshold, 0.9);
        assert_eq!(config.thresholds.required("total", "person"), 0.6);
        assert_eq!(config.thresholds.lookup("gunonly", "pistol"), None);
        assert_eq!(config.admission_pool_size, 4);
        assert_eq!(config.font_path, Some(PathBuf::from("/fonts/DejaVuSans.ttf")));
    }

    #[test]
    fn test_lowered_default_threshold_is_floored() {
        let config = config(&[("DEFAULT_THRESHOLD", "0.5"), ("THRESHOLD_OVERRIDES", "smoke=0.6")]).unwrap();
        assert_eq!(config.thresholds.global_default(), 0.5);
        assert_eq!(config.thresholds.required("total", "car"), 0.75);
        assert_eq!(config.thresholds.required("firesmoke", "smoke"), 0.75);
    }

    #[test]
    fn test_numeric_knobs_fall_back() {
        let config = config(&[("ADMISSION_TIMEOUT_MS", "soon"), ("MODEL_CONCURRENCY", "0")]).unwrap();
        assert_eq!(config.admission_timeout, Duration::from_millis(2000));
        assert_eq!(config.model_concurrency, 1);
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(matches!(
            config(&[("CRITICAL_THRESHOLD", "7")]),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(config(&[("DETECTOR_MODELS", " , ")]), Err(ConfigError::NoDetectors)));
        assert!(config(&[("DETECTOR_MODELS", "a=ftp://x")]).is_err());
        assert!(config(&[("DETECTOR_MODELS", "a=http://x,a=http://y")]).is_err());
        assert!(config(&[("REPORTABLE_LABELS", " ,")]).is_err());
        assert!(config(&[("DEFAULT_THRESHOLD", "high")]).is_err());
    }
}
