//! Alert tier definitions.
//!
//! The escalation policy assigns one tier to every processed frame:
//!
//! - `None`: nothing alert-worthy
//! - `Batch`: reportable labels survived the reportable and critical floors
//! - `Immediate`: a weapon above the hard threshold, reported on its own

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Alert urgency of a frame's aggregated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertTier {
    /// Nothing to report.
    #[default]
    None,

    /// Reportable objects that cleared every policy stage.
    Batch,

    /// Weapon detected above the immediate threshold.
    /// Bypasses the rest of the policy.
    Immediate,
}

impl AlertTier {
    /// All tiers.
    pub const ALL: &'static [AlertTier] = &[AlertTier::None, AlertTier::Batch, AlertTier::Immediate];

    /// Returns the tier name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::None => "none",
            AlertTier::Batch => "batch",
            AlertTier::Immediate => "immediate",
        }
    }

    /// Returns true if the frame should be broadcast.
    pub fn is_alert(&self) -> bool {
        !matches!(self, AlertTier::None)
    }
}

impl fmt::Display for AlertTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertTier {
    type Err = AlertTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(AlertTier::None),
            "batch" => Ok(AlertTier::Batch),
            "immediate" | "urgent" => Ok(AlertTier::Immediate),
            _ => Err(AlertTierParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown alert tier: {0}")]
pub struct AlertTierParseError(String);
