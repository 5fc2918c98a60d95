//! Deployment settings types.
//!
//! This module defines the structs that map to the deployment settings
//! file. The settings fully describe one stack convergence run: which
//! stack to drive, where its template lives, and which parameter and
//! tag values to send.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Environment variable overriding the poll interval, in seconds.
pub const POLL_INTERVAL_VAR: &str = "CUMULUS_POLL_INTERVAL";

/// Default interval between status polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// The root settings structure for a convergence run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Settings {
    /// Target environment settings.
    pub environment: EnvironmentSettings,
    /// Caller-supplied stack parameter values.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Tags to stamp on the stack.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Context values for pre-submission template rendering.
    ///
    /// When non-empty the template file is expanded against this mapping
    /// before it is classified or sent anywhere.
    #[serde(default)]
    pub meta_parameters: BTreeMap<String, String>,
}

/// Target environment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EnvironmentSettings {
    /// Name of the stack to converge.
    #[serde(default)]
    pub stack_name: Option<String>,
    /// Bucket receiving the archived template and parameter set.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Path to the stack template file.
    #[serde(default)]
    pub template: Option<String>,
    /// AWS region (falls back to the ambient default chain).
    #[serde(default)]
    pub region: Option<String>,
    /// AWS credentials profile.
    #[serde(default)]
    pub profile: Option<String>,
}

impl Settings {
    /// Validates that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::MissingField` naming the first absent
    /// required field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("stack_name", &self.environment.stack_name),
            ("bucket", &self.environment.bucket),
            ("template", &self.environment.template),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Returns the stack name. Call [`Settings::validate`] first.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        self.environment.stack_name.as_deref().unwrap_or_default()
    }

    /// Returns the archive bucket. Call [`Settings::validate`] first.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.environment.bucket.as_deref().unwrap_or_default()
    }

    /// Returns the template path. Call [`Settings::validate`] first.
    #[must_use]
    pub fn template(&self) -> &str {
        self.environment.template.as_deref().unwrap_or_default()
    }
}

/// Polling configuration threaded through every poll loop.
///
/// There is deliberately no process-wide default; callers construct one
/// at the boundary and pass it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed interval between status polls.
    pub interval: Duration,
}

impl PollSettings {
    /// Creates poll settings with an explicit interval in seconds.
    #[must_use]
    pub const fn with_interval_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs),
        }
    }

    /// Creates poll settings from the environment override, falling back
    /// to the default interval.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_interval_secs(parse_interval(std::env::var(POLL_INTERVAL_VAR).ok()))
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::with_interval_secs(DEFAULT_POLL_INTERVAL_SECS)
    }
}

/// Parses the poll interval override, ignoring unparseable values.
fn parse_interval(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
}
