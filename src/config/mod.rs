//! Configuration module for the Cumulus convergence tool.
//!
//! This module provides typed deployment settings, loading from YAML
//! files, and environment-driven polling configuration.

mod loader;
mod settings;

pub use loader::SettingsLoader;
pub use settings::{
    EnvironmentSettings, PollSettings, Settings, DEFAULT_POLL_INTERVAL_SECS, POLL_INTERVAL_VAR,
};
