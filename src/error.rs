//! Error types for the Cumulus convergence tool.
//!
//! This module provides the error hierarchy for all operations in the
//! stack lifecycle: configuration, template handling, parameter
//! resolution, and the CloudFormation control plane.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Cumulus operations.
#[derive(Debug, Error)]
pub enum CumulusError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template loading and rendering errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Parameter resolution errors.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Control-plane and archive errors.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file was not found.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The settings file could not be parsed.
    #[error("Failed to parse settings: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required settings field is absent.
    #[error("Missing required setting: environment.{field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Template loading and rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file was not found.
    #[error("Template file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The template decoded in neither supported encoding.
    #[error("Template is not valid JSON or YAML, or has no Resources section: {path}")]
    Unreadable {
        /// Path to the rejected file.
        path: PathBuf,
    },

    /// Rendering the template against the meta-parameters failed.
    #[error("Template rendering failed: {message}")]
    RenderFailed {
        /// Description of the rendering failure.
        message: String,
    },
}

/// Parameter resolution errors.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A required template parameter has no value after resolution.
    #[error("No value for required template parameter: {name}")]
    MissingParameter {
        /// Name of the unresolved parameter.
        name: String,
    },

    /// A referenced secret does not exist in the secret store.
    #[error("Secret not found in parameter store: {name}")]
    SecretResolutionFailed {
        /// Name of the missing secret.
        name: String,
    },

    /// The interactive prompt could not be completed.
    #[error("Interactive prompt failed: {message}")]
    PromptFailed {
        /// Description of the prompt failure.
        message: String,
    },
}

/// Control-plane and archive errors.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A control-plane API call failed.
    #[error("CloudFormation {operation} failed: {message}")]
    ApiError {
        /// The API operation that failed.
        operation: String,
        /// Error message from the service.
        message: String,
    },

    /// A stack could not be brought out of a blocking state.
    #[error("Failed to reconcile stack '{stack}': pre-existing stack could not be deleted")]
    ReconciliationFailed {
        /// Name of the stack.
        stack: String,
    },

    /// The stack is in a state that supports neither create nor update.
    #[error("Stack '{stack}' is in unexpected state {status}; not proceeding")]
    UnknownStackState {
        /// Name of the stack.
        stack: String,
        /// The unrecognized remote status.
        status: String,
    },

    /// Archiving artifacts to the object store failed.
    #[error("Artifact archive failed: {message}")]
    ArchiveFailed {
        /// Description of the archive failure.
        message: String,
    },

    /// A secret-store lookup failed for transport reasons.
    #[error("Secret store lookup for '{name}' failed: {message}")]
    SecretLookup {
        /// Name of the secret being read.
        name: String,
        /// Description of the lookup failure.
        message: String,
    },

    /// Drift detection did not hand back a detection id.
    #[error("Drift detection was not started for stack '{stack}'")]
    DetectionNotStarted {
        /// Name of the stack.
        stack: String,
    },
}

/// Result type alias for Cumulus operations.
pub type Result<T> = std::result::Result<T, CumulusError>;

impl CumulusError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a parse error with the given message and optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl CloudError {
    /// Creates an API error for the named operation.
    #[must_use]
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an archive error with the given message.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::ArchiveFailed {
            message: message.into(),
        }
    }
}
