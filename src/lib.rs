// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Cumulus
//!
//! A declarative convergence tool for AWS CloudFormation stacks.
//!
//! ## Overview
//!
//! Cumulus drives a declared stack template to a running stack:
//!
//! - Classify the template encoding (JSON or YAML) by trial decoding
//! - Resolve parameters from defaults, the SSM parameter store, and
//!   interactive prompts
//! - Archive the resolved template and parameters to S3
//! - Decide whether the stack must be created, updated, or deleted and
//!   recreated
//! - Optionally preview the operation as a change set before committing
//! - Poll the asynchronous remote lifecycle to a terminal outcome
//!
//! ## Architecture
//!
//! The system is built around **stack disposition**:
//!
//! 1. **Declared state**: the template and settings file
//! 2. **Remote state**: a point-in-time stack snapshot, never cached
//! 3. **Converger**: classifies the snapshot and submits the operation
//!    that moves the stack toward the declared state
//!
//! ## Modules
//!
//! - [`config`]: Settings parsing and validation
//! - [`template`]: Template classification and rendering
//! - [`params`]: Parameter resolution
//! - [`cfn`]: CloudFormation client, polling, change sets and drift
//! - [`archive`]: Artifact archival to S3
//! - [`converger`]: The convergence engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! environment:
//!   stack_name: web-tier
//!   bucket: deploy-artifacts
//!   template: templates/web.yaml
//!   region: us-east-2
//!
//! parameters:
//!   InstanceType: t3.large
//!   DbPassword: "[ssm:/prod/db/password]"
//!
//! tags:
//!   team: platform
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod archive;
pub mod cfn;
pub mod cli;
pub mod config;
pub mod converger;
pub mod error;
pub mod params;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use archive::{ArchiveReceipt, Archiver};
pub use cfn::{
    CfnClient, ChangePreview, ChangeSetRunner, Clock, ControlPlane, DriftDetector, DriftOutcome,
    OperationMode, OperationPlan, StackDisposition, StackPoller, StackSnapshot, SystemClock,
};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{PollSettings, Settings, SettingsLoader};
pub use converger::{ConvergeOutcome, Converger};
pub use error::{CumulusError, Result};
pub use params::{ParameterResolver, ParameterSet, SsmSecretStore, TerminalPrompt};
pub use template::{TemplateDescriptor, TemplateEncoding};
