//! CloudFormation control-plane integration module.
//!
//! This module provides all functionality for driving the remote stack
//! API: the client, status classification, convergence polling, change
//! set previews and drift detection.

mod changeset;
mod client;
mod clock;
mod drift;
mod poller;
mod types;

pub use changeset::{ChangePreview, ChangeSetDetail, ChangeSetOps, ChangeSetRunner};
pub use client::{load_aws_config, CfnClient};
pub use clock::{Clock, SystemClock};
pub use drift::{DriftDetector, DriftOps, DriftOutcome, DriftProbe};
pub use poller::StackPoller;
pub use types::{
    classify_status, is_terminal_status, ControlPlane, OperationMode, OperationPlan,
    ResourceChangeSummary, StackDisposition, StackEventInfo, StackListing, StackResourceInfo,
    StackSnapshot, CONVERGED_STATES,
};
