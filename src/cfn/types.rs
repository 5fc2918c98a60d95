//! Control-plane types and status classification.
//!
//! This module defines the data carried to and from the stack API and
//! the status-string classification that decides whether a convergence
//! run creates, updates, or first deletes the remote stack.

use async_trait::async_trait;

use crate::error::Result;

/// Terminal statuses that count as a successful convergence.
pub const CONVERGED_STATES: &[&str] =
    &["CREATE_COMPLETE", "UPDATE_COMPLETE", "DELETE_COMPLETE"];

/// Statuses of stacks that are stable and eligible for update.
const UPDATABLE_STATES: &[&str] =
    &["CREATE_COMPLETE", "UPDATE_COMPLETE", "UPDATE_ROLLBACK_COMPLETE"];

/// Statuses of stacks that block both create and update until the stack
/// is deleted: never successfully created, or stuck in a rollback
/// terminal.
const MUST_DELETE_STATES: &[&str] = &[
    "ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
    "REVIEW_IN_PROGRESS",
    "CREATE_FAILED",
];

/// A point-in-time read of the remote stack.
///
/// Snapshots are never cached; the remote stack is externally mutable,
/// so every decision re-fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSnapshot {
    /// Stack name.
    pub name: String,
    /// Raw remote status string.
    pub status: String,
    /// Stack identifier, when the control plane reports one.
    pub stack_id: Option<String>,
}

/// What the next operation against the stack should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDisposition {
    /// The stack record exists but is fully deleted.
    Absent,
    /// The stack does not exist; create it.
    Creatable,
    /// The stack is stable; update it.
    Updatable,
    /// The stack blocks updates and must be deleted before recreation.
    MustDeleteFirst,
    /// The status is unrecognized; do not proceed.
    Unknown,
}

/// Classifies a raw remote status string.
///
/// Unrecognized statuses (including every in-progress status) map to
/// [`StackDisposition::Unknown`] and are surfaced to the caller rather
/// than coerced into a create or update.
#[must_use]
pub fn classify_status(status: &str) -> StackDisposition {
    if MUST_DELETE_STATES.contains(&status) {
        StackDisposition::MustDeleteFirst
    } else if UPDATABLE_STATES.contains(&status) {
        StackDisposition::Updatable
    } else if status == "DELETE_COMPLETE" {
        StackDisposition::Absent
    } else {
        StackDisposition::Unknown
    }
}

/// Returns true when a status string means the asynchronous remote
/// operation has finished, for better or worse.
#[must_use]
pub fn is_terminal_status(status: &str) -> bool {
    status.ends_with("COMPLETE") || status.ends_with("FAILED")
}

/// Whether a run creates a new stack or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Create a new stack.
    Create,
    /// Update an existing stack.
    Update,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Everything one stack submission needs. Built once per run and
/// immutable once submitted.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    /// Create or update.
    pub mode: OperationMode,
    /// Object-store URL of the archived template.
    pub template_url: String,
    /// Parameter key/value pairs to send.
    pub parameters: Vec<(String, String)>,
    /// Tag key/value pairs to stamp on the stack.
    pub tags: Vec<(String, String)>,
    /// Idempotency token for the submission.
    pub client_token: String,
}

impl OperationPlan {
    /// Creates a plan with a fresh client token.
    #[must_use]
    pub fn new(
        mode: OperationMode,
        template_url: impl Into<String>,
        parameters: Vec<(String, String)>,
        tags: Vec<(String, String)>,
    ) -> Self {
        Self {
            mode,
            template_url: template_url.into(),
            parameters,
            tags,
            client_token: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// One stack in a region listing.
#[derive(Debug, Clone)]
pub struct StackListing {
    /// Stack name.
    pub name: String,
    /// Current status.
    pub status: String,
}

/// One resource belonging to a stack, with its drift information.
#[derive(Debug, Clone)]
pub struct StackResourceInfo {
    /// Logical resource id from the template.
    pub logical_id: String,
    /// Physical id of the provisioned resource.
    pub physical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Current resource status.
    pub resource_status: String,
    /// Drift status of the resource.
    pub drift_status: String,
}

/// One stack event, for failure reporting.
#[derive(Debug, Clone)]
pub struct StackEventInfo {
    /// When the event happened.
    pub timestamp: String,
    /// Resource status the event reports.
    pub status: String,
    /// Logical id of the resource the event concerns.
    pub logical_id: String,
    /// Status reason, when the control plane provides one.
    pub reason: Option<String>,
}

/// The stack operations convergence needs from the control plane.
///
/// The production implementation is [`crate::cfn::CfnClient`]; tests
/// substitute scripted fakes.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetches the current stack snapshot.
    ///
    /// Returns `Ok(None)` when the control plane reports that the stack
    /// does not exist; other failures are errors.
    async fn fetch_snapshot(&self, stack_name: &str) -> Result<Option<StackSnapshot>>;

    /// Starts deletion of the stack.
    async fn delete_stack(&self, stack_name: &str) -> Result<()>;

    /// Submits a stack creation and returns the new stack id.
    async fn create_stack(&self, stack_name: &str, plan: &OperationPlan) -> Result<String>;

    /// Submits a stack update and returns the stack id.
    async fn update_stack(&self, stack_name: &str, plan: &OperationPlan) -> Result<String>;
}

/// One proposed change from a change-set preview.
#[derive(Debug, Clone)]
pub struct ResourceChangeSummary {
    /// Action the change would take (Add, Modify, Remove).
    pub action: String,
    /// Logical id of the affected resource.
    pub logical_id: String,
    /// Physical id, when the resource already exists.
    pub physical_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Whether the change replaces the resource.
    pub replacement: Option<String>,
}
