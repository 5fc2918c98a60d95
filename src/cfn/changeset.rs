//! Change-set previews.
//!
//! A dry run submits the planned operation as a named change set, polls
//! it to completion, collects the proposed changes for display, and
//! deletes the change set again. Deletion is unconditional: the preview
//! object never outlives the run, whatever its outcome.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PollSettings;
use crate::error::Result;

use super::clock::Clock;
use super::types::{OperationPlan, ResourceChangeSummary};

/// Change-set statuses that end polling.
const CHANGE_SET_DONE_STATES: &[&str] = &["CREATE_COMPLETE", "FAILED"];

/// The change-set operations the preview needs from the control plane.
#[async_trait]
pub trait ChangeSetOps: Send + Sync {
    /// Submits a named change set and returns its id.
    async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        plan: &OperationPlan,
    ) -> Result<String>;

    /// Fetches the current status and proposed changes of a change set.
    async fn describe_change_set(&self, change_set_id: &str) -> Result<ChangeSetDetail>;

    /// Deletes a change set.
    async fn delete_change_set(&self, change_set_id: &str) -> Result<()>;
}

/// Point-in-time view of a change set.
#[derive(Debug, Clone)]
pub struct ChangeSetDetail {
    /// Raw change-set status.
    pub status: String,
    /// Status reason, when the control plane provides one.
    pub status_reason: Option<String>,
    /// Proposed changes reported so far.
    pub changes: Vec<ResourceChangeSummary>,
}

/// Outcome of a completed preview.
///
/// `FAILED` is a reportable outcome here, not an error: a change set
/// that fails to compute (for example because there are no changes) is
/// still printed and still cleaned up.
#[derive(Debug, Clone)]
pub struct ChangePreview {
    /// Change-set id, available from the moment creation succeeds.
    pub id: String,
    /// Terminal status the change set reached.
    pub status: String,
    /// Status reason, when the control plane provides one.
    pub status_reason: Option<String>,
    /// The proposed changes.
    pub changes: Vec<ResourceChangeSummary>,
}

impl ChangePreview {
    /// Returns true when the preview computed successfully.
    #[must_use]
    pub fn computed(&self) -> bool {
        self.status == "CREATE_COMPLETE"
    }
}

/// Runs change-set previews to completion and cleans up after them.
#[derive(Debug)]
pub struct ChangeSetRunner<'a, O: ChangeSetOps, C: Clock> {
    /// Change-set operations.
    ops: &'a O,
    /// Sleep source.
    clock: &'a C,
    /// Fixed interval between polls.
    interval: Duration,
}

impl<'a, O: ChangeSetOps, C: Clock> ChangeSetRunner<'a, O, C> {
    /// Creates a runner with the given cadence.
    #[must_use]
    pub const fn new(ops: &'a O, clock: &'a C, poll: PollSettings) -> Self {
        Self {
            ops,
            clock,
            interval: poll.interval,
        }
    }

    /// Submits the plan as a change set, polls it to a terminal status,
    /// and deletes it before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the change set cannot be created at all.
    /// Once created, polling failures surface as an `UNKNOWN` status on
    /// the returned preview rather than an error, and the change set is
    /// deleted regardless.
    pub async fn preview(&self, stack_name: &str, plan: &OperationPlan) -> Result<ChangePreview> {
        let change_set_name = format!("preview-{}", Utc::now().format("%Y%m%d-%H%M%S"));
        info!("creating change set {change_set_name} for stack {stack_name}");

        let id = self
            .ops
            .create_change_set(stack_name, &change_set_name, plan)
            .await?;

        let detail = self.poll_to_terminal(&id).await;

        // The preview object must not outlive the run.
        if let Err(e) = self.ops.delete_change_set(&id).await {
            warn!("failed to delete change set {id}: {e}");
        }

        Ok(ChangePreview {
            id,
            status: detail.status,
            status_reason: detail.status_reason,
            changes: detail.changes,
        })
    }

    /// Polls the change set until a terminal status or a failed fetch.
    async fn poll_to_terminal(&self, change_set_id: &str) -> ChangeSetDetail {
        loop {
            match self.ops.describe_change_set(change_set_id).await {
                Ok(detail) => {
                    info!("change set status: {}", detail.status);
                    if CHANGE_SET_DONE_STATES.contains(&detail.status.as_str()) {
                        return detail;
                    }
                    self.clock.sleep(self.interval).await;
                }
                Err(e) => {
                    warn!("change set describe failed: {e}");
                    return ChangeSetDetail {
                        status: String::from("UNKNOWN"),
                        status_reason: Some(e.to_string()),
                        changes: vec![],
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::types::OperationMode;
    use crate::error::CloudError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedOps {
        statuses: Vec<&'static str>,
        cursor: AtomicUsize,
        deleted: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl ScriptedOps {
        fn new(statuses: Vec<&'static str>) -> Self {
            Self {
                statuses,
                cursor: AtomicUsize::new(0),
                deleted: Mutex::new(vec![]),
                fail_create: false,
            }
        }
    }

    #[async_trait]
    impl ChangeSetOps for ScriptedOps {
        async fn create_change_set(
            &self,
            _stack_name: &str,
            _change_set_name: &str,
            _plan: &OperationPlan,
        ) -> Result<String> {
            if self.fail_create {
                return Err(CloudError::api("CreateChangeSet", "denied").into());
            }
            Ok(String::from("chg123"))
        }

        async fn describe_change_set(&self, _change_set_id: &str) -> Result<ChangeSetDetail> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let status = self.statuses[index.min(self.statuses.len() - 1)];
            let changes = if status == "CREATE_COMPLETE" {
                vec![ResourceChangeSummary {
                    action: String::from("Modify"),
                    logical_id: String::from("Host"),
                    physical_id: Some(String::from("i-0abc")),
                    resource_type: String::from("AWS::EC2::Instance"),
                    replacement: Some(String::from("False")),
                }]
            } else {
                vec![]
            };
            Ok(ChangeSetDetail {
                status: status.to_string(),
                status_reason: None,
                changes,
            })
        }

        async fn delete_change_set(&self, change_set_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(change_set_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct InstantClock;

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn plan() -> OperationPlan {
        OperationPlan::new(OperationMode::Update, "https://bucket/key", vec![], vec![])
    }

    #[tokio::test]
    async fn test_preview_polls_to_completion_and_deletes() {
        let ops = ScriptedOps::new(vec!["CREATE_PENDING", "CREATE_COMPLETE"]);
        let clock = InstantClock;
        let runner = ChangeSetRunner::new(&ops, &clock, PollSettings::with_interval_secs(1));

        let preview = runner.preview("web-tier", &plan()).await.unwrap();

        assert_eq!(preview.id, "chg123");
        assert!(preview.computed());
        assert_eq!(preview.changes.len(), 1);
        assert_eq!(*ops.deleted.lock().unwrap(), vec!["chg123"]);
    }

    #[tokio::test]
    async fn test_failed_preview_is_reported_and_deleted() {
        let ops = ScriptedOps::new(vec!["FAILED"]);
        let clock = InstantClock;
        let runner = ChangeSetRunner::new(&ops, &clock, PollSettings::with_interval_secs(1));

        let preview = runner.preview("web-tier", &plan()).await.unwrap();

        assert!(!preview.computed());
        assert_eq!(preview.status, "FAILED");
        assert_eq!(*ops.deleted.lock().unwrap(), vec!["chg123"]);
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let mut ops = ScriptedOps::new(vec![]);
        ops.fail_create = true;
        let clock = InstantClock;
        let runner = ChangeSetRunner::new(&ops, &clock, PollSettings::with_interval_secs(1));

        assert!(runner.preview("web-tier", &plan()).await.is_err());
        assert!(ops.deleted.lock().unwrap().is_empty());
    }
}
