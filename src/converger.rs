//! Stack convergence engine.
//!
//! This module decides what one run does to the remote stack and drives
//! it to a terminal outcome. The disposition logic is the heart of it: a
//! stack that was never successfully created (or is stuck in a rollback
//! terminal) blocks both create and update, so the converger deletes it
//! and waits for the deletion before anything else happens. A run never
//! leaves a stack in that blocking state without either fully deleting
//! it or failing loudly.

use tracing::{info, warn};

use crate::cfn::{
    classify_status, Clock, ControlPlane, OperationMode, OperationPlan, StackDisposition,
    StackPoller,
};
use crate::config::PollSettings;
use crate::error::{CloudError, Result};

/// Outcome of one convergence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeOutcome {
    /// The stack reached a successful terminal status.
    Converged,
    /// The stack reached a failed terminal status, or polling aborted.
    Failed,
    /// The operation was submitted but not polled.
    Started,
}

/// Convergence engine for a single stack.
#[derive(Debug)]
pub struct Converger<'a, P: ControlPlane, C: Clock> {
    /// Control plane.
    plane: &'a P,
    /// Sleep source for polling.
    clock: &'a C,
    /// Polling cadence.
    poll: PollSettings,
}

impl<'a, P: ControlPlane, C: Clock> Converger<'a, P, C> {
    /// Creates a converger.
    #[must_use]
    pub const fn new(plane: &'a P, clock: &'a C, poll: PollSettings) -> Self {
        Self { plane, clock, poll }
    }

    /// Classifies the remote stack, remediating blocking states.
    ///
    /// A stack in a blocking state is deleted and the deletion polled to
    /// completion before classification re-fetches and returns; the
    /// remote stack is externally mutable, so nothing here is cached.
    ///
    /// # Errors
    ///
    /// Returns `ReconciliationFailed` when a blocking stack cannot be
    /// deleted, or the describe call fails.
    pub async fn classify(&self, stack_name: &str) -> Result<StackDisposition> {
        let Some(snapshot) = self.plane.fetch_snapshot(stack_name).await? else {
            return Ok(StackDisposition::Creatable);
        };

        let disposition = classify_status(&snapshot.status);
        if disposition != StackDisposition::MustDeleteFirst {
            return Ok(disposition);
        }

        info!(
            "stack {stack_name} is in {} and must be deleted before recreation",
            snapshot.status
        );
        self.plane.delete_stack(stack_name).await?;

        let poller = StackPoller::new(self.plane, self.clock, self.poll);
        if !poller.wait(stack_name).await {
            return Err(CloudError::ReconciliationFailed {
                stack: stack_name.to_string(),
            }
            .into());
        }

        match self.plane.fetch_snapshot(stack_name).await? {
            None => Ok(StackDisposition::Creatable),
            Some(snapshot) => Ok(classify_status(&snapshot.status)),
        }
    }

    /// Classifies the stack and maps the result onto the operation the
    /// run should submit.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStackState` when the stack is in a state that
    /// supports neither create nor update; this is surfaced, never
    /// silently coerced.
    pub async fn plan_mode(&self, stack_name: &str) -> Result<OperationMode> {
        match self.classify(stack_name).await? {
            StackDisposition::Creatable | StackDisposition::Absent => Ok(OperationMode::Create),
            StackDisposition::Updatable => Ok(OperationMode::Update),
            StackDisposition::MustDeleteFirst => Err(CloudError::ReconciliationFailed {
                stack: stack_name.to_string(),
            }
            .into()),
            StackDisposition::Unknown => {
                let status = self
                    .plane
                    .fetch_snapshot(stack_name)
                    .await?
                    .map_or_else(|| String::from("UNKNOWN"), |s| s.status);
                Err(CloudError::UnknownStackState {
                    stack: stack_name.to_string(),
                    status,
                }
                .into())
            }
        }
    }

    /// Submits the plan and optionally polls it to a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission itself is rejected; a failed
    /// poll is reported through the outcome, not an error.
    pub async fn converge(
        &self,
        stack_name: &str,
        plan: &OperationPlan,
        poll: bool,
    ) -> Result<ConvergeOutcome> {
        let stack_id = match plan.mode {
            OperationMode::Create => self.plane.create_stack(stack_name, plan).await?,
            OperationMode::Update => self.plane.update_stack(stack_name, plan).await?,
        };
        info!("stack {} started: {stack_id}", plan.mode);

        if !poll {
            return Ok(ConvergeOutcome::Started);
        }

        let poller = StackPoller::new(self.plane, self.clock, self.poll);
        if poller.wait(stack_name).await {
            Ok(ConvergeOutcome::Converged)
        } else {
            Ok(ConvergeOutcome::Failed)
        }
    }

    /// Deletes the stack and polls the deletion to completion.
    ///
    /// Returns `false` without deleting anything when the stack does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the pre-flight describe or the delete call
    /// fails.
    pub async fn delete(&self, stack_name: &str) -> Result<bool> {
        if self.plane.fetch_snapshot(stack_name).await?.is_none() {
            warn!("stack {stack_name} does not exist; nothing to delete");
            return Ok(false);
        }

        self.plane.delete_stack(stack_name).await?;

        let poller = StackPoller::new(self.plane, self.clock, self.poll);
        Ok(poller.wait(stack_name).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::StackSnapshot;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    enum Probe {
        Status(&'static str),
        Gone,
    }

    #[derive(Default)]
    struct FakePlane {
        probes: Mutex<Vec<Probe>>,
        cursor: AtomicUsize,
        deletes: AtomicUsize,
        creates: AtomicUsize,
        updates: AtomicUsize,
    }

    impl FakePlane {
        fn scripted(probes: Vec<Probe>) -> Self {
            Self {
                probes: Mutex::new(probes),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ControlPlane for FakePlane {
        async fn fetch_snapshot(&self, stack_name: &str) -> Result<Option<StackSnapshot>> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let probes = self.probes.lock().unwrap();
            match probes[index.min(probes.len() - 1)] {
                Probe::Status(status) => Ok(Some(StackSnapshot {
                    name: stack_name.to_string(),
                    status: status.to_string(),
                    stack_id: Some(String::from("arn:stack/1")),
                })),
                Probe::Gone => Ok(None),
            }
        }

        async fn delete_stack(&self, _stack_name: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_stack(&self, _stack_name: &str, _plan: &OperationPlan) -> Result<String> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(String::from("arn:stack/1"))
        }

        async fn update_stack(&self, _stack_name: &str, _plan: &OperationPlan) -> Result<String> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(String::from("arn:stack/1"))
        }
    }

    #[derive(Default)]
    struct InstantClock;

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn converger<'a>(plane: &'a FakePlane, clock: &'a InstantClock) -> Converger<'a, FakePlane, InstantClock> {
        Converger::new(plane, clock, PollSettings::with_interval_secs(1))
    }

    #[tokio::test]
    async fn test_stable_stack_classifies_updatable_twice() {
        let plane = FakePlane::scripted(vec![
            Probe::Status("UPDATE_COMPLETE"),
            Probe::Status("UPDATE_COMPLETE"),
        ]);
        let clock = InstantClock;
        let converger = converger(&plane, &clock);

        assert_eq!(
            converger.classify("web-tier").await.unwrap(),
            StackDisposition::Updatable
        );
        assert_eq!(
            converger.classify("web-tier").await.unwrap(),
            StackDisposition::Updatable
        );
        assert_eq!(plane.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_stack_is_creatable() {
        let plane = FakePlane::scripted(vec![Probe::Gone]);
        let clock = InstantClock;

        assert_eq!(
            converger(&plane, &clock).classify("web-tier").await.unwrap(),
            StackDisposition::Creatable
        );
    }

    #[tokio::test]
    async fn test_rollback_terminal_is_deleted_then_creatable() {
        // classify sees the blocking status, deletes, polls the delete
        // through, then re-classifies from a fresh describe.
        let plane = FakePlane::scripted(vec![
            Probe::Status("ROLLBACK_COMPLETE"),
            Probe::Status("DELETE_IN_PROGRESS"),
            Probe::Gone,
            Probe::Gone,
        ]);
        let clock = InstantClock;

        let disposition = converger(&plane, &clock).classify("web-tier").await.unwrap();

        assert_eq!(disposition, StackDisposition::Creatable);
        assert_eq!(plane.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_remediation_is_loud() {
        let plane = FakePlane::scripted(vec![
            Probe::Status("ROLLBACK_COMPLETE"),
            Probe::Status("DELETE_FAILED"),
        ]);
        let clock = InstantClock;

        let err = converger(&plane, &clock)
            .classify("web-tier")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("could not be deleted"));
    }

    #[tokio::test]
    async fn test_unknown_state_is_surfaced() {
        let plane = FakePlane::scripted(vec![
            Probe::Status("UPDATE_IN_PROGRESS"),
            Probe::Status("UPDATE_IN_PROGRESS"),
        ]);
        let clock = InstantClock;

        let err = converger(&plane, &clock)
            .plan_mode("web-tier")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("UPDATE_IN_PROGRESS"));
        assert_eq!(plane.creates.load(Ordering::SeqCst), 0);
        assert_eq!(plane.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_converge_create_to_completion() {
        let plane = FakePlane::scripted(vec![Probe::Status("CREATE_COMPLETE")]);
        let clock = InstantClock;
        let plan = OperationPlan::new(OperationMode::Create, "https://bucket/key", vec![], vec![]);

        let outcome = converger(&plane, &clock)
            .converge("web-tier", &plan, true)
            .await
            .unwrap();

        assert_eq!(outcome, ConvergeOutcome::Converged);
        assert_eq!(plane.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_converge_without_polling_reports_started() {
        let plane = FakePlane::scripted(vec![Probe::Status("UPDATE_COMPLETE")]);
        let clock = InstantClock;
        let plan = OperationPlan::new(OperationMode::Update, "https://bucket/key", vec![], vec![]);

        let outcome = converger(&plane, &clock)
            .converge("web-tier", &plan, false)
            .await
            .unwrap();

        assert_eq!(outcome, ConvergeOutcome::Started);
        assert_eq!(plane.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_stack_reports_false() {
        let plane = FakePlane::scripted(vec![Probe::Gone]);
        let clock = InstantClock;

        let deleted = converger(&plane, &clock).delete("web-tier").await.unwrap();

        assert!(!deleted);
        assert_eq!(plane.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_polls_vanishing_stack_to_success() {
        let plane = FakePlane::scripted(vec![
            Probe::Status("CREATE_COMPLETE"),
            Probe::Status("DELETE_IN_PROGRESS"),
            Probe::Gone,
        ]);
        let clock = InstantClock;

        let deleted = converger(&plane, &clock).delete("web-tier").await.unwrap();

        assert!(deleted);
        assert_eq!(plane.deletes.load(Ordering::SeqCst), 1);
    }
}
