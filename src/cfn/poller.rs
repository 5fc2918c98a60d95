//! Convergence polling.
//!
//! After a create, update, or delete is submitted the caller blocks here
//! until the remote stack reaches a terminal status. Polling is a fixed
//! cadence with no backoff and no internal timeout; the loop runs until
//! the control plane reports a terminal signal or the process dies.

use std::time::Duration;
use tracing::{error, info};

use crate::config::PollSettings;

use super::clock::Clock;
use super::types::{is_terminal_status, ControlPlane, CONVERGED_STATES};

/// Poller driving a stack operation to its terminal status.
#[derive(Debug)]
pub struct StackPoller<'a, P: ControlPlane, C: Clock> {
    /// Control plane to poll.
    plane: &'a P,
    /// Sleep source.
    clock: &'a C,
    /// Fixed interval between polls.
    interval: Duration,
}

impl<'a, P: ControlPlane, C: Clock> StackPoller<'a, P, C> {
    /// Creates a poller with the given cadence.
    #[must_use]
    pub const fn new(plane: &'a P, clock: &'a C, poll: PollSettings) -> Self {
        Self {
            plane,
            clock,
            interval: poll.interval,
        }
    }

    /// Blocks until the stack reaches a terminal status.
    ///
    /// Returns `true` when the terminal status is in the converged set.
    /// A stack that vanishes between polls is a delete that raced to
    /// completion and also counts as success. Any other fetch failure
    /// aborts the poll with `false`.
    pub async fn wait(&self, stack_name: &str) -> bool {
        info!(
            "polling stack status, interval={}s",
            self.interval.as_secs()
        );
        self.clock.sleep(self.interval).await;

        loop {
            match self.plane.fetch_snapshot(stack_name).await {
                Ok(Some(snapshot)) => {
                    info!("current status of {stack_name}: {}", snapshot.status);
                    if is_terminal_status(&snapshot.status) {
                        return CONVERGED_STATES.contains(&snapshot.status.as_str());
                    }
                    self.clock.sleep(self.interval).await;
                }
                Ok(None) => {
                    // The stack vanished between polls: a delete raced to
                    // completion. Only this condition is treated as gone.
                    info!("{stack_name} is gone");
                    return true;
                }
                Err(e) => {
                    error!("status poll for {stack_name} failed: {e}");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::types::{OperationPlan, StackSnapshot};
    use crate::error::{CloudError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// One scripted answer to a status poll.
    enum Probe {
        Status(&'static str),
        Gone,
        Fail,
    }

    struct ScriptedPlane {
        probes: Mutex<Vec<Probe>>,
        cursor: AtomicUsize,
    }

    impl ScriptedPlane {
        fn new(probes: Vec<Probe>) -> Self {
            Self {
                probes: Mutex::new(probes),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ControlPlane for ScriptedPlane {
        async fn fetch_snapshot(&self, stack_name: &str) -> Result<Option<StackSnapshot>> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let probes = self.probes.lock().unwrap();
            match probes[index.min(probes.len() - 1)] {
                Probe::Status(status) => Ok(Some(StackSnapshot {
                    name: stack_name.to_string(),
                    status: status.to_string(),
                    stack_id: None,
                })),
                Probe::Gone => Ok(None),
                Probe::Fail => Err(CloudError::api("DescribeStacks", "throttled").into()),
            }
        }

        async fn delete_stack(&self, _stack_name: &str) -> Result<()> {
            unreachable!("poller never deletes")
        }

        async fn create_stack(&self, _stack_name: &str, _plan: &OperationPlan) -> Result<String> {
            unreachable!("poller never creates")
        }

        async fn update_stack(&self, _stack_name: &str, _plan: &OperationPlan) -> Result<String> {
            unreachable!("poller never updates")
        }
    }

    /// Clock that counts sleeps without sleeping.
    #[derive(Default)]
    struct InstantClock {
        sleeps: AtomicUsize,
    }

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poller<'a>(
        plane: &'a ScriptedPlane,
        clock: &'a InstantClock,
    ) -> StackPoller<'a, ScriptedPlane, InstantClock> {
        StackPoller::new(plane, clock, PollSettings::with_interval_secs(1))
    }

    #[tokio::test]
    async fn test_sequence_ending_in_converged_state_succeeds() {
        let plane = ScriptedPlane::new(vec![
            Probe::Status("CREATE_IN_PROGRESS"),
            Probe::Status("CREATE_IN_PROGRESS"),
            Probe::Status("CREATE_COMPLETE"),
        ]);
        let clock = InstantClock::default();

        assert!(poller(&plane, &clock).wait("web-tier").await);
        // One lead-in sleep plus one per non-terminal probe.
        assert_eq!(clock.sleeps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sequence_ending_in_failed_state_fails() {
        let plane = ScriptedPlane::new(vec![
            Probe::Status("UPDATE_IN_PROGRESS"),
            Probe::Status("UPDATE_ROLLBACK_FAILED"),
        ]);
        let clock = InstantClock::default();

        assert!(!poller(&plane, &clock).wait("web-tier").await);
    }

    #[tokio::test]
    async fn test_non_converged_complete_state_fails() {
        // Terminal, but not in the converged set.
        let plane = ScriptedPlane::new(vec![Probe::Status("ROLLBACK_COMPLETE")]);
        let clock = InstantClock::default();

        assert!(!poller(&plane, &clock).wait("web-tier").await);
    }

    #[tokio::test]
    async fn test_vanished_stack_counts_as_deleted() {
        let plane = ScriptedPlane::new(vec![Probe::Status("DELETE_IN_PROGRESS"), Probe::Gone]);
        let clock = InstantClock::default();

        assert!(poller(&plane, &clock).wait("web-tier").await);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_poll() {
        let plane = ScriptedPlane::new(vec![Probe::Status("CREATE_IN_PROGRESS"), Probe::Fail]);
        let clock = InstantClock::default();

        assert!(!poller(&plane, &clock).wait("web-tier").await);
    }
}
