//! Stack drift detection.
//!
//! Drift detection is computed remotely: the detector triggers a
//! detection run, polls its status to completion, and reads the verdict.
//! A drifted stack is a reportable negative result, not an error.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PollSettings;
use crate::error::{CloudError, Result};

use super::clock::Clock;
use super::types::StackResourceInfo;

/// Detection statuses that end polling.
const DETECTION_DONE_STATES: &[&str] = &["DETECTION_FAILED", "DETECTION_COMPLETE"];

/// Drift verdict meaning the stack has diverged from its template.
const DRIFTED: &str = "DRIFTED";

/// The drift operations the detector needs from the control plane.
#[async_trait]
pub trait DriftOps: Send + Sync {
    /// Triggers drift detection and returns the detection id, when the
    /// control plane hands one back.
    async fn start_drift_detection(&self, stack_name: &str) -> Result<Option<String>>;

    /// Fetches the current state of a detection run.
    async fn drift_detection_status(&self, detection_id: &str) -> Result<DriftProbe>;

    /// Fetches per-resource drift information for the stack.
    async fn resource_drift_report(&self, stack_name: &str) -> Result<Vec<StackResourceInfo>>;
}

/// One poll of a detection run.
#[derive(Debug, Clone)]
pub struct DriftProbe {
    /// Detection status.
    pub status: String,
    /// Stack-level drift verdict, once known.
    pub verdict: Option<String>,
}

/// Result of a completed drift detection.
#[derive(Debug, Clone)]
pub struct DriftOutcome {
    /// Id of the detection run.
    pub detection_id: String,
    /// Terminal detection status.
    pub status: String,
    /// Stack-level drift verdict.
    pub verdict: String,
    /// Per-resource report; populated in verbose mode when drifted.
    pub resources: Vec<StackResourceInfo>,
}

impl DriftOutcome {
    /// Returns true when the stack has not drifted from its template.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.verdict != DRIFTED
    }
}

/// Detector driving remote drift computation to a verdict.
#[derive(Debug)]
pub struct DriftDetector<'a, O: DriftOps, C: Clock> {
    /// Drift operations.
    ops: &'a O,
    /// Sleep source.
    clock: &'a C,
    /// Fixed interval between polls.
    interval: Duration,
    /// Whether to fetch the per-resource report for drifted stacks.
    verbose: bool,
}

impl<'a, O: DriftOps, C: Clock> DriftDetector<'a, O, C> {
    /// Creates a detector with the given cadence.
    #[must_use]
    pub const fn new(ops: &'a O, clock: &'a C, poll: PollSettings, verbose: bool) -> Self {
        Self {
            ops,
            clock,
            interval: poll.interval,
            verbose,
        }
    }

    /// Runs drift detection to completion and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if detection cannot be started or a status poll
    /// fails outright.
    pub async fn determine_drift(&self, stack_name: &str) -> Result<DriftOutcome> {
        let Some(detection_id) = self.ops.start_drift_detection(stack_name).await? else {
            warn!("no detection id returned for {stack_name}");
            return Err(CloudError::DetectionNotStarted {
                stack: stack_name.to_string(),
            }
            .into());
        };

        info!("drift detection started: {detection_id} - polling");

        let mut probe;
        loop {
            self.clock.sleep(self.interval).await;
            probe = self.ops.drift_detection_status(&detection_id).await?;
            info!("drift detection status: {}", probe.status);
            if DETECTION_DONE_STATES.contains(&probe.status.as_str()) {
                break;
            }
        }

        let verdict = probe.verdict.unwrap_or_else(|| String::from("UNKNOWN"));
        info!("drift of {stack_name}: {verdict}");

        let resources = if verdict == DRIFTED && self.verbose {
            self.ops.resource_drift_report(stack_name).await?
        } else {
            vec![]
        };

        Ok(DriftOutcome {
            detection_id,
            status: probe.status,
            verdict,
            resources,
        })
    }
}
