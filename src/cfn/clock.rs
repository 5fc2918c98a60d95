//! Sleep abstraction for poll loops.
//!
//! Every polling loop sleeps through a [`Clock`] so tests can substitute
//! a fake and run deterministically.

use async_trait::async_trait;
use std::time::Duration;

/// Source of sleeps for poll loops.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Sleeps for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
