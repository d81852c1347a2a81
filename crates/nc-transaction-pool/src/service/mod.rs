//! Pool services
//!
//! Two pool designs share the same ports:
//!
//! - [`TransactionPool`]: staged pipeline, received → validated → verified →
//!   pending/ready, driven by interval jobs
//! - [`FeePriorityPool`]: single fee-ranked pool with nonce-based
//!   processability and a reorganize job
//!
//! Each recurring job holds a [`JobGuard`] for its run, so a tick that fires
//! while the previous run is still in flight is skipped.

mod fee_priority;
mod staged;

#[cfg(test)]
pub(crate) mod test_support;

pub use fee_priority::FeePriorityPool;
pub use staged::TransactionPool;

use crate::ports::{SystemTimeSource, TimeSource, TransactionChecks};
use shared_bus::EventPublisher;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Dependencies for both pool services
pub struct PoolDependencies {
    pub checks: Arc<dyn TransactionChecks>,
    pub event_bus: Arc<dyn EventPublisher>,
    pub time_source: Arc<dyn TimeSource>,
}

impl PoolDependencies {
    pub fn new(checks: Arc<dyn TransactionChecks>, event_bus: Arc<dyn EventPublisher>) -> Self {
        Self {
            checks,
            event_bus,
            time_source: Arc::new(SystemTimeSource),
        }
    }

    /// Replace the clock (for testing)
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }
}

/// Marks a job as running until dropped.
pub(crate) struct JobGuard<'a>(&'a AtomicBool);

impl<'a> JobGuard<'a> {
    /// `None` when the job is already running.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs `job` every `period`, first tick after one period.
pub(crate) fn spawn_interval<F, Fut>(period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            job().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_guard_blocks_reentry() {
        let flag = AtomicBool::new(false);
        let guard = JobGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(JobGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(JobGuard::acquire(&flag).is_some());
    }
}
