//! P2P services
//!
//! - [`Peer`]: one remote node, its sockets and its pending requests
//! - [`PeerPool`]: every peer we talk to, selection and discovery probes
//! - [`P2P`]: listener, handshake checks, peer book, bans and the jobs
//!
//! Peers never call back into the pool or the service. They raise events on a
//! channel drained by the service's event loop, which updates its tables and
//! then forwards each event to subscribers.

pub mod events;
mod p2p;
mod peer;
mod peer_pool;
mod request;

pub use events::P2PEvent;
pub use p2p::{NetworkStatus, P2P};
pub use peer::Peer;
pub use peer_pool::PeerPool;
pub use request::P2PRequest;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

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
