//! Drop-within-window gates for high-frequency updates.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// How an update request interacts with its gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Dropped when it arrives within the window of the last admitted one.
    Throttled,
    /// Always admitted. Does not open a new window.
    Immediate,
}

/// Admits at most one throttled update per `min_interval`. Rejected updates
/// are dropped, not deferred.
pub struct UpdateGate {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl UpdateGate {
    /// A zero interval admits everything.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter }
    }

    pub fn admit(&self, kind: UpdateKind) -> bool {
        match kind {
            UpdateKind::Immediate => true,
            UpdateKind::Throttled => self
                .limiter
                .as_ref()
                .map_or(true, |limiter| limiter.check().is_ok()),
        }
    }
}

impl std::fmt::Debug for UpdateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateGate")
            .field("throttled", &self.limiter.is_some())
            .finish()
    }
}
