//! Rate limiting for outbound position broadcasts

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::Clock,
    middleware::NoOpMiddleware,
    nanos::Nanos,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use super::time::Millis;

/// Minimum spacing between two `updatePosition` sends
pub const POSITION_SEND_INTERVAL: Duration = Duration::from_millis(33);

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Quota of one cell per `interval`, no burst
fn quota_every(interval: Duration) -> Quota {
    Quota::with_period(interval)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(NonZeroU32::MIN)
}

/// Governor clock that reads the simulation's millisecond clock.
///
/// Clones share one reading. It never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    nanos: Arc<AtomicU64>,
}

impl TickClock {
    /// Move the clock to `now`; earlier readings are ignored
    pub fn set(&self, now: Millis) {
        self.nanos
            .fetch_max(now.saturating_mul(NANOS_PER_MILLI), Ordering::AcqRel);
    }
}

impl Clock for TickClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        Nanos::from(self.nanos.load(Ordering::Acquire))
    }
}

/// Gate for the local state broadcast.
///
/// Callers offer the latest state every tick; whatever arrives while the
/// gate is shut is simply not sent, so the next permitted send always
/// carries the newest state.
pub struct OutboundThrottle<C: Clock = TickClock> {
    clock: C,
    limiter: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
}

impl OutboundThrottle<TickClock> {
    pub fn new() -> Self {
        Self::every(POSITION_SEND_INTERVAL)
    }

    pub fn every(interval: Duration) -> Self {
        Self::with_clock(interval, &TickClock::default())
    }

    /// Returns true if a send is allowed at tick time `now`, consuming the slot
    pub fn try_acquire_at(&self, now: Millis) -> bool {
        self.clock.set(now);
        self.try_acquire()
    }
}

impl<C: Clock> OutboundThrottle<C> {
    /// Throttle driven by an explicit clock
    pub fn with_clock(interval: Duration, clock: &C) -> Self {
        Self {
            clock: clock.clone(),
            limiter: RateLimiter::direct_with_clock(quota_every(interval), clock),
        }
    }

    /// Returns true if a send is allowed now, consuming the slot
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for OutboundThrottle<TickClock> {
    fn default() -> Self {
        Self::new()
    }
}
