//! Time utilities for the client simulation

use std::time::Instant;

/// Milliseconds on the monotonic clock every deadline in this crate uses
pub type Millis = u64;

/// Process start, the zero of [`monotonic_millis`]
static CLIENT_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the clock origin (call once at startup; later calls are no-ops)
pub fn init_client_time() {
    CLIENT_START.get_or_init(Instant::now);
}

/// Milliseconds since [`init_client_time`] (or since first use)
pub fn monotonic_millis() -> Millis {
    CLIENT_START.get_or_init(Instant::now).elapsed().as_millis() as Millis
}

/// Frame timing configuration
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Measures the delta between rendered frames
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or construction), then restart
    pub fn lap_secs(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        init_client_time();
        let a = monotonic_millis();
        let b = monotonic_millis();
        assert!(b >= a);
    }

    #[test]
    fn frame_timer_laps_are_non_negative() {
        let mut timer = FrameTimer::new();
        assert!(timer.lap_secs() >= 0.0);
        assert!(timer.lap_secs() >= 0.0);
    }
}
