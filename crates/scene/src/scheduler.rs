//! Cooperative frame scheduling.
//!
//! Each tick consumes the token it was scheduled with and hands back the
//! token of the next one. Cancelling bumps the generation, so every token
//! handed out before is dead.

use std::time::Instant;

use crate::error::SceneError;

/// Permission to run exactly one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken {
    generation: u64,
    seq: u64,
}

impl TickToken {
    /// How many ticks ran before this one was scheduled.
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    generation: u64,
    seq: u64,
    running: bool,
    cancelled: bool,
    last: Option<Instant>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the first tick.
    pub fn start(&mut self) -> TickToken {
        self.current()
    }

    fn current(&self) -> TickToken {
        TickToken {
            generation: self.generation,
            seq: self.seq,
        }
    }

    /// Claim the tick scheduled under `token`.
    pub fn begin(&mut self, token: TickToken) -> Result<(), SceneError> {
        if self.cancelled {
            return Err(SceneError::TornDown);
        }
        if self.running {
            return Err(SceneError::Reentrant);
        }
        if token != self.current() {
            return Err(SceneError::StaleToken);
        }
        self.running = true;
        Ok(())
    }

    /// End the running tick and schedule the next one.
    pub fn finish(&mut self) -> TickToken {
        self.running = false;
        self.seq += 1;
        self.current()
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.running = false;
        self.generation += 1;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds since the previous call; zero the first time.
    pub fn delta(&mut self, now: Instant) -> f32 {
        let dt = self
            .last
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last = Some(now);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn one_tick_per_token() {
        let mut scheduler = FrameScheduler::new();
        let first = scheduler.start();
        scheduler.begin(first).unwrap();
        let second = scheduler.finish();
        assert_ne!(first, second);
        assert_eq!(second.sequence(), 1);

        assert!(matches!(scheduler.begin(first), Err(SceneError::StaleToken)));
        scheduler.begin(second).unwrap();
        scheduler.finish();
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut scheduler = FrameScheduler::new();
        let token = scheduler.start();
        scheduler.begin(token).unwrap();
        assert!(matches!(scheduler.begin(token), Err(SceneError::Reentrant)));
        assert!(scheduler.is_running());
    }

    #[test]
    fn cancel_kills_outstanding_tokens() {
        let mut scheduler = FrameScheduler::new();
        let token = scheduler.start();
        scheduler.cancel();
        assert!(matches!(scheduler.begin(token), Err(SceneError::TornDown)));
        assert!(!scheduler.is_running());
    }

    #[test]
    fn delta_starts_at_zero() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        assert_eq!(scheduler.delta(t0), 0.0);
        let dt = scheduler.delta(t0 + Duration::from_millis(250));
        approx::assert_relative_eq!(dt, 0.25, epsilon = 1e-6);
        // a clock going backwards yields zero, not a negative step
        assert_eq!(scheduler.delta(t0), 0.0);
    }
}
