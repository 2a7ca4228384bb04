// src/engine/timing.rs

//! Stop-once clocks for units and whole runs.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    NotStarted,
    Running,
    Stopped,
}

/// Measures one span of time.
///
/// A stopwatch starts at most once and stops at most once; after `stop`
/// the elapsed time is frozen and further `start`/`stop` calls change
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    started_at: Option<Instant>,
    frozen: Option<Duration>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Stop the clock and return the measured span. Stopping a clock that
    /// never started yields zero.
    pub fn stop(&mut self) -> Duration {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        let elapsed = self.elapsed();
        self.frozen = Some(elapsed);
        elapsed
    }

    pub fn elapsed(&self) -> Duration {
        match (self.frozen, self.started_at) {
            (Some(frozen), _) => frozen,
            (None, Some(started_at)) => started_at.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn state(&self) -> ClockState {
        match (self.frozen, self.started_at) {
            (Some(_), _) => ClockState::Stopped,
            (None, Some(_)) => ClockState::Running,
            (None, None) => ClockState::NotStarted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn clock_moves_through_its_states() {
        let mut clock = Stopwatch::new();
        assert_eq!(clock.state(), ClockState::NotStarted);
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.start();
        assert_eq!(clock.state(), ClockState::Running);

        sleep(Duration::from_millis(5));
        let elapsed = clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn stop_is_once() {
        let mut clock = Stopwatch::new();
        clock.start();
        let first = clock.stop();
        sleep(Duration::from_millis(2));
        clock.start();

        assert_eq!(clock.stop(), first);
        assert_eq!(clock.elapsed(), first);
    }

    #[test]
    fn stopping_unstarted_clock_yields_zero() {
        let mut clock = Stopwatch::new();
        assert_eq!(clock.stop(), Duration::ZERO);
        assert_eq!(clock.state(), ClockState::Stopped);
    }
}
