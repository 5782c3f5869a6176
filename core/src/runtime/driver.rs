//! Deterministic stand-in for the host's refresh and timer callbacks

use std::time::Duration;

use serde::Serialize;

use super::{FrameLoop, FrameStats, FrameStrategy, GuestHooks, LoopState};

/// Result of a headless run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: LoopState,
    /// Virtual time of the last delivered callback
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub stats: FrameStats,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Runs a [`FrameLoop`] on a virtual clock
///
/// Refresh `k` happens at `k * refresh_interval`. Timer fire `j` (from 1)
/// happens at `j * timer_interval` and is delivered before any refresh at the
/// same or a later time, matching how a browser interleaves the two.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessDriver {
    refresh_interval: Duration,
}

impl HeadlessDriver {
    pub fn new(refresh_interval: Duration) -> Self {
        Self { refresh_interval }
    }

    /// Driver refreshing at `hz` times per second (0 is treated as 1)
    pub fn with_refresh_hz(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64))
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Initialize and start the loop if needed, then deliver `refreshes`
    /// refresh callbacks and the timer callbacks due before each
    ///
    /// `before_refresh` runs ahead of every refresh with its index; use it to
    /// inject input. The run ends early once the loop terminates.
    pub fn run<S, H, F>(
        &self,
        frame_loop: &mut FrameLoop<S>,
        guest: &mut H,
        refreshes: u64,
        mut before_refresh: F,
    ) -> RunSummary
    where
        S: FrameStrategy,
        H: GuestHooks,
        F: FnMut(u64, &mut H),
    {
        if frame_loop.state() == LoopState::Uninitialized {
            frame_loop.initialize(guest);
        }
        if frame_loop.state() == LoopState::Ready {
            frame_loop.start(guest);
        }

        let refresh_nanos = self.refresh_interval.as_nanos() as u64;
        let timer_nanos = frame_loop
            .timer_interval()
            .map(|interval| interval.as_nanos() as u64)
            .filter(|&nanos| nanos > 0);
        let mut next_timer = timer_nanos;
        let mut elapsed = 0u64;

        for index in 0..refreshes {
            if frame_loop.state() != LoopState::Running {
                break;
            }
            let now = refresh_nanos.saturating_mul(index);

            if let Some(period) = timer_nanos {
                while let Some(due) = next_timer
                    && due <= now
                {
                    frame_loop.on_timer(guest);
                    elapsed = due;
                    next_timer = due.checked_add(period);
                    if frame_loop.state() != LoopState::Running {
                        break;
                    }
                }
            }
            if frame_loop.state() != LoopState::Running {
                break;
            }

            before_refresh(index, guest);
            frame_loop.on_refresh(guest, Duration::from_nanos(now));
            elapsed = now;
        }

        tracing::debug!(
            refreshes = frame_loop.stats().refreshes,
            timer_fires = frame_loop.stats().timer_fires,
            "Headless run finished"
        );

        RunSummary {
            state: frame_loop.state(),
            elapsed: Duration::from_nanos(elapsed),
            stats: *frame_loop.stats(),
        }
    }
}
