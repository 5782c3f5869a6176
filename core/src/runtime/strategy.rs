//! Frame scheduling strategies

use std::time::Duration;

use super::Hooks;

/// Decides which hooks run on each host callback
///
/// Chosen once when the loop starts. The host calls [`on_refresh`] once per
/// display refresh, and [`on_timer`] once per period when
/// [`timer_interval`] returns one.
///
/// [`on_refresh`]: FrameStrategy::on_refresh
/// [`on_timer`]: FrameStrategy::on_timer
/// [`timer_interval`]: FrameStrategy::timer_interval
pub trait FrameStrategy {
    fn name(&self) -> &'static str;

    /// Period of the timer callback, or `None` if the strategy needs no timer
    fn timer_interval(&self) -> Option<Duration>;

    /// Runs once when the loop enters `Running`
    fn start(&mut self, hooks: &mut Hooks<'_>);

    /// `timestamp` is the host's monotonic refresh time
    fn on_refresh(&mut self, hooks: &mut Hooks<'_>, timestamp: Duration);

    fn on_timer(&mut self, hooks: &mut Hooks<'_>);
}

impl<S: FrameStrategy + ?Sized> FrameStrategy for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn timer_interval(&self) -> Option<Duration> {
        (**self).timer_interval()
    }

    fn start(&mut self, hooks: &mut Hooks<'_>) {
        (**self).start(hooks);
    }

    fn on_refresh(&mut self, hooks: &mut Hooks<'_>, timestamp: Duration) {
        (**self).on_refresh(hooks, timestamp);
    }

    fn on_timer(&mut self, hooks: &mut Hooks<'_>) {
        (**self).on_timer(hooks);
    }
}

/// Everything once per refresh, with the measured time between refreshes
#[derive(Debug, Default)]
pub struct DisplayRefresh {
    previous: Option<Duration>,
}

impl DisplayRefresh {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameStrategy for DisplayRefresh {
    fn name(&self) -> &'static str {
        "display_refresh"
    }

    fn timer_interval(&self) -> Option<Duration> {
        None
    }

    fn start(&mut self, _hooks: &mut Hooks<'_>) {
        self.previous = None;
    }

    fn on_refresh(&mut self, hooks: &mut Hooks<'_>, timestamp: Duration) {
        let delta = self
            .previous
            .map(|previous| timestamp.saturating_sub(previous).as_secs_f32())
            .unwrap_or(0.0);
        self.previous = Some(timestamp);

        hooks.apply_events();
        hooks.tick(delta);
        hooks.draw();
    }

    fn on_timer(&mut self, _hooks: &mut Hooks<'_>) {}
}

/// Simulation on a fixed-period timer, rendering on refresh
#[derive(Debug)]
pub struct FixedStep {
    tick_rate: u32,
}

impl FixedStep {
    /// A zero rate is treated as 1 Hz
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_rate: tick_rate.max(1),
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    fn step_seconds(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

impl FrameStrategy for FixedStep {
    fn name(&self) -> &'static str {
        "fixed_step"
    }

    fn timer_interval(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(1.0 / self.tick_rate as f64))
    }

    fn start(&mut self, hooks: &mut Hooks<'_>) {
        hooks.tick(0.0);
    }

    fn on_refresh(&mut self, hooks: &mut Hooks<'_>, _timestamp: Duration) {
        hooks.draw();
    }

    fn on_timer(&mut self, hooks: &mut Hooks<'_>) {
        hooks.apply_events();
        hooks.tick(self.step_seconds());
    }
}
