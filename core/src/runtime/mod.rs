//! Frame loop orchestration
//!
//! Drives the guest's lifecycle hooks from host callbacks: display refreshes
//! and, for fixed-step scheduling, a periodic timer. The loop never blocks;
//! whoever owns the callbacks (a window event loop or [`HeadlessDriver`])
//! calls in.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

mod config;
mod driver;
mod strategy;


pub use config::{FailurePolicy, RuntimeConfig, SchedulingMode};
pub use driver::{HeadlessDriver, RunSummary};
pub use strategy::{DisplayRefresh, FixedStep, FrameStrategy};

/// Lifecycle of a [`FrameLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Uninitialized,
    Ready,
    Running,
    Terminated,
}

/// The guest's exported lifecycle entry points
///
/// `Ok(false)` is a failure the guest reported; `Err` is a trap.
pub trait GuestHooks {
    fn init(&mut self) -> Result<bool>;
    fn destroy(&mut self) -> Result<()>;
    /// `Ok(false)` when the guest failed or asked to exit
    fn apply_events(&mut self) -> Result<bool>;
    fn tick(&mut self, delta_seconds: f32) -> Result<bool>;
    fn draw(&mut self) -> Result<bool>;
}

/// Counters kept by the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub refreshes: u64,
    pub timer_fires: u64,
    pub event_polls: u64,
    pub ticks: u64,
    pub draws: u64,
    /// Hooks that reported failure or trapped
    pub failures: u64,
}

/// Hook calls available to a [`FrameStrategy`] during one callback
///
/// Failures are logged and counted here. Under [`FailurePolicy::Halt`] the
/// first failure makes every later call in the callback a no-op.
pub struct Hooks<'a> {
    guest: &'a mut dyn GuestHooks,
    stats: &'a mut FrameStats,
    policy: FailurePolicy,
    halted: bool,
}

impl<'a> Hooks<'a> {
    fn new(
        guest: &'a mut dyn GuestHooks,
        stats: &'a mut FrameStats,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            guest,
            stats,
            policy,
            halted: false,
        }
    }

    fn outcome(&mut self, hook: &'static str, result: Result<bool>) -> bool {
        let ok = match result {
            Ok(true) => return true,
            Ok(false) => {
                warn!(hook, "Guest hook reported failure");
                false
            }
            Err(error) => {
                warn!(hook, "Guest hook trapped: {:#}", error);
                false
            }
        };
        self.stats.failures += 1;
        if self.policy == FailurePolicy::Halt {
            self.halted = true;
        }
        ok
    }

    /// Let the guest drain queued events
    pub fn apply_events(&mut self) -> bool {
        if self.halted {
            return false;
        }
        self.stats.event_polls += 1;
        let result = self.guest.apply_events();
        self.outcome("applyEvents", result)
    }

    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        if self.halted {
            return false;
        }
        self.stats.ticks += 1;
        let result = self.guest.tick(delta_seconds);
        self.outcome("tickScene", result)
    }

    pub fn draw(&mut self) -> bool {
        if self.halted {
            return false;
        }
        self.stats.draws += 1;
        let result = self.guest.draw();
        self.outcome("drawScene", result)
    }

    /// Whether a failure stopped this callback
    pub fn halted(&self) -> bool {
        self.halted
    }
}

/// The frame loop: a state machine plus the chosen strategy
pub struct FrameLoop<S = Box<dyn FrameStrategy>> {
    state: LoopState,
    strategy: S,
    policy: FailurePolicy,
    stats: FrameStats,
    /// Set once the guest's destroy hook has run
    destroyed: bool,
}

impl FrameLoop {
    /// Build a loop with the strategy selected by `config.mode`
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let strategy: Box<dyn FrameStrategy> = match config.mode {
            SchedulingMode::DisplayRefresh => Box::new(DisplayRefresh::new()),
            SchedulingMode::FixedStep => Box::new(FixedStep::new(config.tick_rate)),
        };
        FrameLoop::new(strategy, config.failure_policy)
    }
}

impl<S: FrameStrategy> FrameLoop<S> {
    pub fn new(strategy: S, policy: FailurePolicy) -> Self {
        Self {
            state: LoopState::Uninitialized,
            strategy,
            policy,
            stats: FrameStats::default(),
            destroyed: false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Period the host should fire [`on_timer`](Self::on_timer) at, if any
    pub fn timer_interval(&self) -> Option<Duration> {
        self.strategy.timer_interval()
    }

    fn halt_if(&mut self, halted: bool) {
        if halted {
            info!("Stopping frame loop after guest failure");
            self.state = LoopState::Terminated;
        }
    }

    /// Call the guest's init hook
    ///
    /// On failure the guest's destroy hook runs. The loop still becomes
    /// `Ready` unless the policy is [`FailurePolicy::Halt`].
    pub fn initialize<H: GuestHooks>(&mut self, guest: &mut H) -> LoopState {
        if self.state != LoopState::Uninitialized {
            warn!(state = ?self.state, "initialize called twice");
            return self.state;
        }

        let ok = match guest.init() {
            Ok(ok) => ok,
            Err(error) => {
                warn!("Guest init trapped: {:#}", error);
                false
            }
        };
        if ok {
            self.state = LoopState::Ready;
            return self.state;
        }

        warn!("Init failed!");
        self.stats.failures += 1;
        self.destroy(guest);
        self.state = match self.policy {
            FailurePolicy::Continue => LoopState::Ready,
            FailurePolicy::Halt => LoopState::Terminated,
        };
        self.state
    }

    /// Enter `Running` and run the strategy's start step
    pub fn start<H: GuestHooks>(&mut self, guest: &mut H) -> LoopState {
        if self.state != LoopState::Ready {
            warn!(state = ?self.state, "start called outside Ready");
            return self.state;
        }
        self.state = LoopState::Running;
        debug!(strategy = self.strategy.name(), "Frame loop running");

        let mut hooks = Hooks::new(guest, &mut self.stats, self.policy);
        self.strategy.start(&mut hooks);
        let halted = hooks.halted();
        self.halt_if(halted);
        self.state
    }

    /// Display refresh callback
    pub fn on_refresh<H: GuestHooks>(&mut self, guest: &mut H, timestamp: Duration) {
        if self.state != LoopState::Running {
            return;
        }
        self.stats.refreshes += 1;
        let mut hooks = Hooks::new(guest, &mut self.stats, self.policy);
        self.strategy.on_refresh(&mut hooks, timestamp);
        let halted = hooks.halted();
        self.halt_if(halted);
    }

    /// Timer callback
    pub fn on_timer<H: GuestHooks>(&mut self, guest: &mut H) {
        if self.state != LoopState::Running {
            return;
        }
        self.stats.timer_fires += 1;
        let mut hooks = Hooks::new(guest, &mut self.stats, self.policy);
        self.strategy.on_timer(&mut hooks);
        let halted = hooks.halted();
        self.halt_if(halted);
    }

    /// Call the guest's destroy hook and stop the loop
    ///
    /// Destroy runs at most once per loop, so a guest whose init failed is
    /// not torn down a second time here.
    pub fn shutdown<H: GuestHooks>(&mut self, guest: &mut H) {
        if matches!(self.state, LoopState::Ready | LoopState::Running) {
            self.destroy(guest);
        }
        self.state = LoopState::Terminated;
    }

    fn destroy<H: GuestHooks>(&mut self, guest: &mut H) {
        if self.destroyed {
            debug!("Guest already destroyed");
            return;
        }
        self.destroyed = true;
        if let Err(error) = guest.destroy() {
            warn!("Guest destroy trapped: {:#}", error);
            self.stats.failures += 1;
        }
    }
}
