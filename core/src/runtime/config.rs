//! Runtime configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How guest ticks are scheduled against display refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Events, tick and draw once per refresh with the measured delta
    #[default]
    DisplayRefresh,
    /// Events and tick on a fixed-period timer, draw on every refresh
    FixedStep,
}

/// What the loop does after a hook reports failure or traps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and keep going
    #[default]
    Continue,
    /// Log and stop calling the guest
    Halt,
}

/// Runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: SchedulingMode,
    /// Fixed-step tick rate in Hz
    #[serde(default = "default_rate")]
    pub tick_rate: u32,
    /// Display refresh rate used by the headless driver, in Hz
    #[serde(default = "default_rate")]
    pub refresh_hz: u32,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_rate() -> u32 {
    60
}

impl RuntimeConfig {
    /// Time per fixed-step tick (inverse of tick rate)
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    /// Time between display refreshes
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::default(),
            tick_rate: default_rate(),
            refresh_hz: default_rate(),
            failure_policy: FailurePolicy::default(),
        }
    }
}
