//! Run command - headless execution against the recording backend
//!
//! Loads the guest, drives it on a virtual clock for a fixed number of
//! display refreshes, and optionally writes every recorded GL call as JSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use glbridge_core::{
    BridgeConfig, FailurePolicy, FrameLoop, GlCall, GuestInstance, HeadlessDriver, RecordingGl,
    RunSummary, SchedulingMode, WasmEngine, config,
};
use serde::Serialize;

use crate::script::InputScript;

/// Scheduling mode as spelled on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    /// Events, tick and draw on every refresh
    DisplayRefresh,
    /// Events and tick on a fixed timer, draw on every refresh
    FixedStep,
}

impl From<Mode> for SchedulingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::DisplayRefresh => SchedulingMode::DisplayRefresh,
            Mode::FixedStep => SchedulingMode::FixedStep,
        }
    }
}

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Path to the guest .wasm (or .wat) file
    pub wasm: PathBuf,

    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of display refreshes to simulate
    #[arg(short, long, default_value = "600")]
    pub frames: u64,

    /// Simulated display refresh rate in Hz
    #[arg(long)]
    pub refresh_hz: Option<u32>,

    /// Scheduling mode (overrides the config)
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Fixed-step tick rate in Hz (overrides the config)
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Stop at the first hook failure instead of logging and continuing
    #[arg(long)]
    pub halt_on_failure: bool,

    /// TOML script of key events to inject
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write the recorded GL call trace as JSON
    #[arg(short, long)]
    pub trace: Option<PathBuf>,
}

/// JSON document written by `--trace`
#[derive(Serialize)]
struct Trace<'a> {
    summary: &'a RunSummary,
    calls: &'a [GlCall],
}

/// Resolve the effective config: file or platform default, then CLI overrides
fn effective_config(args: &RunArgs) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };

    if let Some(mode) = args.mode {
        config.runtime.mode = mode.into();
    }
    if let Some(tick_rate) = args.tick_rate {
        config.runtime.tick_rate = tick_rate;
    }
    if let Some(refresh_hz) = args.refresh_hz {
        config.runtime.refresh_hz = refresh_hz;
    }
    if args.halt_on_failure {
        config.runtime.failure_policy = FailurePolicy::Halt;
    }

    for warning in config::validate(&config) {
        tracing::warn!("Config: {}", warning);
    }
    Ok(config)
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let config = effective_config(&args)?;

    let wasm = std::fs::read(&args.wasm)
        .with_context(|| format!("Failed to read {}", args.wasm.display()))?;
    let mut schedule = match &args.input {
        Some(path) => InputScript::load(path)?.into_schedule(),
        None => Default::default(),
    };

    let engine = WasmEngine::new()?;
    let backend = RecordingGl::new(config.context);
    let mut guest = GuestInstance::load(&engine, &wasm, backend, &config)
        .with_context(|| format!("Failed to load {}", args.wasm.display()))?;

    let mut frame_loop = FrameLoop::from_config(&config.runtime);
    let driver = HeadlessDriver::with_refresh_hz(config.runtime.refresh_hz);
    tracing::info!(
        mode = frame_loop.strategy().name(),
        frames = args.frames,
        refresh_hz = config.runtime.refresh_hz,
        "Running {}",
        args.wasm.display()
    );

    let summary = driver.run(&mut frame_loop, &mut guest, args.frames, |frame, guest| {
        for key in schedule.remove(&frame).unwrap_or_default() {
            if !guest.push_key(&key.code, key.state) {
                tracing::warn!(frame, code = %key.code, "Key code is not in the key map");
            }
        }
    });
    frame_loop.shutdown(&mut guest);

    let backend = guest.into_backend();
    println!(
        "{:?} after {} refreshes ({:.3}s): {} ticks, {} draws, {} failed hooks",
        summary.state,
        summary.stats.refreshes,
        summary.elapsed.as_secs_f64(),
        summary.stats.ticks,
        summary.stats.draws,
        summary.stats.failures,
    );
    println!(
        "{} GL calls ({} draw calls)",
        backend.calls().len(),
        backend.draw_count()
    );

    if let Some(path) = &args.trace {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let trace = Trace {
            summary: &summary,
            calls: backend.calls(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &trace)
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        println!("Wrote GL trace to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(wasm: PathBuf) -> RunArgs {
        RunArgs {
            wasm,
            config: None,
            frames: 5,
            refresh_hz: None,
            mode: None,
            tick_rate: None,
            halt_on_failure: false,
            input: None,
            trace: None,
        }
    }

    const GUEST: &str = r#"
        (module
            (import "env" "glClear" (func $clear (param i32)))
            (import "env" "glDrawArrays" (func $draw (param i32 i32 i32)))
            (import "env" "fetch_event" (func $fetch (param i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "c_init") (result i32) (i32.const 1))
            (func (export "c_applyEvents") (result i32)
                (drop (call $fetch (i32.const 0) (i32.const 16)))
                (i32.const 0))
            (func (export "c_tickScene") (param f32) (result i32) (i32.const 1))
            (func (export "c_drawScene") (result i32)
                (call $clear (i32.const 0x4000))
                (call $draw (i32.const 4) (i32.const 0) (i32.const 3))
                (i32.const 1))
        )
    "#;

    #[test]
    fn test_run_writes_trace() {
        let dir = tempfile::tempdir().unwrap();
        let wasm_path = dir.path().join("guest.wat");
        let config_path = dir.path().join("config.toml");
        let keys_path = dir.path().join("keys.toml");
        let trace_path = dir.path().join("trace.json");
        std::fs::write(&wasm_path, GUEST).unwrap();
        std::fs::write(&config_path, "[runtime]\nrefresh_hz = 50\n").unwrap();
        std::fs::write(&keys_path, "[[event]]\nframe = 1\ncode = \"Space\"\nstate = \"down\"\n")
            .unwrap();

        let mut run_args = args(wasm_path);
        run_args.config = Some(config_path);
        run_args.input = Some(keys_path);
        run_args.trace = Some(trace_path.clone());
        execute(run_args).unwrap();

        let trace: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(trace_path).unwrap()).unwrap();
        assert_eq!(trace["summary"]["stats"]["draws"], 5);
        assert_eq!(trace["summary"]["state"], "running");
        let calls = trace["calls"].as_array().unwrap();
        assert_eq!(calls[0]["call"], "viewport");
        assert_eq!(
            calls.iter().filter(|call| call["call"] == "draw_arrays").count(),
            5
        );
    }

    #[test]
    fn test_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();

        let mut run_args = args(PathBuf::from("unused.wasm"));
        run_args.config = Some(config_path);
        run_args.mode = Some(Mode::FixedStep);
        run_args.tick_rate = Some(30);
        run_args.halt_on_failure = true;

        let config = effective_config(&run_args).unwrap();
        assert_eq!(config.runtime.mode, SchedulingMode::FixedStep);
        assert_eq!(config.runtime.tick_rate, 30);
        assert_eq!(config.runtime.failure_policy, FailurePolicy::Halt);
    }

    #[test]
    fn test_missing_wasm_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();

        let mut run_args = args(dir.path().join("absent.wasm"));
        run_args.config = Some(config_path);
        assert!(execute(run_args).is_err());
    }
}
