//! Inspect command - static audit of a guest module

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use glbridge_core::{ModuleReport, analyze_wasm, config};

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the guest .wasm file
    pub wasm: PathBuf,

    /// Config file whose export names to check against
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    let wasm = std::fs::read(&args.wasm)
        .with_context(|| format!("Failed to read {}", args.wasm.display()))?;
    let report = analyze_wasm(&wasm, &config.exports)
        .with_context(|| format!("Failed to analyze {}", args.wasm.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }

    if !report.is_loadable() {
        anyhow::bail!(
            "{} needs imports this host does not provide",
            args.wasm.display()
        );
    }
    Ok(())
}

/// Human-readable report
fn render(report: &ModuleReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Imports: {} supported, {} unsupported, {} foreign\n",
        report.supported_imports.len(),
        report.unsupported_imports.len(),
        report.foreign_imports.len()
    ));
    let mut supported = report.supported_imports.clone();
    supported.sort();
    for name in &supported {
        out.push_str(&format!("  ok       {} ({} call sites)\n", name, report.call_count(name)));
    }
    for name in &report.unsupported_imports {
        out.push_str(&format!("  MISSING  {}\n", name));
    }
    for name in &report.foreign_imports {
        out.push_str(&format!("  FOREIGN  {}\n", name));
    }

    out.push_str("Hooks:\n");
    for status in &report.hooks {
        let mark = if status.present { "ok" } else { "no-op" };
        out.push_str(&format!("  {:<8} {:<13} {}\n", mark, status.hook, status.export));
    }

    out.push_str(&format!(
        "Memory export: {}\nScratch buffer: {}\n",
        yes_no(report.exports_memory),
        yes_no(report.exports_scratch_buffer)
    ));
    out
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
