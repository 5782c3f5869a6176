//! Config command - print or write bridge configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use glbridge_core::{BridgeConfig, config};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Print the config currently loaded from the config directory instead of defaults
    #[arg(long)]
    pub current: bool,

    /// Print where the config file lives
    #[arg(long)]
    pub path: bool,

    /// Write the printed config to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    if args.path {
        match config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No config directory on this platform"),
        }
        return Ok(());
    }

    let config = if args.current {
        config::load()
    } else {
        BridgeConfig::default()
    };
    for warning in config::validate(&config) {
        tracing::warn!("Config: {}", warning);
    }

    match &args.output {
        Some(path) => {
            config::save_to(&config, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", config::to_toml(&config)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        execute(ConfigArgs {
            current: false,
            path: false,
            output: Some(path.clone()),
        })
        .unwrap();

        let loaded = config::load_from(&path).unwrap();
        assert_eq!(loaded, BridgeConfig::default());
    }
}
