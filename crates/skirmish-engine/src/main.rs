//! Headless match runner.
//!
//! Usage: `skirmish [CONFIG]`. Reads `skirmish.toml` from the working
//! directory when no path is given, runs the configured match and prints
//! the summary as JSON on stdout.

#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use skirmish_engine::{init_tracing, ArchetypeLoader, EngineConfig, MatchRunner, CONFIG_FILE};

/// Main entry point.
fn main() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);

    let mut config = if path.exists() {
        EngineConfig::try_load_from(&path)
            .with_context(|| format!("loading {}", path.display()))?
    } else {
        EngineConfig::default()
    };
    config.validate();

    init_tracing(config.log_format, &config.log_filter)?;

    info!("Skirmish starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut loader = ArchetypeLoader::new(&config.archetype_dir);
    loader.set_hot_reload(false);
    loader.load_all()?;
    let table = loader.build_table(config.use_builtin_archetypes);
    info!(archetypes = ?table.names(), "archetype table ready");

    let summary = MatchRunner::new(&config, table)?.run();
    println!("{}", summary.to_json()?);

    info!("Skirmish shutdown complete");
    Ok(())
}
