//! Tracing subscriber setup.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Builds the filter from `RUST_LOG` plus the configured directives.
///
/// Directives are comma separated, e.g. `"skirmish=info,skirmish_gameplay::ai=debug"`.
pub fn build_filter(directives: &str) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("invalid log directive `{directive}`"))?,
        );
    }
    Ok(filter)
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(format: LogFormat, directives: &str) -> anyhow::Result<()> {
    let filter = build_filter(directives)?;
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}
