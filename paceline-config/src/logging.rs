use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::models::PacelineConfig;

const TARGETS: [&str; 3] = ["paceline_core", "paceline_config", "pacelinectl"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Logs go to stderr so command output stays
/// clean. `RUST_LOG` overrides the config-derived filter.
pub fn init_tracing(config: &PacelineConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}
