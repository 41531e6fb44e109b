use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log to stderr so `--json` output on stdout stays parseable.
///
/// The level comes from `FOODMAP_LOG` (e.g. `FOODMAP_LOG=debug` or
/// `FOODMAP_LOG=foodmap_core=info`) and defaults to warnings only.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_env("FOODMAP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
