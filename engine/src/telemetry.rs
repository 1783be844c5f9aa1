//! Telemetry and Observability
//!
//! Installs the `tracing-subscriber` stack for the binary. The level comes
//! from `--log` or `core.log_level`, and `RUST_LOG` overrides both. Output is
//! pretty for terminals or JSON with the current span for log collectors;
//! `core.log_format = "auto"` picks JSON in release builds only.

use crate::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// Only the first call installs anything; later calls are no-ops.
pub fn init_telemetry(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if emits_json(format) {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
    };

    // Already installed
    installed.ok();
}

fn emits_json(format: LogFormat) -> bool {
    match format {
        LogFormat::Json => true,
        LogFormat::Pretty => false,
        LogFormat::Auto => !cfg!(debug_assertions),
    }
}

/// Our crates at `log_level`; chatty dependencies only from `warn`
fn default_directives(log_level: &str) -> String {
    format!(
        "{level},wizzy_engine={level},wizzy={level},sqlx=warn,hyper=warn",
        level = log_level
    )
}
