//! Tracing subscriber setup

use crate::config::Environment;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber for the process.
///
/// `RUST_LOG` wins when set; otherwise the environment's default level is
/// applied to the relay crates. Calling this twice is harmless.
pub fn init_tracing(env: &Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = env.default_log_level();
        EnvFilter::new(format!(
            "warn,forum_relay_core={level},forum_relay_jobs={level},forum_relay={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if env.is_production() {
        builder.with_ansi(false).try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
