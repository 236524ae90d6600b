// Environment detection and logger setup.

use std::sync::OnceLock;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

/// Detect the current environment mode from environment variables.
/// Checks `EDU_AUTH_ENV` then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let value = std::env::var("EDU_AUTH_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        parse_env_mode(&value)
    })
}

fn parse_env_mode(value: &str) -> EnvMode {
    match value.to_lowercase().as_str() {
        "production" | "prod" => EnvMode::Production,
        "test" | "testing" => EnvMode::Test,
        _ => EnvMode::Development,
    }
}

/// Default `tracing` filter directive for the given mode.
pub fn default_filter(mode: EnvMode) -> &'static str {
    match mode {
        EnvMode::Production => "edu_auth=info",
        EnvMode::Development | EnvMode::Test => "edu_auth=debug",
    }
}

/// Install a `tracing` subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(detect_env_mode())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
