//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Filter directives read at startup, e.g. `AGENT_CHAT_LOG=agent_chat=debug`.
pub const LOG_ENV_VAR: &str = "AGENT_CHAT_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs a stderr subscriber so stdout carries only conversation output.
///
/// Invalid directives fall back to [`DEFAULT_LOG_FILTER`]. Calling this more
/// than once keeps the first subscriber.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from(std::env::var(LOG_ENV_VAR).ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
