use std::io::IsTerminal;

use tracing::Subscriber;
use tracing_subscriber::fmt::time::Uptime;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::constants::ENV_RUSTYFATAL_LOG;

fn subscriber() -> impl Subscriber + Send + Sync + 'static {
    let env = EnvFilter::from_env(ENV_RUSTYFATAL_LOG);

    tracing_subscriber::fmt()
        .with_timer(Uptime::default())
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .with_env_filter(env)
        .finish()
}

/// Installs the global subscriber, panics if one is already set.
pub fn setup_logger() {
    subscriber().init();
    trace_start();
}

/// Like [`setup_logger`], but leaves an already installed subscriber in place.
pub fn try_setup_logger() -> bool {
    let installed = subscriber().try_init().is_ok();
    if installed {
        trace_start();
    }
    installed
}

fn trace_start() {
    tracing::trace!(start = humantime::format_rfc3339(std::time::SystemTime::now()).to_string());
}
