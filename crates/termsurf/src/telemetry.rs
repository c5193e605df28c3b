//! Opt-in tracing setup for binaries and test harnesses embedding the
//! client. Library code only emits events; nothing here runs unless the
//! embedder asks for it.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber filtered by `TERMSURF_LOG` (falling back to
/// `default_level`). Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_env("TERMSURF_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    let _ = subscriber.try_init();
}
