//! Log setup. Everything goes to stderr; stdout is for command output.

use habitclock_core::Config;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins, otherwise `log.level` from the config file.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = Config::load_or_default().log.level;
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
