use tracing::dispatcher;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the stderr `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` when verbose and `warn`
/// when not. Calling this twice is harmless.
pub fn init_logging(verbose: bool) {
    if dispatcher::has_been_set() {
        return;
    }

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
