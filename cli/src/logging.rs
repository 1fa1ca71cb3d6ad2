//! Installs the single global `tracing` subscriber, once, at CLI start.

use tracing_subscriber::{fmt, EnvFilter};

/// Default directive is `chaintap=info`, or `chaintap=debug` when
/// `--verbose` is passed. `RUST_LOG` always takes precedence when set.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "chaintap=debug" } else { "chaintap=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    fmt().with_env_filter(filter).init();
}
