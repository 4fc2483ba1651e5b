//! Tracing subscriber setup for binaries, demos and tests.

use tracing_subscriber::{fmt, EnvFilter};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "cadence_core=info,cadence_runner=info";

/// Install a `fmt` subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Returns `false` if a global subscriber was already installed, so calling
/// this more than once is harmless.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
