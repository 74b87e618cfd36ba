//! Tracing subscriber bootstrap for the application shell.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "fmauth=info,warn";

/// Install a formatted subscriber honouring `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns an error instead of panicking when a global subscriber is already
/// installed.
pub fn try_init(default_filter: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let _ = try_init(DEFAULT_FILTER);
        let err = try_init(DEFAULT_FILTER).unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
