//! Tracing setup and span constructors.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` when a global
/// subscriber was already installed (tests call this repeatedly).
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Standardized span constructors for IRAC observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one tombstone cleanup round.
    pub fn cleanup_round(cache: &str, round: u64) -> Span {
        info_span!("cleanup_round", cache = %cache, round)
    }

    /// Span for pushing tombstones to a state-transfer requestor.
    pub fn state_transfer(cache: &str, requestor: &str) -> Span {
        info_span!("state_transfer", cache = %cache, requestor = %requestor)
    }

    /// Span for version generator lifecycle work.
    pub fn version_state(cache: &str, site: &str) -> Span {
        info_span!("version_state", cache = %cache, site = %site)
    }
}
