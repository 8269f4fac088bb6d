//! Logging initialisation
//!
//! `RUST_LOG` wins when set; otherwise the given level applies to this crate
//! only.

use crate::error::{PipelineError, Result};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)))
}

/// Install a subscriber for the current thread. Logging reverts to the
/// previous subscriber when the guard is dropped.
pub fn init_scoped(level: &str) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Install the process-wide subscriber; fails if one is already set
pub fn init_global(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init()
        .map_err(|e| PipelineError::ConfigError(format!("failed to initialise logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_guard_can_be_nested() {
        let outer = init_scoped("debug");
        {
            let _inner = init_scoped("warn");
            tracing::warn!("inside the inner scope");
        }
        tracing::info!("back in the outer scope");
        drop(outer);
    }
}
