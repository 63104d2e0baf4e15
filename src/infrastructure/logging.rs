// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Structured logging setup.
//!
//! Operational diagnostics (parse oddities, missing response files, counter
//! dumps) go through `tracing`; nothing is ever surfaced to the HTTP client.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Track if logging has been initialized.
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber with log level from environment or default.
///
/// Log level can be set via `RUST_LOG` environment variable:
/// - `RUST_LOG=debug` - Show all logs including per-request evaluation
/// - `RUST_LOG=info` - Show info, warn, and error (default)
/// - `RUST_LOG=warn` - Show only warnings and errors
///
/// Can also be set per module: `RUST_LOG=ricochet::application::resolver=debug`
///
/// Safe to call multiple times - will only initialize once.
pub fn init_logging() {
    if INITIALIZED.get().is_some() {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init fails if a subscriber is already set (e.g. in tests); that is
    // fine, the earlier one stays in effect.
    let _ = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_ansi(true))
        .try_init();

    let _ = INITIALIZED.set(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_does_not_panic() {
        // Should be safe to call multiple times
        init_logging();
        init_logging();
        init_logging();
    }
}
