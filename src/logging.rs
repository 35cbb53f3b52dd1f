#![deny(warnings)]

// Tracing initialization. Logs go to stderr: stdout carries the MCP stream.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init()
    };
}
