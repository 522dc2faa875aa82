//! Centralized tracing initialization for the planner and robot binaries.
//!
//! Uses a thread-local subscriber so library code never fights an
//! application's own global subscriber if it has one.

use tracing::subscriber::DefaultGuard;

/// Initialize tracing with a thread-local subscriber.
///
/// Respects `RUST_LOG` (defaults to `info`). The returned guard must be kept
/// in scope for the duration of the program.
pub fn init_tracing() -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}
