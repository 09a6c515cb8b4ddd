//! Fail-open helper for infrastructure operations
//!
//! Run-record appends and diagnostic screenshots must never abort a
//! generation. Route them through `fail_open` so a failure becomes a warning
//! instead of an error. Do NOT use this for the attempt pipeline itself or
//! for artifact writes; those failures are the run's outcome.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open.
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
