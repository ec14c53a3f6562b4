//! Per-attempt deadlines.
//!
//! An attempt that overruns its deadline is dropped and reported as a
//! transient failure, so it flows through the normal retry path.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::resilience::retries::AttemptResult;

/// Run one attempt under a deadline.
pub async fn bounded<T, F>(limit: Duration, attempt: F) -> AttemptResult<T>
where
    F: Future<Output = AttemptResult<T>>,
{
    match timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => AttemptResult::TransientFailure(format!("attempt timed out after {}ms", limit.as_millis())),
    }
}
