//! Guaranteed release of an acquired resource.
//!
//! `with_scope` acquires a handle, runs the body, and releases the handle
//! exactly once whatever the body does, panics included. A failed or
//! panicking release is logged and never replaces the body's outcome.

use futures_util::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ScopeError<E> {
    /// Nothing was acquired, so nothing was released.
    #[error("failed to acquire resource: {0}")]
    Acquire(E),
    /// Acquisition or the body panicked. Release still ran if acquisition succeeded.
    #[error("scope body panicked: {0}")]
    Panicked(String),
}

/// Run `body` with a resource, releasing it on every exit path.
pub async fn with_scope<R, T, AE, RE, A, AFut, Rel, RFut, B, BFut>(
    acquire: A,
    release: Rel,
    body: B,
) -> Result<T, ScopeError<AE>>
where
    R: Clone,
    A: FnOnce() -> AFut,
    AFut: Future<Output = Result<R, AE>>,
    Rel: FnOnce(R) -> RFut,
    RFut: Future<Output = Result<(), RE>>,
    RE: Display,
    B: FnOnce(R) -> BFut,
    BFut: Future<Output = T>,
{
    let resource = match AssertUnwindSafe(async { acquire().await }).catch_unwind().await {
        Ok(Ok(resource)) => resource,
        Ok(Err(e)) => return Err(ScopeError::Acquire(e)),
        Err(panic) => return Err(ScopeError::Panicked(panic_message(panic.as_ref()))),
    };

    let handle = resource.clone();
    let outcome = AssertUnwindSafe(async { body(handle).await }).catch_unwind().await;

    match AssertUnwindSafe(async { release(resource).await }).catch_unwind().await {
        Ok(Ok(())) => tracing::debug!("Resource released"),
        Ok(Err(e)) => {
            metrics::record_release_failure();
            tracing::warn!(error = %e, "Resource release failed");
        }
        Err(panic) => {
            metrics::record_release_failure();
            tracing::error!(panic = %panic_message(panic.as_ref()), "Resource release panicked");
        }
    }

    outcome.map_err(|panic| ScopeError::Panicked(panic_message(panic.as_ref())))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Handle {
        releases: Arc<AtomicU32>,
    }

    async fn release(handle: Handle) -> Result<(), String> {
        handle.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[tokio::test]
    async fn test_release_after_normal_return() {
        let handle = Handle::default();
        let h = handle.clone();
        let result: Result<u32, ScopeError<String>> =
            with_scope(|| async move { Ok(h) }, release, |_| async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_after_body_error() {
        let handle = Handle::default();
        let h = handle.clone();
        let result: Result<Result<(), &str>, ScopeError<String>> =
            with_scope(|| async move { Ok(h) }, release, |_| async { Err("boom") }).await;
        assert_eq!(result.unwrap(), Err("boom"));
        assert_eq!(handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_after_panic() {
        let handle = Handle::default();
        let h = handle.clone();
        let result: Result<(), ScopeError<String>> = with_scope(
            || async move { Ok(h) },
            release,
            |_| async { panic!("body exploded") },
        )
        .await;
        match result {
            Err(ScopeError::Panicked(msg)) => assert_eq!(msg, "body exploded"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert_eq!(handle.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_body_and_release() {
        let body_runs = AtomicU32::new(0);
        let result: Result<(), ScopeError<String>> = with_scope(
            || async { Err::<Handle, _>("registry unreachable".to_string()) },
            release,
            |_| async {
                body_runs.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;
        assert!(matches!(result, Err(ScopeError::Acquire(ref e)) if e == "registry unreachable"));
        assert_eq!(body_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_result() {
        let result: Result<&str, ScopeError<String>> = with_scope(
            || async { Ok::<_, String>(Handle::default()) },
            |_| async { Err::<(), _>("close failed") },
            |_| async { "done" },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
    }
}
