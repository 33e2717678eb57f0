//! # Worker Offload Layer
//!
//! Recognition engine calls (model load, accept-audio, result extraction) are
//! CPU-bound and blocking; running them on the cooperative runtime would
//! stall every other session. This layer moves them onto tokio's blocking
//! pool while the calling session task suspends.
//!
//! Ordering needs no explicit queue: each session task awaits its single
//! in-flight call before reading the next frame, so decoder operations apply
//! strictly in arrival order. If a session is torn down mid-call, the call
//! finishes on the pool and whatever it owned (the recognizer moved into the
//! closure) is dropped there; offline decoders are not built for forced
//! interruption. No per-call timeout is enforced.

use crate::error::BridgeError;
use tracing::trace;

/// Run one blocking recognition call off the cooperative runtime.
///
/// `label` identifies the caller (session id or "model-registry") in trace
/// output. The error case is a panicked or aborted worker, surfaced as a
/// recoverable `Processing` error.
pub async fn run_blocking<F, T>(label: &str, f: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    trace!(label, "dispatching blocking recognition call");
    tokio::task::spawn_blocking(f).await.map_err(|err| {
        BridgeError::Processing(format!("blocking worker for {} failed: {}", label, err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_returns_closure_value() {
        let value = run_blocking("test", || 2 + 2).await.unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_panic_surfaces_as_processing_error() {
        let err = run_blocking("test", || -> i32 { panic!("decoder blew up") })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Processing(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_runtime() {
        // A second task must make progress while the blocking call sleeps.
        let slow = tokio::spawn(run_blocking("slow", || {
            std::thread::sleep(Duration::from_millis(100));
            "done"
        }));

        let quick = tokio::time::timeout(Duration::from_millis(50), async { 7 })
            .await
            .unwrap();
        assert_eq!(quick, 7);

        assert_eq!(slow.await.unwrap().unwrap(), "done");
    }
}
