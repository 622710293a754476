//! Waiting between retry attempts.

use std::time::Duration;

use async_trait::async_trait;

/// Timer used between retry attempts and for settle delays.
///
/// Production code uses [`TokioClock`]; tests substitute an implementation
/// that records the requested delays and returns immediately.
#[async_trait]
pub trait RetryClock: Send + Sync {
    /// Resolve once `duration` has passed.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl RetryClock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
