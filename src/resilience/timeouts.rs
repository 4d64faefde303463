//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound probes and backend commands with a deadline
//! - Cancel the underlying future on expiry (dropped, not raced)
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

/// The deadline elapsed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `future` with a deadline. On expiry the future is dropped, which
/// cancels any I/O it had in flight.
pub async fn with_timeout<F, T>(limit: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Elapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_future_is_dropped() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let result = with_timeout(Duration::from_secs(2), async move {
            let _flag = flag;
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;

        assert_eq!(result, Err(Elapsed(Duration::from_secs(2))));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fast_future_completes() {
        let result = with_timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
