//! Async test helpers
//!
//! Broadcast receive with timeout, draining, and polling until a mirror
//! condition holds.

use std::future::Future;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{sleep, timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvTimeoutError {
    #[error("receive operation timed out")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Receive from a broadcast channel, skipping lag notices.
pub async fn recv_timeout<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, async {
        loop {
            match rx.recv().await {
                Ok(value) => return Ok(value),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(RecvTimeoutError::Closed),
            }
        }
    })
    .await
    .map_err(|_| RecvTimeoutError::Timeout)?
}

/// Everything currently buffered, without waiting.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(value) => out.push(value),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
        }
    }
}

/// Poll `check` every `interval` until it yields `true`. Returns whether it
/// did before `deadline`.
pub async fn wait_until<F, Fut>(deadline: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(deadline, async {
        while !check().await {
            sleep(interval).await;
        }
    })
    .await
    .is_ok()
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that should fail fast (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_recv_timeout_success() {
        let (tx, mut rx) = broadcast::channel(4);
        tx.send(42).unwrap();
        assert_eq!(recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await, Ok(42));
    }

    #[tokio::test]
    async fn test_recv_timeout_times_out() {
        let (_tx, mut rx) = broadcast::channel::<i32>(4);
        assert_eq!(
            recv_timeout(&mut rx, SHORT_TEST_TIMEOUT).await,
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_recv_timeout_closed() {
        let (tx, mut rx) = broadcast::channel::<i32>(4);
        drop(tx);
        assert_eq!(
            recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await,
            Err(RecvTimeoutError::Closed)
        );
    }

    #[test]
    fn test_drain() {
        let (tx, mut rx) = broadcast::channel(8);
        for i in 0..5 {
            tx.send(i).unwrap();
        }
        assert_eq!(drain(&mut rx), vec![0, 1, 2, 3, 4]);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until() {
        let polls = AtomicU32::new(0);
        let done = wait_until(Duration::from_secs(1), Duration::from_millis(10), || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move { n >= 3 }
        })
        .await;
        assert!(done);

        let never = wait_until(Duration::from_millis(50), Duration::from_millis(10), || async {
            false
        })
        .await;
        assert!(!never);
    }
}
