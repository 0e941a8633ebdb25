use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Run `op` until it succeeds, a non-transient error occurs, or
/// `max_attempts` is reached. Sleeps `backoff_ms[attempt - 1]` between
/// attempts (the last entry repeats). Any give-up becomes `FatalFetch`.
pub async fn with_retry<T, F, Fut>(
    source_name: &str,
    max_attempts: u32,
    backoff_ms: &[u64],
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(source = source_name, attempt, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay_ms = backoff_ms
                    .get(attempt as usize - 1)
                    .or_else(|| backoff_ms.last())
                    .copied()
                    .unwrap_or(0);
                warn!(
                    source = source_name,
                    attempt,
                    max_attempts,
                    "Fetch failed ({e}); retrying in {delay_ms}ms",
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => {
                return Err(AppError::FatalFetch {
                    source_name: source_name.to_string(),
                    attempts: attempt,
                    last: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> AppError {
        AppError::TransientFetch {
            source_name: "test".into(),
            message: "timeout".into(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = with_retry("test", 3, &[1], || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_fatal() {
        let calls = AtomicU32::new(0);
        let err = with_retry("stats", 3, &[1, 1], || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient())
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            AppError::FatalFetch { source_name, attempts, .. } => {
                assert_eq!(source_name, "stats");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected FatalFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry("stats", 5, &[1], || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AppError::Config("bad request".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AppError::FatalFetch { attempts: 1, .. }));
    }
}
