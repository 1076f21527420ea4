//! Per-call deadline enforcement.

use pitchforge_core::{PitchError, PitchResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a provider call under a wall-clock deadline
///
/// A call that outlives the deadline is abandoned and reported as a
/// timeout attributed to `provider`, which the retry loop treats as
/// retryable.
///
/// # Errors
/// Returns `PitchError::Timeout` if the deadline elapses first
pub async fn with_deadline<F, T>(deadline: Duration, provider: &str, future: F) -> PitchResult<T>
where
    F: Future<Output = PitchResult<T>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                provider = %provider,
                deadline_ms = deadline.as_millis() as u64,
                "Provider call exceeded deadline"
            );
            Err(PitchError::timeout(provider, deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_deadline_success() {
        let result: PitchResult<u32> = with_deadline(Duration::from_secs(1), "api", async {
            sleep(Duration::from_millis(10)).await;
            Ok(42)
        })
        .await;

        assert_eq!(result.expect("in time"), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: PitchResult<u32> = with_deadline(Duration::from_millis(50), "api", async {
            sleep(Duration::from_secs(10)).await;
            Ok(42)
        })
        .await;

        match result {
            Err(PitchError::Timeout {
                provider,
                elapsed_ms,
            }) => {
                assert_eq!(provider, "api");
                assert_eq!(elapsed_ms, 50);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: PitchResult<u32> = with_deadline(Duration::from_secs(1), "api", async {
            Err(PitchError::validation("bad input"))
        })
        .await;

        assert!(matches!(result, Err(PitchError::Validation { .. })));
    }
}
