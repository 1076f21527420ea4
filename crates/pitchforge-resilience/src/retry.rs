//! Retry execution for automatic and user-driven retries.
//!
//! [`RetryPolicy::execute`] drives the automatic retry loop used by the
//! fallback chain. [`RetryHandle`] tracks a manual retry budget with a
//! ticking cooldown, for callers that let a user trigger retries
//! explicitly.

use crate::backoff::BackoffPolicy;
use parking_lot::Mutex;
use pitchforge_core::{PitchError, PitchResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Automatic retry policy
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// Create a policy with the given backoff schedule
    #[must_use]
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }

    /// Get the backoff schedule
    #[must_use]
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Run `op` up to `max_attempts` times with backoff between failures
    ///
    /// The operation receives the zero-based attempt index. Retries stop
    /// early on a non-retryable error, which is returned unchanged so the
    /// caller sees the original classification. Cancellation is checked
    /// before each attempt and again when an attempt completes; a result
    /// that lands after cancellation is discarded, success included. An
    /// in-flight attempt is never interrupted, only the backoff wait is.
    ///
    /// # Errors
    /// Returns the last failure once the budget is spent, or
    /// `PitchError::Cancelled` if the token fires first
    pub async fn execute<T, F, Fut>(
        &self,
        max_attempts: u32,
        cancel: &CancellationToken,
        mut op: F,
    ) -> PitchResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PitchResult<T>>,
    {
        let budget = max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(PitchError::Cancelled);
            }

            let result = op(attempt).await;

            if cancel.is_cancelled() {
                return Err(PitchError::Cancelled);
            }

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let next = attempt + 1;
            if next >= budget || !error.is_retryable() {
                return Err(error);
            }

            let delay = self.backoff.delay_for(attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying after backoff"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(PitchError::Cancelled),
                () = sleep(delay) => {}
            }
            attempt = next;
        }
    }
}

/// Default cooldown countdown resolution
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Snapshot of a manual retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts consumed so far
    pub attempt_count: u32,
    /// Total attempts allowed
    pub max_attempts: u32,
    /// Cooldown left before the next attempt is admitted
    pub cooldown_remaining: Duration,
    /// Whether a call is currently in flight
    pub in_progress: bool,
}

impl RetryState {
    /// Whether a manual retry would be admitted right now
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
            && self.cooldown_remaining.is_zero()
            && !self.in_progress
    }

    /// Cooldown remaining in milliseconds
    #[must_use]
    pub fn cooldown_remaining_ms(&self) -> u64 {
        u64::try_from(self.cooldown_remaining.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug)]
struct HandleInner {
    attempt_count: u32,
    max_attempts: u32,
    cooldown_remaining: Duration,
    in_progress: bool,
    /// Bumped by reset; stale cooldown tasks and completions check it
    epoch: u64,
    cooldown_task: Option<JoinHandle<()>>,
}

/// Manual retry budget with a ticking cooldown
///
/// At most one call runs at a time. Each completed call consumes one
/// attempt and starts a backoff cooldown which counts down in `tick`
/// steps, so state snapshots show the remaining wait shrinking rather
/// than jumping to zero.
pub struct RetryHandle {
    backoff: BackoffPolicy,
    tick: Duration,
    inner: Arc<Mutex<HandleInner>>,
}

impl RetryHandle {
    /// Create a handle with the given schedule and attempt budget
    #[must_use]
    pub fn new(backoff: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            backoff,
            tick: DEFAULT_TICK,
            inner: Arc::new(Mutex::new(HandleInner {
                attempt_count: 0,
                max_attempts,
                cooldown_remaining: Duration::ZERO,
                in_progress: false,
                epoch: 0,
                cooldown_task: None,
            })),
        }
    }

    /// Override the cooldown countdown resolution
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run `call` if the budget admits it
    ///
    /// Returns `Ok(None)` without invoking `call` when the budget is
    /// spent, a cooldown is active, or another call is in flight.
    ///
    /// # Errors
    /// Propagates the call's error; the attempt is still consumed
    pub async fn retry<T, F, Fut>(&self, call: F) -> PitchResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PitchResult<T>>,
    {
        let (epoch, attempt_index) = {
            let mut inner = self.inner.lock();
            let admitted = inner.attempt_count < inner.max_attempts
                && inner.cooldown_remaining.is_zero()
                && !inner.in_progress;
            if !admitted {
                debug!(
                    attempt_count = inner.attempt_count,
                    max_attempts = inner.max_attempts,
                    cooldown_ms = inner.cooldown_remaining.as_millis() as u64,
                    in_progress = inner.in_progress,
                    "Manual retry not admitted"
                );
                return Ok(None);
            }
            inner.in_progress = true;
            (inner.epoch, inner.attempt_count)
        };

        let result = call().await;

        {
            let mut inner = self.inner.lock();
            // A reset during the call already reopened the budget; leave it
            if inner.epoch == epoch {
                inner.in_progress = false;
                inner.attempt_count += 1;
                let cooldown = self.backoff.delay_for(attempt_index);
                self.start_cooldown(&mut inner, cooldown, epoch);
            }
        }

        result.map(Some)
    }

    fn start_cooldown(&self, inner: &mut HandleInner, cooldown: Duration, epoch: u64) {
        if let Some(task) = inner.cooldown_task.take() {
            task.abort();
        }
        if cooldown.is_zero() {
            inner.cooldown_remaining = Duration::ZERO;
            return;
        }
        inner.cooldown_remaining = cooldown;
        let state = Arc::clone(&self.inner);
        let tick = self.tick;
        inner.cooldown_task = Some(tokio::spawn(async move {
            loop {
                sleep(tick).await;
                let mut inner = state.lock();
                if inner.epoch != epoch {
                    return;
                }
                inner.cooldown_remaining = inner.cooldown_remaining.saturating_sub(tick);
                if inner.cooldown_remaining.is_zero() {
                    inner.cooldown_task = None;
                    return;
                }
            }
        }));
    }

    /// Clear the budget, cooldown, and in-flight marker
    ///
    /// Safe to call at any time; a call completing after a reset does not
    /// re-consume budget. Resetting twice is the same as resetting once.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.attempt_count = 0;
        inner.cooldown_remaining = Duration::ZERO;
        inner.in_progress = false;
        if let Some(task) = inner.cooldown_task.take() {
            task.abort();
        }
    }

    /// Snapshot the current budget state
    #[must_use]
    pub fn state(&self) -> RetryState {
        let inner = self.inner.lock();
        RetryState {
            attempt_count: inner.attempt_count,
            max_attempts: inner.max_attempts,
            cooldown_remaining: inner.cooldown_remaining,
            in_progress: inner.in_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchforge_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(100), 2.0, Duration::from_secs(30))
    }

    fn server_error() -> PitchError {
        PitchError::backend("api", ErrorKind::Server, "upstream exploded")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_makes_one_call() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(3, &cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, PitchError>(42) }
            })
            .await;

        assert_eq!(result.expect("success"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failures_exhaust_budget_with_backoff() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let started = tokio::time::Instant::now();
        let result: PitchResult<u32> = policy
            .execute(3, &cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;
        let elapsed = started.elapsed();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // waits are delay(0) + delay(1) = 100ms + 200ms
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");

        let error = result.expect_err("exhausted budget");
        assert_eq!(error.kind(), ErrorKind::Server);
        assert!(error.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: PitchResult<u32> = policy
            .execute(5, &cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PitchError::validation("bad input")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PitchError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_runs_once() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(0, &cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, PitchError>("hi") }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_invokes_op() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: PitchResult<u32> = policy
            .execute(3, &cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;

        assert!(matches!(result, Err(PitchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt_discards_late_success() {
        let policy = RetryPolicy::new(fast_backoff());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: PitchResult<u32> = policy
            .execute(3, &cancel, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                let cancel = cancel.clone();
                async move {
                    if attempt == 0 {
                        Err(server_error())
                    } else {
                        // cancellation lands while this attempt is in flight
                        cancel.cancel();
                        Ok(7)
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(PitchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff_wait() {
        let policy = RetryPolicy::new(BackoffPolicy::new(
            Duration::from_secs(10),
            2.0,
            Duration::from_secs(60),
        ));
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let counting = Arc::clone(&calls);
        let result: PitchResult<u32> = policy
            .execute(3, &cancel, move |_attempt| {
                counting.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(matches!(result, Err(PitchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // the 10s backoff wait was cut short
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_consumes_budget_and_starts_cooldown() {
        let handle = RetryHandle::new(
            BackoffPolicy::new(Duration::from_millis(200), 2.0, Duration::from_secs(30)),
            3,
        )
        .with_tick(Duration::from_millis(50));

        let result = handle.retry(|| async { Ok::<_, PitchError>(42) }).await;
        assert_eq!(result.expect("admitted"), Some(42));

        let state = handle.state();
        assert_eq!(state.attempt_count, 1);
        assert_eq!(state.cooldown_remaining, Duration::from_millis(200));
        assert!(!state.can_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_during_cooldown_is_not_invoked() {
        let handle = RetryHandle::new(
            BackoffPolicy::new(Duration::from_millis(200), 2.0, Duration::from_secs(30)),
            3,
        );
        let calls = AtomicU32::new(0);

        handle
            .retry(|| async { Ok::<_, PitchError>(()) })
            .await
            .expect("first call");

        let blocked = handle
            .retry(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, PitchError>(()) }
            })
            .await;
        assert_eq!(blocked.expect("no-op"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_counts_down_in_ticks() {
        let handle = RetryHandle::new(
            BackoffPolicy::new(Duration::from_millis(200), 2.0, Duration::from_secs(30)),
            3,
        )
        .with_tick(Duration::from_millis(50));

        handle
            .retry(|| async { Ok::<_, PitchError>(()) })
            .await
            .expect("first call");

        sleep(Duration::from_millis(60)).await;
        let mid = handle.state();
        assert_eq!(mid.cooldown_remaining, Duration::from_millis(150));
        assert!(!mid.can_retry());

        sleep(Duration::from_millis(200)).await;
        let done = handle.state();
        assert_eq!(done.cooldown_remaining, Duration::ZERO);
        assert!(done.can_retry());
        assert_eq!(done.attempt_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_returns_none() {
        let handle = RetryHandle::new(
            BackoffPolicy::new(Duration::from_millis(100), 2.0, Duration::from_secs(30)),
            1,
        )
        .with_tick(Duration::from_millis(50));

        handle
            .retry(|| async { Ok::<_, PitchError>(()) })
            .await
            .expect("first call");
        sleep(Duration::from_millis(200)).await;
        assert!(handle.state().cooldown_remaining.is_zero());

        let blocked = handle.retry(|| async { Ok::<_, PitchError>(()) }).await;
        assert_eq!(blocked.expect("no-op"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_still_consumes_an_attempt() {
        let handle = RetryHandle::new(fast_backoff(), 3);

        let result: PitchResult<Option<u32>> =
            handle.retry(|| async { Err(server_error()) }).await;
        assert!(result.is_err());
        assert_eq!(handle.state().attempt_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restores_budget_and_is_idempotent() {
        let handle = RetryHandle::new(
            BackoffPolicy::new(Duration::from_secs(5), 2.0, Duration::from_secs(30)),
            2,
        );

        handle
            .retry(|| async { Ok::<_, PitchError>(()) })
            .await
            .expect("first call");
        assert!(!handle.state().can_retry());

        handle.reset();
        let once = handle.state();
        assert_eq!(once.attempt_count, 0);
        assert!(once.cooldown_remaining.is_zero());
        assert!(once.can_retry());

        handle.reset();
        assert_eq!(handle.state(), once);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_inflight_call_keeps_state_cleared() {
        let handle = Arc::new(RetryHandle::new(
            BackoffPolicy::new(Duration::from_secs(5), 2.0, Duration::from_secs(30)),
            2,
        ));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let worker = Arc::clone(&handle);
        let call = tokio::spawn(async move {
            worker
                .retry(|| async move {
                    release_rx.await.ok();
                    Ok::<_, PitchError>(9)
                })
                .await
        });

        // let the call get admitted, then reset underneath it
        tokio::task::yield_now().await;
        assert!(handle.state().in_progress);
        handle.reset();

        release_tx.send(()).expect("release");
        let result = call.await.expect("join");
        assert_eq!(result.expect("call result"), Some(9));

        // the completion after reset must not re-consume budget
        let state = handle.state();
        assert_eq!(state.attempt_count, 0);
        assert!(state.cooldown_remaining.is_zero());
        assert!(!state.in_progress);
    }
}
