//! Priority-ordered provider fallback.
//!
//! The chain walks providers in ascending priority order, giving each one
//! its configured attempt budget through the retry policy before moving
//! on. Every attempt is reported to the configured observer, so
//! monitoring sees retries and fallbacks as individual samples.

use pitchforge_core::{
    AttemptObserver, AttemptOutcome, AttemptRecord, ErrorKind, NullObserver, Pitch, PitchError,
    PitchProvider, PitchRequest, PitchResult, ProviderConfig,
};
use pitchforge_resilience::{with_deadline, RetryPolicy};
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// One provider slot in the chain
pub struct ChainEntry {
    /// Chain-level settings for this provider
    pub config: ProviderConfig,
    /// The provider implementation
    pub provider: Arc<dyn PitchProvider>,
}

impl ChainEntry {
    /// Create a chain entry
    #[must_use]
    pub fn new(config: ProviderConfig, provider: Arc<dyn PitchProvider>) -> Self {
        Self { config, provider }
    }
}

/// Result of a successful chain traversal
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// The generated pitch
    pub pitch: Pitch,
    /// Provider that produced it
    pub provider_id: String,
    /// Attempts consumed across all providers, including the winner
    pub attempts: u32,
    /// Wall-clock time for the whole traversal, in milliseconds
    pub elapsed_ms: u64,
}

/// Provider chain with per-provider retry budgets
pub struct FallbackChain {
    entries: Vec<ChainEntry>,
    retry: RetryPolicy,
    observer: Arc<dyn AttemptObserver>,
}

impl FallbackChain {
    /// Create a chain; entries are sorted by ascending priority
    #[must_use]
    pub fn new(mut entries: Vec<ChainEntry>, retry: RetryPolicy) -> Self {
        entries.sort_by_key(|entry| entry.config.priority);
        Self {
            entries,
            retry,
            observer: Arc::new(NullObserver),
        }
    }

    /// Attach an attempt observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Providers in traversal order
    #[must_use]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Whether at least one provider is enabled
    #[must_use]
    pub fn has_enabled_provider(&self) -> bool {
        self.entries.iter().any(|entry| entry.config.enabled)
    }

    /// Generate a pitch, falling back through the chain on failure
    ///
    /// Cancellation short-circuits the traversal; any other failure
    /// advances to the next enabled provider once the current one's
    /// attempt budget is spent.
    ///
    /// # Errors
    /// Returns `PitchError::Configuration` when no provider is enabled,
    /// `PitchError::Cancelled` on cancellation, and
    /// `PitchError::AllProvidersFailed` carrying the final provider's
    /// failure once every provider has been exhausted
    #[instrument(skip(self, request, cancel), fields(providers = self.entries.len()))]
    pub async fn generate(
        &self,
        request: &PitchRequest,
        cancel: &CancellationToken,
    ) -> PitchResult<GenerationOutcome> {
        if !self.has_enabled_provider() {
            return Err(PitchError::configuration("no enabled providers configured"));
        }

        let started = Instant::now();
        let total_attempts = Arc::new(AtomicU32::new(0));
        let mut last_error: Option<PitchError> = None;

        for entry in &self.entries {
            if !entry.config.enabled {
                debug!(provider = %entry.config.id, "Skipping disabled provider");
                continue;
            }

            match self
                .try_provider(entry, request, cancel, &total_attempts)
                .await
            {
                Ok(pitch) => {
                    return Ok(GenerationOutcome {
                        pitch,
                        provider_id: entry.config.id.clone(),
                        attempts: total_attempts.load(Ordering::SeqCst),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(PitchError::Cancelled) => return Err(PitchError::Cancelled),
                Err(error) => {
                    warn!(
                        provider = %entry.config.id,
                        error = %error,
                        "Provider exhausted, trying next in chain"
                    );
                    last_error = Some(error);
                }
            }
        }

        let attempts = total_attempts.load(Ordering::SeqCst);
        Err(match last_error {
            Some(error) => PitchError::AllProvidersFailed {
                attempts,
                last_kind: error.kind(),
                last_message: error.to_string(),
            },
            None => PitchError::AllProvidersFailed {
                attempts,
                last_kind: ErrorKind::Unknown,
                last_message: "no providers produced a result".to_string(),
            },
        })
    }

    /// Drive one provider through its attempt budget
    async fn try_provider(
        &self,
        entry: &ChainEntry,
        request: &PitchRequest,
        cancel: &CancellationToken,
        total_attempts: &Arc<AtomicU32>,
    ) -> PitchResult<Pitch> {
        let provider = Arc::clone(&entry.provider);
        let observer = Arc::clone(&self.observer);
        let provider_id = entry.config.id.clone();
        let deadline = entry.provider.call_timeout();
        let request = request.clone();
        let total = Arc::clone(total_attempts);

        self.retry
            .execute(entry.config.max_attempts, cancel, move |attempt| {
                let provider = Arc::clone(&provider);
                let observer = Arc::clone(&observer);
                let provider_id = provider_id.clone();
                let request = request.clone();
                let total = Arc::clone(&total);
                async move {
                    total.fetch_add(1, Ordering::SeqCst);
                    let started_at = Utc::now();
                    let clock = Instant::now();
                    let result =
                        with_deadline(deadline, &provider_id, provider.generate(&request)).await;
                    let record = AttemptRecord {
                        provider_id,
                        attempt_index: attempt,
                        started_at,
                        finished_at: Utc::now(),
                        outcome: match &result {
                            Ok(_) => AttemptOutcome::Success,
                            Err(error) => AttemptOutcome::Failure(error.kind()),
                        },
                        latency_ms: clock.elapsed().as_millis() as u64,
                        error: result.as_ref().err().map(ToString::to_string),
                    };
                    observer.on_attempt(&record);
                    result
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pitchforge_core::{Idea, Tone};
    use pitchforge_resilience::BackoffPolicy;
    use std::time::Duration;

    struct MockProvider {
        id: String,
        fail_first: u32,
        error_kind: ErrorKind,
        calls: AtomicU32,
    }

    impl MockProvider {
        fn succeeding(id: &str) -> Arc<Self> {
            Self::failing_then_succeeding(id, 0, ErrorKind::Server)
        }

        fn always_failing(id: &str, kind: ErrorKind) -> Arc<Self> {
            Self::failing_then_succeeding(id, u32::MAX, kind)
        }

        fn failing_then_succeeding(id: &str, fail_first: u32, kind: ErrorKind) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                fail_first,
                error_kind: kind,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PitchProvider for MockProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn generate(&self, request: &PitchRequest) -> PitchResult<Pitch> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(PitchError::backend(
                    &self.id,
                    self.error_kind,
                    format!("{} is down", self.id),
                ));
            }
            Ok(Pitch {
                name: format!("{} pitch", self.id),
                tagline: request.idea.as_str().to_string(),
                elevator_pitch: "A pitch".to_string(),
                target_audience: "Everyone".to_string(),
                key_features: vec![],
            })
        }
    }

    struct CancellingProvider {
        id: String,
        cancel: CancellationToken,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PitchProvider for CancellingProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn generate(&self, _request: &PitchRequest) -> PitchResult<Pitch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Err(PitchError::backend(
                &self.id,
                ErrorKind::Server,
                "interrupted",
            ))
        }
    }

    #[derive(Default)]
    struct CollectingObserver {
        records: Mutex<Vec<AttemptRecord>>,
    }

    impl AttemptObserver for CollectingObserver {
        fn on_attempt(&self, record: &AttemptRecord) {
            self.records.lock().push(record.clone());
        }
    }

    fn request() -> PitchRequest {
        PitchRequest {
            idea: Idea::new("Uber for dogs").expect("idea"),
            tone: Tone::new("fun").expect("tone"),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(BackoffPolicy::new(
            Duration::from_millis(10),
            2.0,
            Duration::from_secs(1),
        ))
    }

    fn entry(id: &str, priority: u32, max_attempts: u32, provider: Arc<dyn PitchProvider>) -> ChainEntry {
        let mut config = ProviderConfig::new(id, priority);
        config.max_attempts = max_attempts;
        ChainEntry::new(config, provider)
    }

    #[tokio::test]
    async fn test_first_provider_success_stops_chain() {
        let a = MockProvider::succeeding("a");
        let b = MockProvider::succeeding("b");
        let chain = FallbackChain::new(
            vec![
                entry("a", 1, 3, a.clone()),
                entry("b", 2, 3, b.clone()),
            ],
            fast_retry(),
        );

        let outcome = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("success");

        assert_eq!(outcome.provider_id, "a");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_through_chain() {
        let a = MockProvider::always_failing("a", ErrorKind::Server);
        let b = MockProvider::always_failing("b", ErrorKind::Network);
        let c = MockProvider::succeeding("c");
        let chain = FallbackChain::new(
            vec![
                entry("a", 1, 2, a.clone()),
                entry("b", 2, 1, b.clone()),
                entry("c", 3, 3, c.clone()),
            ],
            fast_retry(),
        );

        let outcome = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("third provider succeeds");

        assert_eq!(outcome.provider_id, "c");
        assert_eq!(outcome.attempts, 4);
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_provider_is_skipped() {
        let a = MockProvider::succeeding("a");
        let b = MockProvider::succeeding("b");
        let mut disabled = ProviderConfig::new("a", 1);
        disabled.enabled = false;
        let chain = FallbackChain::new(
            vec![
                ChainEntry::new(disabled, a.clone()),
                entry("b", 2, 3, b.clone()),
            ],
            fast_retry(),
        );

        let outcome = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("enabled provider succeeds");

        assert_eq!(outcome.provider_id, "b");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_reports_last_provider_error() {
        let a = MockProvider::always_failing("a", ErrorKind::Server);
        let b = MockProvider::always_failing("b", ErrorKind::Network);
        let chain = FallbackChain::new(
            vec![
                entry("a", 1, 1, a.clone()),
                entry("b", 2, 1, b.clone()),
            ],
            fast_retry(),
        );

        let error = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect_err("every provider fails");

        match error {
            PitchError::AllProvidersFailed {
                attempts,
                last_kind,
                last_message,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_kind, ErrorKind::Network);
                assert!(last_message.contains("b is down"));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_entries_sorted_by_priority() {
        let low = MockProvider::succeeding("low");
        let high = MockProvider::succeeding("high");
        let chain = FallbackChain::new(
            vec![
                entry("low", 5, 3, low.clone()),
                entry("high", 1, 3, high.clone()),
            ],
            fast_retry(),
        );

        assert_eq!(chain.entries()[0].config.id, "high");

        let outcome = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("success");
        assert_eq!(outcome.provider_id, "high");
        assert_eq!(low.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_attempt() {
        let a = MockProvider::failing_then_succeeding("a", 2, ErrorKind::Server);
        let observer = Arc::new(CollectingObserver::default());
        let chain = FallbackChain::new(vec![entry("a", 1, 3, a.clone())], fast_retry())
            .with_observer(observer.clone());

        chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("succeeds on third attempt");

        let records = observer.records.lock();
        assert_eq!(records.len(), 3);
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.provider_id, "a");
            assert_eq!(record.attempt_index, index as u32);
        }
        assert_eq!(records[0].outcome, AttemptOutcome::Failure(ErrorKind::Server));
        assert!(records[0].error.is_some());
        assert_eq!(records[2].outcome, AttemptOutcome::Success);
        assert!(records[2].error.is_none());
    }

    #[tokio::test]
    async fn test_no_enabled_providers_is_configuration_error() {
        let a = MockProvider::succeeding("a");
        let mut disabled = ProviderConfig::new("a", 1);
        disabled.enabled = false;
        let chain = FallbackChain::new(vec![ChainEntry::new(disabled, a)], fast_retry());

        let error = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect_err("nothing to try");
        assert!(matches!(error, PitchError::Configuration { .. }));

        let empty = FallbackChain::new(vec![], fast_retry());
        let error = empty
            .generate(&request(), &CancellationToken::new())
            .await
            .expect_err("empty chain");
        assert!(matches!(error, PitchError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_short_circuits_chain() {
        let cancel = CancellationToken::new();
        let a = Arc::new(CancellingProvider {
            id: "a".to_string(),
            cancel: cancel.clone(),
            calls: AtomicU32::new(0),
        });
        let b = MockProvider::succeeding("b");
        let chain = FallbackChain::new(
            vec![
                entry("a", 1, 3, a.clone()),
                entry("b", 2, 3, b.clone()),
            ],
            fast_retry(),
        );

        let error = chain
            .generate(&request(), &cancel)
            .await
            .expect_err("cancelled");

        assert!(matches!(error, PitchError::Cancelled));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_advances_to_next_provider() {
        let a = MockProvider::always_failing("a", ErrorKind::Validation);
        let b = MockProvider::succeeding("b");
        let chain = FallbackChain::new(
            vec![
                entry("a", 1, 3, a.clone()),
                entry("b", 2, 3, b.clone()),
            ],
            fast_retry(),
        );

        let outcome = chain
            .generate(&request(), &CancellationToken::new())
            .await
            .expect("fallback succeeds");

        // the non-retryable failure burns one attempt, not the full budget
        assert_eq!(a.calls(), 1);
        assert_eq!(outcome.provider_id, "b");
        assert_eq!(outcome.attempts, 2);
    }
}
