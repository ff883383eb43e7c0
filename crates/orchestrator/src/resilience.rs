//! Resilient invocation: bounded retry with jittered delay, a per-attempt
//! timeout, and a fallback once every attempt has failed.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::Value;
use tracing::{debug, error, warn};

use boardroom_core::ResilienceSettings;

use crate::error::{AttemptFailure, Error, Result, WorkerError};
use crate::scope::Scope;
use crate::worker::{Fallback, WorkerSpec};

/// Retry, delay, jitter and timeout for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResiliencePolicy {
    /// Retries after the first attempt (0 = exactly one attempt).
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Upper bound of the uniform random extra pause.
    pub jitter: Duration,
    /// Ceiling for a single attempt; every attempt gets a fresh budget.
    pub timeout: Duration,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(100),
            jitter: Duration::from_millis(50),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ResilienceSettings> for ResiliencePolicy {
    fn from(settings: &ResilienceSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay: settings.delay,
            jitter: settings.jitter,
            timeout: settings.timeout,
        }
    }
}

impl ResiliencePolicy {
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// No retries - execute only once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Total attempts including the first.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause before the next attempt: `delay + uniform(0, jitter)`.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        let extra = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=self.jitter)
        };
        self.delay.saturating_add(extra)
    }
}

/// Where a settled value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Primary,
    Fallback,
}

/// A value produced by [`ResilientInvoker::invoke`].
#[derive(Debug, Clone)]
pub struct Settled<T> {
    pub value: T,
    pub source: ValueSource,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Total time spent, including delays.
    pub elapsed: Duration,
}

impl<T> Settled<T> {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == ValueSource::Fallback
    }
}

/// One attempt in flight; transient, used for logging.
#[derive(Debug, Clone, Copy)]
struct InvocationAttempt {
    number: u32,
    started_at: Instant,
}

impl InvocationAttempt {
    fn start(number: u32) -> Self {
        Self {
            number,
            started_at: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

/// Wraps invocations with the configured policy.
#[derive(Debug, Clone, Default)]
pub struct ResilientInvoker {
    policy: ResiliencePolicy,
}

impl ResilientInvoker {
    #[must_use]
    pub const fn new(policy: ResiliencePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// `input` is handed to the fallback as-is. The fallback runs at most once,
    /// only after the final attempt failed or timed out.
    ///
    /// # Errors
    ///
    /// Returns `Error::Exhausted` if every attempt failed and no fallback was given.
    pub async fn invoke<I, T, F, Fut>(
        &self,
        name: &str,
        input: &I,
        mut operation: F,
        fallback: Option<&Fallback<I, T>>,
    ) -> Result<Settled<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, WorkerError>>,
    {
        let started = Instant::now();
        let total_attempts = self.policy.total_attempts();
        let mut number = 0u32;

        let last_failure = loop {
            number = number.saturating_add(1);
            let attempt = InvocationAttempt::start(number);

            let failure = match tokio::time::timeout(self.policy.timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempt.number > 1 {
                        debug!(worker = name, attempt = attempt.number, "Worker succeeded after retry");
                    }
                    return Ok(Settled {
                        value,
                        source: ValueSource::Primary,
                        attempts: attempt.number,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(Err(e)) => {
                    warn!(
                        worker = name,
                        attempt = attempt.number,
                        elapsed_ms = attempt.elapsed_ms(),
                        error = %e,
                        "Worker attempt failed"
                    );
                    AttemptFailure::Failed(e)
                }
                Err(_) => {
                    warn!(
                        worker = name,
                        attempt = attempt.number,
                        elapsed_ms = attempt.elapsed_ms(),
                        timeout_ms = self.policy.timeout.as_millis(),
                        "Worker attempt timed out"
                    );
                    AttemptFailure::TimedOut {
                        timeout: self.policy.timeout,
                    }
                }
            };

            if number >= total_attempts {
                break failure;
            }

            let delay = self.policy.retry_delay();
            debug!(
                worker = name,
                attempt = number,
                delay_ms = delay.as_millis(),
                "Retrying after delay"
            );
            tokio::time::sleep(delay).await;
        };

        match fallback {
            Some(fallback) => {
                warn!(
                    worker = name,
                    attempts = number,
                    elapsed_ms = started.elapsed().as_millis(),
                    error = %last_failure,
                    "Retries exhausted, invoking fallback"
                );
                let value = fallback(input, &last_failure);
                Ok(Settled {
                    value,
                    source: ValueSource::Fallback,
                    attempts: number,
                    elapsed: started.elapsed(),
                })
            }
            None => {
                error!(
                    worker = name,
                    attempts = number,
                    elapsed_ms = started.elapsed().as_millis(),
                    error = %last_failure,
                    "Retries exhausted, no fallback configured"
                );
                Err(Error::exhausted(name, number, last_failure))
            }
        }
    }

    /// Invoke a registered worker against a shared scope snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Exhausted` if the worker never succeeded and has no fallback.
    pub async fn invoke_worker(&self, spec: &WorkerSpec, scope: Arc<Scope>) -> Result<Settled<Value>> {
        let worker = Arc::clone(spec.worker());
        let operation = || {
            let worker = Arc::clone(&worker);
            let scope = Arc::clone(&scope);
            async move { worker.invoke(&scope).await }
        };
        self.invoke(spec.name(), scope.as_ref(), operation, spec.fallback())
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_total_attempts() {
        assert_eq!(ResiliencePolicy::no_retry().total_attempts(), 1);
        assert_eq!(ResiliencePolicy::default().total_attempts(), 3);
        assert_eq!(
            ResiliencePolicy::default()
                .with_max_retries(u32::MAX)
                .total_attempts(),
            u32::MAX
        );
    }

    #[test]
    fn test_retry_delay_within_jitter_bounds() {
        let policy = ResiliencePolicy::default()
            .with_delay(Duration::from_millis(100))
            .with_jitter(Duration::from_millis(50));

        for _ in 0..200 {
            let delay = policy.retry_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_retry_delay_keeps_sub_millisecond_jitter() {
        let policy = ResiliencePolicy::default()
            .with_delay(Duration::from_millis(1))
            .with_jitter(Duration::from_micros(500));

        let delays: Vec<Duration> = (0..200).map(|_| policy.retry_delay()).collect();
        assert!(delays.iter().all(|d| *d <= Duration::from_micros(1_500)));
        assert!(delays.iter().any(|d| *d > Duration::from_millis(1)));
    }

    #[test]
    fn test_retry_delay_without_jitter() {
        let policy = ResiliencePolicy::default()
            .with_delay(Duration::from_millis(80))
            .with_jitter(Duration::ZERO);
        assert_eq!(policy.retry_delay(), Duration::from_millis(80));
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = ResilienceSettings {
            max_retries: 4,
            delay: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
            timeout: Duration::from_secs(2),
        };
        let policy = ResiliencePolicy::from(&settings);
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let invoker = ResilientInvoker::default();
        let calls = AtomicU32::new(0);

        let settled = invoker
            .invoke(
                "adder",
                &(),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, WorkerError>(42) }
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(settled.value, 42);
        assert_eq!(settled.attempts, 1);
        assert_eq!(settled.source, ValueSource::Primary);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_one_attempt() {
        let invoker = ResilientInvoker::new(ResiliencePolicy::no_retry());
        let calls = AtomicU32::new(0);
        let fallback: Fallback<(), &str> = Arc::new(|_: &(), _: &AttemptFailure| "fallback");

        let settled = invoker
            .invoke(
                "flaky",
                &(),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<&str, _>(WorkerError::failed("nope")) }
                },
                Some(&fallback),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(settled.value, "fallback");
        assert!(settled.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_takes_three_calls() {
        let policy = ResiliencePolicy::default()
            .with_max_retries(2)
            .with_delay(Duration::from_millis(100))
            .with_jitter(Duration::from_millis(50));
        let invoker = ResilientInvoker::new(policy);
        let calls = AtomicU32::new(0);
        let fallback_calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fallback_calls);
        let fallback: Fallback<(), &str> = Arc::new(move |_: &(), _: &AttemptFailure| {
            counter.fetch_add(1, Ordering::SeqCst);
            "fallback"
        });

        let settled = invoker
            .invoke(
                "flaky",
                &(),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(WorkerError::failed("transient"))
                        } else {
                            Ok("ok")
                        }
                    }
                },
                Some(&fallback),
            )
            .await
            .unwrap();

        assert_eq!(settled.value, "ok");
        assert_eq!(settled.source, ValueSource::Primary);
        assert_eq!(settled.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_runs_fallback_exactly_once() {
        let invoker = ResilientInvoker::new(
            ResiliencePolicy::default()
                .with_max_retries(2)
                .with_delay(Duration::from_millis(100))
                .with_jitter(Duration::from_millis(50)),
        );
        let calls = AtomicU32::new(0);
        let fallback_calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fallback_calls);
        let fallback: Fallback<(), &str> = Arc::new(move |_: &(), _: &AttemptFailure| {
            counter.fetch_add(1, Ordering::SeqCst);
            "fb"
        });

        let settled = invoker
            .invoke(
                "broken",
                &(),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<&str, _>(WorkerError::failed("always")) }
                },
                Some(&fallback),
            )
            .await
            .unwrap();

        assert_eq!(settled.value, "fb");
        assert!(settled.is_fallback());
        assert_eq!(settled.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure_with_fresh_budget() {
        let policy = ResiliencePolicy::default()
            .with_max_retries(1)
            .with_timeout(Duration::from_millis(50));
        let invoker = ResilientInvoker::new(policy);
        let calls = AtomicU32::new(0);

        let settled = invoker
            .invoke(
                "slow-then-fast",
                &(),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            tokio::time::sleep(Duration::from_secs(10)).await;
                        } else {
                            tokio::time::sleep(Duration::from_millis(40)).await;
                        }
                        Ok::<_, WorkerError>("done")
                    }
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(settled.value, "done");
        assert_eq!(settled.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_fallback() {
        let invoker = ResilientInvoker::new(ResiliencePolicy::default().with_max_retries(1));

        let err = invoker
            .invoke(
                "broken",
                &(),
                || async { Err::<(), _>(WorkerError::failed("always")) },
                None,
            )
            .await
            .unwrap_err();

        match err {
            Error::Exhausted {
                worker,
                attempts,
                last_error,
            } => {
                assert_eq!(worker, "broken");
                assert_eq!(attempts, 2);
                assert_eq!(last_error, AttemptFailure::Failed(WorkerError::failed("always")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_receives_input_and_last_error() {
        #[derive(Debug)]
        struct Email {
            recipient: String,
        }

        let invoker = ResilientInvoker::new(
            ResiliencePolicy::default()
                .with_max_retries(0)
                .with_timeout(Duration::from_millis(10)),
        );
        let fallback: Fallback<Email, String> = Arc::new(|email: &Email, failure: &AttemptFailure| {
            format!("failed to email {} ({failure})", email.recipient)
        });
        let input = Email {
            recipient: "ops@example.com".to_string(),
        };

        let settled = invoker
            .invoke(
                "mailer",
                &input,
                || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<String, WorkerError>("sent".to_string())
                },
                Some(&fallback),
            )
            .await
            .unwrap();

        assert_eq!(
            settled.value,
            "failed to email ops@example.com (timed out after 10ms)"
        );
    }
}
