//! Error recovery strategies for different types of errors.
//!
//! Lookups that may legitimately fail for a single item (a banned community, a
//! deleted trophy list, one classifier call) are recovered here, either by
//! retrying with backoff or by degrading to a placeholder value. Degradation is
//! an explicit [`Degradable`] variant so callers can count and test it.

use crate::{CoreError, ErrorExt, RedditApiError};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Recovery strategy for handling errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation with exponential backoff. `max_attempts` counts
    /// the call that failed first.
    RetryWithBackoff {
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    },
    /// Substitute a placeholder value and continue
    Degrade,
    /// Fail immediately
    Fail,
}

/// Value of an operation that is allowed to fall back to a placeholder.
#[derive(Debug, PartialEq)]
pub enum Degradable<T> {
    /// The operation succeeded, possibly after retries
    Recovered(T),
    /// The operation failed and a placeholder value stands in for it
    Degraded { value: T, reason: String },
}

/// Error recovery handler that provides strategies for different error types
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        match error {
            CoreError::Network(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
            },

            CoreError::RedditApi(reddit_error) => match reddit_error {
                RedditApiError::RateLimitExceeded { retry_after } => {
                    RecoveryStrategy::RetryWithBackoff {
                        max_attempts: 2,
                        initial_delay: Duration::from_secs(*retry_after),
                        max_delay: Duration::from_secs(300),
                    }
                }
                RedditApiError::ServerError { .. } | RedditApiError::RequestTimeout => {
                    RecoveryStrategy::RetryWithBackoff {
                        max_attempts: 3,
                        initial_delay: Duration::from_secs(1),
                        max_delay: Duration::from_secs(30),
                    }
                }
                // Banned, quarantined, private or deleted resources
                RedditApiError::Forbidden { .. }
                | RedditApiError::SubredditNotFound { .. }
                | RedditApiError::UserNotFound { .. }
                | RedditApiError::NotFound { .. }
                | RedditApiError::InvalidResponse { .. } => RecoveryStrategy::Degrade,
                RedditApiError::AuthenticationFailed { .. } | RedditApiError::InvalidToken => {
                    RecoveryStrategy::Fail
                }
            },

            CoreError::Classifier(_) | CoreError::Embedding(_) | CoreError::Index(_)
                if !error.is_retryable() =>
            {
                RecoveryStrategy::Fail
            }

            CoreError::Classifier(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
            },

            CoreError::Embedding(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 3,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
            },

            CoreError::Index(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 5,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(5),
            },

            CoreError::Timeout { .. } => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 1,
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(10),
            },

            CoreError::Io(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
            },

            // Needs user intervention or was already retried upstream
            CoreError::InvalidReference { .. }
            | CoreError::Config(_)
            | CoreError::Persistence(_)
            | CoreError::UpstreamFetch { .. }
            | CoreError::Serialization(_) => RecoveryStrategy::Fail,

            CoreError::Internal { .. } => RecoveryStrategy::Degrade,
        }
    }

    /// Run an operation and, on failure, recover according to the error's
    /// strategy. Errors that cannot be retried away are returned.
    pub async fn recover<F, T, Fut>(mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match Self::determine_strategy(&error) {
            RecoveryStrategy::RetryWithBackoff {
                max_attempts,
                initial_delay,
                max_delay,
            } => {
                Self::retry_with_backoff(operation, error, max_attempts, initial_delay, max_delay)
                    .await
            }
            RecoveryStrategy::Degrade | RecoveryStrategy::Fail => Err(error),
        }
    }

    /// Like [`ErrorRecovery::recover`], but never fails: when the operation
    /// cannot be recovered the fallback value is returned as `Degraded`.
    pub async fn recover_or_degrade<F, T, Fut, D>(operation: F, fallback: D) -> Degradable<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        D: FnOnce() -> T,
    {
        match Self::recover(operation).await {
            Ok(value) => Degradable::Recovered(value),
            Err(error) => Degradable::Degraded {
                value: fallback(),
                reason: error.to_string(),
            },
        }
    }

    /// Keep calling `operation` after `error` until it succeeds, the error
    /// stops being retryable or `max_attempts` calls in total have failed.
    async fn retry_with_backoff<F, T, Fut>(
        mut operation: F,
        mut error: CoreError,
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 1;
        let mut delay = initial_delay;

        loop {
            if attempt >= max_attempts || !error.is_retryable() {
                return Err(error);
            }

            if let Some(retry_delay) = error.retry_after() {
                delay = retry_delay;
            }
            delay = delay.min(max_delay);

            info!(
                "Recovery attempt {}/{} failed. Retrying after {:?}: {}",
                attempt,
                max_attempts,
                delay,
                error.user_friendly_message()
            );
            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, max_delay);

            error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassifierError, ConfigError, EmbeddingError, IndexError};
    use std::cell::Cell;

    fn loading_model() -> CoreError {
        CoreError::Classifier(ClassifierError::ModelLoading {
            model: "m".to_string(),
            estimated_secs: 0,
        })
    }

    #[tokio::test]
    async fn test_first_call_counts_toward_max_attempts() {
        let calls = Cell::new(0);
        let result = ErrorRecovery::recover(|| {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(loading_model()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(CoreError::Classifier(ClassifierError::ModelLoading { .. }))
        ));
        // classifier errors retry with max_attempts: 3
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_recover_after_transient_failure() {
        let calls = Cell::new(0);
        let value = ErrorRecovery::recover(|| {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt == 1 {
                    Err(loading_model())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result = ErrorRecovery::recover(|| {
            calls.set(calls.get() + 1);
            async {
                Err::<(), _>(CoreError::Embedding(EmbeddingError::ModelNotFound {
                    model_name: "m".to_string(),
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_determine_strategy() {
        let banned = CoreError::RedditApi(RedditApiError::Forbidden {
            resource: "/r/banned/about".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&banned),
            RecoveryStrategy::Degrade
        );

        let config_error = CoreError::Config(ConfigError::MissingField {
            field: "test".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&config_error),
            RecoveryStrategy::Fail
        );

        let locked = CoreError::Index(IndexError::IndexLocked);
        assert!(matches!(
            ErrorRecovery::determine_strategy(&locked),
            RecoveryStrategy::RetryWithBackoff {
                max_attempts: 5,
                ..
            }
        ));

        let bad_output = CoreError::Classifier(ClassifierError::InferenceFailed {
            model: "m".to_string(),
            reason: "boom".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&bad_output),
            RecoveryStrategy::Fail
        );
    }

    #[tokio::test]
    async fn test_recover_or_degrade_uses_fallback_without_retrying_permanent_errors() {
        let calls = Cell::new(0);
        let result = ErrorRecovery::recover_or_degrade(
            || {
                calls.set(calls.get() + 1);
                async {
                    Err::<String, _>(CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: "gone".to_string(),
                    }))
                }
            },
            || "placeholder".to_string(),
        )
        .await;

        assert_eq!(calls.get(), 1);
        match result {
            Degradable::Degraded { value, reason } => {
                assert_eq!(value, "placeholder");
                assert!(reason.contains("gone"));
            }
            other => panic!("expected degraded result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recover_passes_success_through() {
        let value = ErrorRecovery::recover(|| async { Ok::<_, CoreError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
