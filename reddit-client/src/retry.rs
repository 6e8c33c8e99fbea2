use persona_core::{CoreError, RedditApiError, RetrySettings};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Create retry config tuned for the Reddit API
    pub fn reddit() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_multiplier: 2.0,
            jitter_factor: settings.jitter_factor,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay the server asked for
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { status_code } if *status_code >= 500 => {
                RetryStrategy::Retry
            }
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            RedditApiError::ServerError { .. }
            | RedditApiError::AuthenticationFailed { .. }
            | RedditApiError::InvalidToken
            | RedditApiError::Forbidden { .. }
            | RedditApiError::SubredditNotFound { .. }
            | RedditApiError::UserNotFound { .. }
            | RedditApiError::NotFound { .. }
            | RedditApiError::InvalidResponse { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
    let exponential_delay = Duration::from_millis(delay_ms.min(config.max_delay_ms));

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
}

/// Wraps fallible Reddit calls with bounded retries.
///
/// Permanent errors are returned unchanged after the first attempt. When every
/// attempt fails with a transient error the result is
/// [`CoreError::UpstreamFetch`] naming the operation.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Mutex<RetryMetrics>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: Mutex::new(RetryMetrics::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn with_metrics(&self, update: impl FnOnce(&mut RetryMetrics)) {
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut metrics);
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut total_delay_ms = 0u64;
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let start_time = Instant::now();
            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        self.with_metrics(|m| {
                            m.total_retries += attempt as u64;
                            m.successful_retries += 1;
                        });
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {}ms)",
                            operation_name, attempt, total_delay_ms
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            attempt += 1;
            debug!(
                "Attempt {} failed for {} after {:?}: {}",
                attempt,
                operation_name,
                start_time.elapsed(),
                error
            );

            let delay = match get_retry_strategy(&error) {
                RetryStrategy::NoRetry => {
                    debug!("Not retrying {} due to error type: {}", operation_name, error);
                    self.with_metrics(|m| {
                        m.total_retries += (attempt - 1) as u64;
                        m.failed_operations += 1;
                    });
                    return Err(error);
                }
                RetryStrategy::Retry => calculate_delay(attempt - 1, &self.config),
                RetryStrategy::RetryWithDelay(delay) => delay,
            };

            if attempt >= self.config.max_attempts {
                self.with_metrics(|m| {
                    m.total_retries += (attempt - 1) as u64;
                    m.failed_operations += 1;
                });
                error!(
                    "Operation {} failed after {} attempts with total delay of {}ms",
                    operation_name, attempt, total_delay_ms
                );
                return Err(CoreError::UpstreamFetch {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    message: error.to_string(),
                });
            }

            total_delay_ms += delay.as_millis() as u64;
            info!("Retrying {} in {:?} due to: {}", operation_name, delay, error);
            sleep(delay).await;
        }
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_retry_config_reddit() {
        let config = RetryConfig::reddit();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_retry_strategy_for_errors() {
        let rate_limit_error =
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
        assert_eq!(
            get_retry_strategy(&rate_limit_error),
            RetryStrategy::RetryWithDelay(Duration::from_secs(60))
        );

        let auth_error = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
            reason: "Invalid token".to_string(),
        });
        assert_eq!(get_retry_strategy(&auth_error), RetryStrategy::NoRetry);

        let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
        assert_eq!(get_retry_strategy(&server_error), RetryStrategy::Retry);

        let gone = CoreError::RedditApi(RedditApiError::UserNotFound {
            username: "ghost".to_string(),
        });
        assert_eq!(get_retry_strategy(&gone), RetryStrategy::NoRetry);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = executor
            .execute("user comments", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CoreError::RedditApi(RedditApiError::ServerError {
                            status_code: 500,
                        }))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.successful_retries, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_upstream_fetch() {
        let executor = RetryExecutor::new(fast_config(2));
        let attempts = AtomicU32::new(0);

        let result: Result<(), CoreError> = executor
            .execute("user submissions", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::RedditApi(RedditApiError::RequestTimeout)) }
            })
            .await;

        match result {
            Err(CoreError::UpstreamFetch {
                operation,
                attempts: reported,
                ..
            }) => {
                assert_eq!(operation, "user submissions");
                assert_eq!(reported, 2);
            }
            other => panic!("expected UpstreamFetch, got {:?}", other),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(executor.get_metrics().failed_operations, 1);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = AtomicU32::new(0);

        let result: Result<(), CoreError> = executor
            .execute("user profile", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: "bad secret".to_string(),
                    }))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(
                RedditApiError::AuthenticationFailed { .. }
            ))
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(executor.get_metrics().total_retries, 0);
    }
}
