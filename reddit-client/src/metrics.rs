use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub total_response_time: Duration,
    pub last_request_time: Option<SystemTime>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
}

impl ApiMetrics {
    pub fn average_response_time(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.total_requests as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub max_response_time: Duration,
}

/// One finished HTTP exchange. `endpoint` is a route label such as
/// `user_comments`, not the concrete path.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<ApiMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.total_response_time += request.response_time;
        metrics.last_request_time = Some(SystemTime::now());

        if request.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if request.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        let endpoint = metrics
            .requests_by_endpoint
            .entry(request.endpoint)
            .or_default();
        endpoint.request_count += 1;
        if !request.success {
            endpoint.error_count += 1;
        }
        endpoint.max_response_time = endpoint.max_response_time.max(request.response_time);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(endpoint: &str, success: bool, rate_limited: bool, ms: u64) -> RequestMetrics {
        RequestMetrics {
            endpoint: endpoint.to_string(),
            status_code: Some(if success { 200 } else { 429 }),
            response_time: Duration::from_millis(ms),
            success,
            rate_limited,
        }
    }

    #[tokio::test]
    async fn test_records_per_endpoint() {
        let collector = MetricsCollector::new();
        collector
            .record_request(request("user_comments", true, false, 100))
            .await;
        collector
            .record_request(request("user_comments", false, true, 300))
            .await;
        collector
            .record_request(request("subreddit_about", true, false, 50))
            .await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.rate_limited_requests, 1);
        assert_eq!(metrics.average_response_time(), Duration::from_millis(150));

        let comments = &metrics.requests_by_endpoint["user_comments"];
        assert_eq!(comments.request_count, 2);
        assert_eq!(comments.error_count, 1);
        assert_eq!(comments.max_response_time, Duration::from_millis(300));
    }
}
