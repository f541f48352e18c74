use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // User store metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of user store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "User store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_attempts_total",
        "Total number of authentication attempts",
        &["method", "outcome"]
    )
    .unwrap();

    pub static ref USERS_REGISTERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "users_registered_total",
        "Total number of accounts created",
        &["provider"]
    )
    .unwrap();

    pub static ref QUIZ_RESULTS_SAVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_results_saved_total",
        "Total number of quiz results persisted",
        &["difficulty"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families)
}

/// Time a user store call and count it by outcome.
pub async fn track_store_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

pub fn record_auth_attempt(method: &str, outcome: &str) {
    AUTH_ATTEMPTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
}

pub fn record_user_registered(provider: &str) {
    USERS_REGISTERED_TOTAL.with_label_values(&[provider]).inc();
}

pub fn record_result_saved(difficulty: &str) {
    QUIZ_RESULTS_SAVED_TOTAL
        .with_label_values(&[difficulty])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_operations_are_counted_by_outcome() {
        let ok: Result<u8, String> = track_store_operation("metrics_test", async { Ok(1) }).await;
        assert_eq!(ok, Ok(1));
        let err: Result<u8, String> =
            track_store_operation("metrics_test", async { Err("boom".to_string()) }).await;
        assert!(err.is_err());

        let success = STORE_OPERATIONS_TOTAL
            .with_label_values(&["metrics_test", "success"])
            .get();
        let failure = STORE_OPERATIONS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();
        assert_eq!(success, 1);
        assert_eq!(failure, 1);
    }

    #[test]
    fn rendered_output_includes_business_metrics() {
        record_result_saved("easy");
        let text = render_metrics().unwrap();
        assert!(text.contains("quiz_results_saved_total"));
    }
}
