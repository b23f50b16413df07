// Prometheus metrics definitions for the Trespasser backend.

use std::sync::Once;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Attempts accepted, by game.
    pub static ref ATTEMPTS_SUBMITTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("trespasser_attempts_submitted_total", "Attempts accepted"),
        &["game"],
    )
    .unwrap();

    /// Status lookups answered, by game and resulting state.
    pub static ref STATUS_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("trespasser_status_queries_total", "Attempt status lookups answered"),
        &["game", "state"],
    )
    .unwrap();

    /// Result files handed out, by game.
    pub static ref RESULTS_SERVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("trespasser_results_served_total", "Attempt results served"),
        &["game"],
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("trespasser_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Size of accepted submissions in bytes.
    pub static ref SUBMISSION_BYTES: Histogram = Histogram::with_opts(
        HistogramOpts::new("trespasser_submission_bytes", "Accepted submission size in bytes")
            .buckets(prometheus::exponential_buckets(256.0, 4.0, 9).unwrap_or_default()),
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "trespasser_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ATTEMPTS_SUBMITTED_TOTAL.clone()),
            Box::new(STATUS_QUERIES_TOTAL.clone()),
            Box::new(RESULTS_SERVED_TOTAL.clone()),
            Box::new(API_REQUESTS_TOTAL.clone()),
            Box::new(SUBMISSION_BYTES.clone()),
            Box::new(API_REQUEST_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::error!("Failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Normalize a URL path for metric labels: the attempt number after
/// `attempts/` becomes `:id` to prevent cardinality explosion. Game keys are
/// kept even when numeric.
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let label = if previous == "attempts" && segment.parse::<u64>().is_ok() {
                ":id"
            } else {
                segment
            };
            previous = segment;
            label
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware recording request counts and latencies.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = normalize_path(req.uri().path());
    let started = Instant::now();

    let response = next.run(req).await;

    API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(started.elapsed().as_secs_f64());
    response
}
