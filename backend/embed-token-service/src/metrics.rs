use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramTimer, HistogramVec,
    IntCounterVec, TextEncoder,
};

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Embed token requests by terminal outcome (`success` or an error kind)
static EMBED_TOKEN_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "embed_token_requests_total",
        "Total embed token requests by outcome",
        &["outcome"]
    )
    .expect("embed_token_requests_total can be registered")
});

/// Latency of each outbound call in the pipeline
static EMBED_TOKEN_UPSTREAM_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "embed_token_upstream_duration_seconds",
        "Duration of outbound Azure AD and Power BI calls",
        &["call"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("embed_token_upstream_duration_seconds can be registered")
});

#[inline]
pub fn record_outcome(outcome: &str) {
    EMBED_TOKEN_REQUESTS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

/// Starts a timer that observes on drop.
#[inline]
pub fn upstream_timer(call: &str) -> HistogramTimer {
    EMBED_TOKEN_UPSTREAM_DURATION_SECONDS
        .with_label_values(&[call])
        .start_timer()
}
