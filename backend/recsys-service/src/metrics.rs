use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, TextEncoder,
};

use crate::error::{AppError, Result};
use crate::models::RecommendationTier;

static EVENTS_INGESTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "recsys_events_ingested_total",
        "Total listening events appended to online history",
    )
    .expect("failed to create recsys_events_ingested_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recsys_events_ingested_total");
    counter
});

static RECOMMENDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "recsys_recommendations_total",
            "Recommendation responses by offline tier",
        ),
        &["tier"],
    )
    .expect("failed to create recsys_recommendations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recsys_recommendations_total");
    counter
});

static RECOMMENDATION_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "recsys_recommendation_duration_seconds",
            "Time spent blending one recommendation list",
        )
        .buckets(vec![
            0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025,
        ]),
    )
    .expect("failed to create recsys_recommendation_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register recsys_recommendation_duration_seconds");
    histogram
});

static BACKFILLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "recsys_backfilled_total",
        "Recommendation responses that needed popularity backfill",
    )
    .expect("failed to create recsys_backfilled_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recsys_backfilled_total");
    counter
});

pub fn record_event_ingested() {
    EVENTS_INGESTED_TOTAL.inc();
}

pub fn observe_recommendation(tier: RecommendationTier, elapsed: Duration, backfilled: bool) {
    RECOMMENDATIONS_TOTAL
        .with_label_values(&[tier.as_str()])
        .inc();
    RECOMMENDATION_DURATION_SECONDS.observe(elapsed.as_secs_f64());
    if backfilled {
        BACKFILLED_TOTAL.inc();
    }
}

pub async fn metrics_handler() -> Result<HttpResponse> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}
