//! Prometheus metrics for feed serving and the write path.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "reels_feed_requests_total",
        "Feed pages served, by feed type and pipeline variant",
        &["feed_type", "variant"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_CACHE_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "reels_feed_cache_events_total",
        "Feed cache lookups by outcome (hit/miss/error)",
        &["event"]
    )
    .expect("Failed to register feed cache metric")
});

static INTERACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "reels_interactions_total",
        "Interaction writes by kind",
        &["kind"]
    )
    .expect("Failed to register interactions metric")
});

static FEED_GENERATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "reels_feed_generation_seconds",
        "Wall time spent generating uncached feed pages",
        &["feed_type"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register feed generation metric")
});

pub fn record_feed_request(feed_type: &str, variant: &str) {
    FEED_REQUESTS_TOTAL
        .with_label_values(&[feed_type, variant])
        .inc();
}

pub fn record_cache_event(event: &str) {
    FEED_CACHE_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_interaction(kind: &str) {
    INTERACTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_generation(feed_type: &str, duration: Duration) {
    FEED_GENERATION_SECONDS
        .with_label_values(&[feed_type])
        .observe(duration.as_secs_f64());
}
