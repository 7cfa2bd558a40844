use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    pub static ref RECOMMENDATION_CACHE_COUNTER: CounterVec = register_counter_vec!(
        "recommendation_cache_total",
        "Popular-activity cache lookups by outcome (hit, miss, error)",
        &["outcome"]
    ).unwrap();

    pub static ref RECOMMENDER_REQUESTS_COUNTER: CounterVec = register_counter_vec!(
        "recommender_requests_total",
        "Outbound recommendation engine calls by operation and outcome",
        &["operation", "outcome"]
    ).unwrap();

    pub static ref ITINERARY_WRITES_COUNTER: CounterVec = register_counter_vec!(
        "itinerary_writes_total",
        "Itinerary create/modify transactions by outcome (committed, rolled_back)",
        &["operation", "outcome"]
    ).unwrap();
}

pub fn record_cache(outcome: &str) {
    RECOMMENDATION_CACHE_COUNTER.with_label_values(&[outcome]).inc();
}

pub fn record_recommender(operation: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    RECOMMENDER_REQUESTS_COUNTER
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_itinerary_write(operation: &str, committed: bool) {
    let outcome = if committed { "committed" } else { "rolled_back" };
    ITINERARY_WRITES_COUNTER
        .with_label_values(&[operation, outcome])
        .inc();
}
