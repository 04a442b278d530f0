//! Engine metrics
//!
//! Thin wrappers over the `metrics` facade; an exporter is wired by the
//! embedding application, not here.

use crate::execution::IntentKind;
use std::time::Duration;

/// Count one intent submission, labelled by kind
pub fn count_intent_submitted(kind: IntentKind) {
    metrics::counter!("sentinel_intents_submitted_total", "kind" => kind.to_string()).increment(1);
}

/// Count one terminal venue rejection, labelled by kind
pub fn count_intent_rejected(kind: IntentKind) {
    metrics::counter!("sentinel_intents_rejected_total", "kind" => kind.to_string()).increment(1);
}

/// Count one trailing stop adjustment
pub fn count_stop_adjustment() {
    metrics::counter!("sentinel_stop_adjustments_total").increment(1);
}

/// Count one operator alert
pub fn count_alert() {
    metrics::counter!("sentinel_alerts_total").increment(1);
}

/// Record end-to-end submission latency including retries
pub fn record_submission_latency(elapsed: Duration) {
    metrics::histogram!("sentinel_order_submission_latency_ms")
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// Track the number of live positions
pub fn gauge_open_positions(count: usize) {
    metrics::gauge!("sentinel_open_positions").set(count as f64);
}

/// Track the latest volatility estimate for an instrument
pub fn gauge_volatility(instrument: &str, value: f64) {
    metrics::gauge!("sentinel_current_atr", "instrument" => instrument.to_string()).set(value);
}
