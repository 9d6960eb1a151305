//! Gateway metrics
//!
//! Recorded through the `metrics` facade; the binary decides the exporter.
//!
//! - `gateway_renewals_total` (counter): label `outcome` (`success`, `failure`, `timeout`)
//! - `gateway_replays_total` (counter)
//! - `gateway_session_terminations_total` (counter)
//! - `gateway_expired_passthrough_total` (counter): label `reason`

/// Record the outcome of one renewal call.
pub fn record_renewal(outcome: &'static str) {
    metrics::counter!("gateway_renewals_total", "outcome" => outcome).increment(1);
}

/// Record one parked request replayed after a successful renewal.
pub fn record_replay() {
    metrics::counter!("gateway_replays_total").increment(1);
}

/// Record one session termination (once per failed cycle).
pub fn record_termination() {
    metrics::counter!("gateway_session_terminations_total").increment(1);
}

/// Record a 401 handed back to the caller without renewal.
pub fn record_expired_passthrough(reason: &'static str) {
    metrics::counter!("gateway_expired_passthrough_total", "reason" => reason).increment(1);
}
