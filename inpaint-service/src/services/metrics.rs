//! Domain metrics for inpaint-service.
//!
//! Recorded through the `metrics` facade; the Prometheus recorder is
//! installed by `service_core::observability::init_metrics`.

use metrics::{counter, histogram};
use std::time::Duration;

/// How a generation request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Generated,
    Denied,
    Invalid,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Generated => "generated",
            Outcome::Denied => "denied",
            Outcome::Invalid => "invalid",
            Outcome::Failed => "failed",
        }
    }
}

pub fn record_outcome(outcome: Outcome) {
    counter!("inpaint_requests_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_inference(model: &str, elapsed: Duration, success: bool) {
    let status = if success { "ok" } else { "error" };
    histogram!(
        "inference_duration_seconds",
        "model" => model.to_string(),
        "status" => status
    )
    .record(elapsed.as_secs_f64());
}
