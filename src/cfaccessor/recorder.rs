//! Request Instrumentation
//!
//! The retrieval engine reports every request through a [`MetricsRecorder`].
//! Recording is fire-and-forget and must never fail the request itself.

use std::time::Duration;

use super::request_type::RequestType;
use crate::metrics;

/// How a single request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    Success,
    Timeout,
    RateUnavailable,
    Failure,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Timeout => "timeout",
            RequestOutcome::RateUnavailable => "rate_unavailable",
            RequestOutcome::Failure => "failure",
        }
    }
}

/// Sink for per-request instrumentation
pub trait MetricsRecorder: Send + Sync {
    /// Record the latency of one request, whatever its outcome
    fn observe_latency(&self, request_type: RequestType, latency: Duration, outcome: RequestOutcome);

    /// Record time spent waiting on the rate gate
    fn observe_rate_wait(&self, _request_type: RequestType, _waited: Duration) {}
}

/// Recorder discarding everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn observe_latency(&self, _: RequestType, _: Duration, _: RequestOutcome) {}
}

/// Recorder writing to the process-wide Prometheus registry
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusRecorder;

impl MetricsRecorder for PrometheusRecorder {
    fn observe_latency(&self, request_type: RequestType, latency: Duration, outcome: RequestOutcome) {
        metrics::CF_REQUEST_DURATION_SECONDS
            .with_label_values(&[request_type.metric_name()])
            .observe(latency.as_secs_f64());
        metrics::CF_REQUESTS_TOTAL
            .with_label_values(&[request_type.metric_name(), outcome.as_str()])
            .inc();
    }

    fn observe_rate_wait(&self, _request_type: RequestType, waited: Duration) {
        metrics::CF_RATE_GATE_WAIT_SECONDS.observe(waited.as_secs_f64());
    }
}
