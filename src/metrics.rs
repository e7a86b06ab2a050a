// Prometheus metrics for Scrapegate internal monitoring
//
// Exposes metrics on /metrics HTTP endpoint:
// - Control plane request latency per request type (histogram)
// - Control plane request outcomes (counter)
// - Rate gate waiting time (histogram)
// - Discovered application instances (gauge)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramVec, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Control plane metrics
    pub static ref CF_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("cf_request_duration_seconds", "Latency of control plane requests in seconds"),
        &["request_type"]
    ).expect("Failed to create control plane request duration metric");

    pub static ref CF_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("cf_requests_total", "Total number of control plane requests"),
        &["request_type", "status"]
    ).expect("Failed to create control plane requests total metric");

    pub static ref CF_RATE_GATE_WAIT_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new("cf_rate_gate_wait_seconds", "Time spent waiting for a rate permit"),
    ).expect("Failed to create rate gate wait metric");

    // Discovery metrics
    pub static ref DISCOVERED_INSTANCES: IntGauge = IntGauge::new(
        "discovered_instances",
        "Number of application instances found by the last scan"
    ).expect("Failed to create discovered instances metric");

    pub static ref DISCOVERY_SCANS_TOTAL: IntCounter = IntCounter::new(
        "discovery_scans_total",
        "Total number of discovery scans since start"
    ).expect("Failed to create discovery scans metric");

    pub static ref DISCOVERY_FALLBACKS_TOTAL: IntCounter = IntCounter::new(
        "discovery_fallbacks_total",
        "Discovery calls that failed and were replaced by an empty response"
    ).expect("Failed to create discovery fallbacks metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(CF_REQUEST_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(CF_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CF_RATE_GATE_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(DISCOVERED_INSTANCES.clone()))?;
    REGISTRY.register(Box::new(DISCOVERY_SCANS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DISCOVERY_FALLBACKS_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
