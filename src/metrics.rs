use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all optimizer metrics
const PREFIX: &str = "fsrs_helper";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref OPTIMIZATION_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_optimization_runs_total"), "Finished optimization runs by outcome"),
        &["outcome"]
    ).expect("Failed to create optimization_runs_total metric");

    pub static ref OPTIMIZATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_optimization_duration_seconds"),
            "Wall time of optimization runs in seconds"
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0])
    ).expect("Failed to create optimization_duration_seconds metric");

    pub static ref OPTIMIZATION_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_optimization_running"),
        "1 while an optimization holds the slot"
    ).expect("Failed to create optimization_running metric");

    pub static ref SUBMISSIONS_REJECTED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_submissions_rejected_total"),
        "Submissions rejected because another optimization was active"
    ).expect("Failed to create submissions_rejected_total metric");

    pub static ref PROGRESS_DROPPED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_progress_dropped_total"),
        "Progress updates dropped because the buffer was full"
    ).expect("Failed to create progress_dropped_total metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(OPTIMIZATION_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(OPTIMIZATION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(OPTIMIZATION_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(SUBMISSIONS_REJECTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROGRESS_DROPPED_TOTAL.clone()));

    tracing::debug!("Metrics registered");
}

pub fn record_optimization_run(outcome: &str, duration: Duration) {
    OPTIMIZATION_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    OPTIMIZATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn set_optimization_running(running: bool) {
    OPTIMIZATION_RUNNING.set(if running { 1.0 } else { 0.0 });
}

pub fn record_submission_rejected() {
    SUBMISSIONS_REJECTED_TOTAL.inc();
}

pub fn record_progress_dropped() {
    PROGRESS_DROPPED_TOTAL.inc();
}

/// Prometheus text exposition of every registered metric.
pub fn render_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => String::from_utf8(buffer).unwrap_or_default(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            String::new()
        }
    }
}
