//! Operation metrics sink.
//!
//! The store records a duration and outcome per dispatched operation
//! through an injected sink. The default sink drops everything, so
//! instrumentation can never change operation behavior.

use tracing::info;

/// Receives operation timing observations.
pub trait MetricsSink: Send + Sync {
    /// Record one observation with its tag set.
    fn record(&self, name: &str, value: f64, tags: &[(&str, &str)]);
}

/// Sink that discards all observations.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
}

/// Sink that emits observations as structured log lines, for deployments
/// that scrape logs rather than a metrics endpoint.
#[derive(Debug, Default)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn record(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        info!(target: "memstore::metrics", metric = name, value, ?tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_accepts_observations() {
        let sink = NoopMetrics;
        sink.record("operation_duration_seconds", 0.01, &[("operation", "put")]);
    }
}
