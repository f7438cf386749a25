/// Prometheus metrics for the enrichment worker.
use prometheus::{
    CounterVec, Histogram, HistogramOpts, Opts, Registry, register_counter_vec_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Classifier calls by `task` and `outcome` (`ok`, `retry`, `exhausted`).
    pub classifier_calls: CounterVec,
    /// Items that received a task fallback value, by `task`.
    pub classification_fallbacks: CounterVec,
    /// Records removed by each cleansing `stage`.
    pub funnel_dropped: CounterVec,
    /// Platform units by `outcome` (`ok`, `failed`).
    pub units_processed: CounterVec,
    pub platform_run_duration: Histogram,
    pub chunk_duration: Histogram,
}

impl Metrics {
    /// Registers every collector on `registry`.
    ///
    /// # Errors
    /// Fails when a collector with the same name is already registered.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            classifier_calls: register_counter_vec_with_registry!(
                Opts::new(
                    "social_intel_classifier_calls_total",
                    "Classifier backend calls by task and outcome"
                ),
                &["task", "outcome"],
                registry
            )?,
            classification_fallbacks: register_counter_vec_with_registry!(
                Opts::new(
                    "social_intel_classification_fallbacks_total",
                    "Records that received a fallback classification"
                ),
                &["task"],
                registry
            )?,
            funnel_dropped: register_counter_vec_with_registry!(
                Opts::new(
                    "social_intel_funnel_dropped_total",
                    "Records dropped per cleansing stage"
                ),
                &["stage"],
                registry
            )?,
            units_processed: register_counter_vec_with_registry!(
                Opts::new(
                    "social_intel_units_processed_total",
                    "Platform units processed by outcome"
                ),
                &["outcome"],
                registry
            )?,
            platform_run_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "social_intel_platform_run_duration_seconds",
                    "Wall time of one platform unit"
                )
                .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
                registry
            )?,
            chunk_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "social_intel_chunk_duration_seconds",
                    "Wall time of one classification chunk"
                )
                .buckets(vec![0.5, 1.0, 5.0, 15.0, 60.0, 180.0]),
                registry
            )?,
            registry,
        })
    }

    /// Metrics bound to a private registry; handy for tests and embedded runs.
    ///
    /// # Errors
    /// Propagates collector registration failures.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Self::new(Arc::new(Registry::new()))
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn record_call(&self, task: &str, outcome: &str) {
        self.classifier_calls
            .with_label_values(&[task, outcome])
            .inc();
    }

    pub fn record_fallback(&self, task: &str) {
        self.classification_fallbacks
            .with_label_values(&[task])
            .inc();
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn record_dropped(&self, stage: &str, count: usize) {
        if count > 0 {
            self.funnel_dropped
                .with_label_values(&[stage])
                .inc_by(count as f64);
        }
    }

    pub fn record_unit(&self, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.units_processed.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_on_private_registry() {
        let metrics = Metrics::unregistered().expect("metrics should register");
        metrics.record_call("sentiment", "ok");
        metrics.record_dropped("keywords", 3);
        metrics.record_dropped("keywords", 0);

        assert!(!metrics.registry().gather().is_empty());

        let dropped = metrics
            .funnel_dropped
            .with_label_values(&["keywords"])
            .get();
        assert!((dropped - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn registering_twice_on_same_registry_fails() {
        let registry = Arc::new(Registry::new());
        let _first = Metrics::new(Arc::clone(&registry)).expect("first registration");
        assert!(Metrics::new(registry).is_err());
    }
}
