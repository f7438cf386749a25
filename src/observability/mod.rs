pub mod metrics;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// Tracing plus the worker's own Prometheus registry.
#[derive(Debug, Clone)]
pub struct Telemetry {
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// Initialises tracing (once per process) and registers the collectors.
    ///
    /// # Errors
    /// Fails when the subscriber cannot be installed or a collector cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        tracing::init()?;
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(registry)?);
        Ok(Self { metrics })
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Flushes exported spans before the process exits.
    pub fn shutdown(&self) {
        tracing::shutdown();
    }

    /// Renders the registry in the Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.metrics.registry().gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}
