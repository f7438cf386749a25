use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "social-intel-worker";

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Installs the global subscriber exactly once.
///
/// Logs go to stdout as JSON, filtered by `RUST_LOG` (default `info`). When
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set, spans are also exported over OTLP;
/// if the exporter cannot be built the worker keeps plain logging.
///
/// # Errors
/// Fails when another global subscriber is already installed.
pub(crate) fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        let (tracer, exporter_error) = match otel_endpoint.as_deref().map(init_tracer) {
            Some(Ok(tracer)) => (Some(tracer), None),
            Some(Err(error)) => (None, Some(error)),
            None => (None, None),
        };
        let otel_enabled = tracer.is_some();
        let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()
            .map_err(|e| Error::msg(e.to_string()))?;

        match exporter_error {
            Some(error) => info!(
                otel_enabled,
                error = %error,
                "tracing initialized without OpenTelemetry (exporter init failed)"
            ),
            None => info!(
                otel_enabled,
                endpoint = otel_endpoint.as_deref().unwrap_or_default(),
                "tracing initialized"
            ),
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// Flushes spans still queued in the OTLP batch exporter.
pub(crate) fn shutdown() {
    let Some(provider) = TRACER_PROVIDER.get() else {
        return;
    };
    if let Err(error) = provider.shutdown() {
        warn!(error = %error, "failed to flush OTLP spans");
    }
}

fn sampling_ratio() -> f64 {
    std::env::var("OTEL_SAMPLING_RATIO")
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|ratio| ratio.is_finite())
        .map_or(1.0, |ratio| ratio.clamp(0.0, 1.0))
}

fn init_tracer(endpoint: &str) -> Result<SdkTracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            sampling_ratio(),
        ))))
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(provider.clone());
    TRACER_PROVIDER.set(provider).ok();

    Ok(tracer)
}
