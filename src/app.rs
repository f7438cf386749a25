use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    clients::classifier::{ClassifierBackend, ClassifierClient, GeminiBackend},
    config::Config,
    observability::{Telemetry, metrics::Metrics},
    pipeline::{
        classify::ClassificationEngine,
        export::CsvBackupSink,
        funnel::CleansingFunnel,
        language::LanguageStage,
        orchestrator::RunOrchestrator,
    },
};

/// Everything a batch run needs, wired from one [`Config`].
pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    orchestrator: RunOrchestrator,
}

impl ComponentRegistry {
    /// Initialises telemetry and builds the orchestrator over the HTTP
    /// classifier backend.
    ///
    /// # Errors
    /// Fails when telemetry cannot be initialised or the HTTP client cannot
    /// be built.
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let backend = GeminiBackend::new(config.gemini_config())
            .context("failed to build classifier backend")?;
        let orchestrator =
            build_orchestrator(&config, Arc::new(backend), Some(telemetry.metrics()));

        Ok(Self {
            config,
            telemetry,
            orchestrator,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn orchestrator(&self) -> &RunOrchestrator {
        &self.orchestrator
    }
}

/// Wires client, funnel, engine and backup sink around any backend.
#[must_use]
pub fn build_orchestrator(
    config: &Config,
    backend: Arc<dyn ClassifierBackend>,
    metrics: Option<Arc<Metrics>>,
) -> RunOrchestrator {
    let mapper = config.batch_mapper();

    let mut client = ClassifierClient::new(
        backend,
        config.retry_policy(),
        config.classifier_call_timeout(),
    );
    if let Some(metrics) = &metrics {
        client = client.with_metrics(Arc::clone(metrics));
    }
    let client = Arc::new(client);

    let mut language = LanguageStage::new(Arc::clone(&client), mapper, config.target_language());
    let mut engine = ClassificationEngine::new(client, mapper)
        .with_location_max_chars(config.location_hint_max_chars());
    if let Some(metrics) = &metrics {
        language = language.with_metrics(Arc::clone(metrics));
        engine = engine.with_metrics(Arc::clone(metrics));
    }

    let mut funnel = CleansingFunnel::new(language);
    if let Some(metrics) = &metrics {
        funnel = funnel.with_metrics(Arc::clone(metrics));
    }

    let mut orchestrator = RunOrchestrator::new(funnel, engine);
    if let Some(dir) = config.backup_dir() {
        orchestrator = orchestrator.with_sink(Arc::new(CsvBackupSink::new(dir.clone())));
    }
    if let Some(metrics) = metrics {
        orchestrator = orchestrator.with_metrics(metrics);
    }
    orchestrator
}
