//! Run orchestrator: dataset → normalizer → funnel → engine → report.
//!
//! Platforms of one brand run one after another and share that brand's
//! taxonomy. A failing platform is recorded and skipped; it never aborts the
//! rest of the brand or the batch. Request validation errors are the only
//! failures returned to the caller, and they are raised before any dataset
//! is read.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::normalize::{Layer, Platform, normalize_all};
use crate::observability::metrics::Metrics;
use crate::record::EnrichedRecord;

use super::classify::{ClassificationEngine, Sentiment};
use super::dataset::{DatasetSource, flatten_top_posts};
use super::date_range::{DateRange, DateRangeError};
use super::export::EnrichedSink;
use super::funnel::{CleansingFunnel, CleansingStats, FunnelParams};
use super::taxonomy::Taxonomy;

/// Invalid caller input. Raised before any work starts.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("brand name must not be empty")]
    EmptyBrand,
    #[error("brand {brand}: at least one keyword is required")]
    NoKeywords { brand: String },
    #[error("brand {brand}: {source}")]
    InvalidDate {
        brand: String,
        #[source]
        source: DateRangeError,
    },
    #[error("brand {brand}: no platforms requested")]
    EmptyPlatforms { brand: String },
}

/// One platform dataset requested for a brand.
#[derive(Debug, Clone)]
pub struct PlatformSource {
    /// Platform identifier as given by the caller (`tiktok`, `x`, ...).
    pub platform: String,
    pub layer: Layer,
    pub source: Arc<dyn DatasetSource>,
}

impl PlatformSource {
    /// A posts export; see [`PlatformSource::with_layer`] for comments.
    #[must_use]
    pub fn new(platform: impl Into<String>, source: Arc<dyn DatasetSource>) -> Self {
        Self {
            platform: platform.into(),
            layer: Layer::Posts,
            source,
        }
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BrandRequest {
    pub brand: String,
    pub keywords: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Drop posts whose URL does not point at their platform.
    pub validate_urls: bool,
    pub platforms: Vec<PlatformSource>,
}

impl BrandRequest {
    /// Checks the request and derives the funnel inputs.
    ///
    /// # Errors
    /// Returns a [`RequestError`] for a blank brand, no usable keyword, an
    /// unparseable or inverted date range, or an empty platform list.
    pub fn validate(&self) -> Result<FunnelParams, RequestError> {
        let brand = self.brand.trim();
        if brand.is_empty() {
            return Err(RequestError::EmptyBrand);
        }
        let keywords: Vec<String> = self
            .keywords
            .iter()
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(RequestError::NoKeywords {
                brand: brand.to_string(),
            });
        }
        if self.platforms.is_empty() {
            return Err(RequestError::EmptyPlatforms {
                brand: brand.to_string(),
            });
        }
        let date_range = DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())
            .map_err(|source| RequestError::InvalidDate {
                brand: brand.to_string(),
                source,
            })?;

        Ok(FunnelParams {
            keywords,
            date_range,
            validate_urls: self.validate_urls,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentDistribution {
    #[serde(rename = "Positive")]
    pub positive: usize,
    #[serde(rename = "Negative")]
    pub negative: usize,
    #[serde(rename = "Neutral")]
    pub neutral: usize,
}

impl SentimentDistribution {
    pub fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn merge(&mut self, other: &SentimentDistribution) {
        self.positive += other.positive;
        self.negative += other.negative;
        self.neutral += other.neutral;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

impl FromIterator<Sentiment> for SentimentDistribution {
    fn from_iter<I: IntoIterator<Item = Sentiment>>(iter: I) -> Self {
        let mut distribution = Self::default();
        for sentiment in iter {
            distribution.add(sentiment);
        }
        distribution
    }
}

/// Outcome of one successful platform unit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformReport {
    pub platform: Platform,
    pub layer: Layer,
    pub brand: String,
    pub total_analyzed: usize,
    pub cleansing_stats: CleansingStats,
    /// Distinct non-empty topics in first-seen order, fallback `Unknown` included.
    pub topics_found: Vec<String>,
    pub sentiment_distribution: SentimentDistribution,
    pub processing_time_seconds: f64,
    pub backup_file: Option<String>,
    #[serde(skip)]
    pub records: Vec<EnrichedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub brand: String,
    pub platform: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandReport {
    pub brand: String,
    pub platforms: Vec<PlatformReport>,
    pub failures: Vec<UnitFailure>,
    pub total_analyzed: usize,
    pub sentiment_distribution: SentimentDistribution,
    /// Taxonomy at the end of the brand run.
    pub topics: Vec<String>,
    pub processing_time_seconds: f64,
}

impl BrandReport {
    #[must_use]
    pub fn platform(&self, platform: Platform) -> Option<&PlatformReport> {
        self.platforms
            .iter()
            .find(|report| report.platform == platform)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: Uuid,
    pub brands: Vec<BrandReport>,
    pub succeeded_units: usize,
    pub failed_units: usize,
}

impl BatchReport {
    #[must_use]
    pub fn failures(&self) -> Vec<&UnitFailure> {
        self.brands
            .iter()
            .flat_map(|brand| brand.failures.iter())
            .collect()
    }
}

pub struct RunOrchestrator {
    funnel: CleansingFunnel,
    engine: ClassificationEngine,
    sink: Option<Arc<dyn EnrichedSink>>,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("engine", &self.engine)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl RunOrchestrator {
    #[must_use]
    pub fn new(funnel: CleansingFunnel, engine: ClassificationEngine) -> Self {
        Self {
            funnel,
            engine,
            sink: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EnrichedSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs one platform unit end to end.
    ///
    /// # Errors
    /// Fails when the dataset cannot be loaded. Classifier failures never
    /// surface here, and a failing sink is only logged.
    #[instrument(skip_all, fields(brand = %brand, platform = %platform, layer = %layer))]
    pub async fn process_platform(
        &self,
        brand: &str,
        platform: Platform,
        layer: Layer,
        source: &dyn DatasetSource,
        params: &FunnelParams,
        taxonomy: &mut Taxonomy,
    ) -> Result<PlatformReport> {
        let started = Instant::now();

        let mut rows = source
            .load()
            .await
            .with_context(|| format!("failed to load {platform} dataset {}", source.describe()))?;
        if platform == Platform::Instagram && layer == Layer::Posts {
            rows = flatten_top_posts(rows);
        }
        let canonical = normalize_all(platform, layer, rows);
        info!(rows = canonical.len(), "dataset normalized");

        let outcome = self.funnel.run(canonical, params).await;
        let texts: Vec<String> = outcome
            .records
            .iter()
            .map(|record| record.text.clone())
            .collect();
        let classifications = self.engine.classify_all(&texts, taxonomy).await;

        let records: Vec<EnrichedRecord> = outcome
            .records
            .into_iter()
            .zip(classifications)
            .map(|(record, classification)| EnrichedRecord::new(record, classification))
            .collect();

        let sentiment_distribution = records.iter().map(|record| record.sentiment).collect();
        let topics_found = distinct_topics(&records);
        let backup_file = self.backup(brand, platform, layer, &records).await;

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.platform_run_duration.observe(elapsed.as_secs_f64());
        }
        info!(
            total_analyzed = records.len(),
            topics = topics_found.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "platform unit finished"
        );

        Ok(PlatformReport {
            platform,
            layer,
            brand: brand.to_string(),
            total_analyzed: records.len(),
            cleansing_stats: outcome.stats,
            topics_found,
            sentiment_distribution,
            processing_time_seconds: elapsed.as_secs_f64(),
            backup_file,
            records,
        })
    }

    /// Runs every platform of `request` with a fresh taxonomy.
    ///
    /// # Errors
    /// Returns a [`RequestError`] when the request is invalid.
    pub async fn process_brand(&self, request: &BrandRequest) -> Result<BrandReport, RequestError> {
        let mut taxonomy = Taxonomy::new();
        self.process_brand_with_taxonomy(request, &mut taxonomy)
            .await
    }

    /// Runs every platform of `request`, growing the caller's `taxonomy`.
    ///
    /// # Errors
    /// Returns a [`RequestError`] when the request is invalid.
    pub async fn process_brand_with_taxonomy(
        &self,
        request: &BrandRequest,
        taxonomy: &mut Taxonomy,
    ) -> Result<BrandReport, RequestError> {
        let params = request.validate()?;
        let brand = request.brand.trim().to_string();
        let started = Instant::now();

        let mut platforms = Vec::with_capacity(request.platforms.len());
        let mut failures = Vec::new();

        for requested in &request.platforms {
            let result = match requested.platform.parse::<Platform>() {
                Ok(platform) => {
                    self.process_platform(
                        &brand,
                        platform,
                        requested.layer,
                        requested.source.as_ref(),
                        &params,
                        taxonomy,
                    )
                    .await
                }
                Err(error) => Err(error.into()),
            };

            match result {
                Ok(report) => {
                    self.record_unit(true);
                    platforms.push(report);
                }
                Err(error) => {
                    self.record_unit(false);
                    let message = format!("{error:#}");
                    warn!(
                        brand = %brand,
                        platform = %requested.platform,
                        error = %message,
                        "platform unit failed, continuing with the remaining platforms"
                    );
                    failures.push(UnitFailure {
                        brand: brand.clone(),
                        platform: requested.platform.clone(),
                        error: message,
                    });
                }
            }
        }

        let mut sentiment_distribution = SentimentDistribution::default();
        for report in &platforms {
            sentiment_distribution.merge(&report.sentiment_distribution);
        }
        let total_analyzed = platforms.iter().map(|report| report.total_analyzed).sum();

        info!(
            brand = %brand,
            succeeded = platforms.len(),
            failed = failures.len(),
            total_analyzed,
            "brand run finished"
        );

        Ok(BrandReport {
            brand,
            platforms,
            failures,
            total_analyzed,
            sentiment_distribution,
            topics: taxonomy.labels().to_vec(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
        })
    }

    /// Runs several brands, each with its own taxonomy.
    ///
    /// Every request is validated before the first brand starts.
    ///
    /// # Errors
    /// Returns the first [`RequestError`] found.
    pub async fn process_brands(
        &self,
        requests: &[BrandRequest],
    ) -> Result<BatchReport, RequestError> {
        for request in requests {
            request.validate()?;
        }

        let run_id = Uuid::now_v7();
        let mut brands = Vec::with_capacity(requests.len());
        for request in requests {
            let span = info_span!("brand_run", %run_id, brand = %request.brand.trim());
            brands.push(self.process_brand(request).instrument(span).await?);
        }

        let succeeded_units = brands.iter().map(|brand| brand.platforms.len()).sum();
        let failed_units = brands.iter().map(|brand| brand.failures.len()).sum();
        info!(%run_id, succeeded_units, failed_units, "batch finished");
        Ok(BatchReport {
            run_id,
            brands,
            succeeded_units,
            failed_units,
        })
    }

    async fn backup(
        &self,
        brand: &str,
        platform: Platform,
        layer: Layer,
        records: &[EnrichedRecord],
    ) -> Option<String> {
        let sink = self.sink.as_ref()?;
        match sink.write(brand, platform, layer, records).await {
            Ok(location) => {
                info!(location = %location, records = records.len(), "backup written");
                Some(location)
            }
            Err(error) => {
                warn!(error = %error, "backup failed, keeping results in memory only");
                None
            }
        }
    }

    fn record_unit(&self, ok: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_unit(ok);
        }
    }
}

fn distinct_topics(records: &[EnrichedRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| record.topic.as_str())
        .filter(|topic| !topic.is_empty())
        .filter(|topic| seen.insert(*topic))
        .map(ToString::to_string)
        .collect()
}
