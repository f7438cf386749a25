//! Cleansing funnel: optional URL check, dedup, keywords, optional date
//! range, language.
//!
//! Stages always run in that order and only ever remove records, so the
//! counters in [`CleansingStats`] are non-increasing.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::observability::metrics::Metrics;
use crate::record::CanonicalRecord;

use super::date_range::{DateRange, DateRangeStage};
use super::dedup::ExactTextDedupStage;
use super::keywords::KeywordStage;
use super::language::LanguageStage;
use super::post_url::PostUrlStage;

/// A synchronous filtering stage over an ordered record sequence.
pub trait FilterStage: Send + Sync {
    /// Stage name used in logs and metrics.
    fn name(&self) -> &'static str;
    /// Returns the surviving records in input order.
    fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleansingStats {
    pub initial: usize,
    /// Equal to `initial` when URL validation is off.
    pub after_url_validation: usize,
    pub after_duplicates: usize,
    pub after_keywords: usize,
    /// Equal to `after_keywords` when no range was requested.
    pub after_date_range: usize,
    pub after_language: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
}

impl CleansingStats {
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.initial >= self.after_url_validation
            && self.after_url_validation >= self.after_duplicates
            && self.after_duplicates >= self.after_keywords
            && self.after_keywords >= self.after_date_range
            && self.after_date_range >= self.after_language
            && self.after_language == self.final_count
    }
}

/// Caller-supplied filter inputs for one platform unit.
#[derive(Debug, Clone, Default)]
pub struct FunnelParams {
    pub keywords: Vec<String>,
    pub date_range: Option<DateRange>,
    pub validate_urls: bool,
}

#[derive(Debug, Clone)]
pub struct FunnelOutcome {
    pub records: Vec<CanonicalRecord>,
    pub stats: CleansingStats,
}

#[derive(Debug, Clone)]
pub struct CleansingFunnel {
    dedup: ExactTextDedupStage,
    language: LanguageStage,
    metrics: Option<Arc<Metrics>>,
}

impl CleansingFunnel {
    #[must_use]
    pub fn new(language: LanguageStage) -> Self {
        Self {
            dedup: ExactTextDedupStage::new(),
            language,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(&self, records: Vec<CanonicalRecord>, params: &FunnelParams) -> FunnelOutcome {
        let initial = records.len();

        let records = if params.validate_urls {
            self.filter(&PostUrlStage::new(), records)
        } else {
            records
        };
        let after_url_validation = records.len();

        let records = self.filter(&self.dedup, records);
        let after_duplicates = records.len();

        let records = self.filter(&KeywordStage::new(&params.keywords), records);
        let after_keywords = records.len();

        let records = match params.date_range {
            Some(range) => self.filter(&DateRangeStage::new(range), records),
            None => records,
        };
        let after_date_range = records.len();

        let records = self.language.apply(records).await;
        let after_language = records.len();
        self.record_dropped("language", after_date_range - after_language);

        let stats = CleansingStats {
            initial,
            after_url_validation,
            after_duplicates,
            after_keywords,
            after_date_range,
            after_language,
            final_count: after_language,
        };
        info!(
            initial,
            after_url_validation,
            after_duplicates,
            after_keywords,
            after_date_range,
            after_language,
            "cleansing funnel finished"
        );

        FunnelOutcome { records, stats }
    }

    fn filter(
        &self,
        stage: &dyn FilterStage,
        records: Vec<CanonicalRecord>,
    ) -> Vec<CanonicalRecord> {
        let before = records.len();
        let kept = stage.apply(records);
        self.record_dropped(stage.name(), before - kept.len());
        kept
    }

    fn record_dropped(&self, stage: &str, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped(stage, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_with_final_key() {
        let stats = CleansingStats {
            initial: 4,
            after_url_validation: 4,
            after_duplicates: 3,
            after_keywords: 3,
            after_date_range: 3,
            after_language: 2,
            final_count: 2,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["afterUrlValidation"], 4);
        assert_eq!(json["afterDuplicates"], 3);
        assert_eq!(json["final"], 2);
        assert!(stats.is_monotonic());
    }

    #[test]
    fn monotonicity_detects_growth() {
        let stats = CleansingStats {
            initial: 1,
            after_url_validation: 1,
            after_duplicates: 2,
            ..CleansingStats::default()
        };
        assert!(!stats.is_monotonic());
    }
}
