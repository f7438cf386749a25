//! Record shapes flowing through the pipeline: raw platform rows, their
//! canonical projection, and the enriched output handed to sinks.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::Platform;
use crate::pipeline::classify::{ClassificationResult, Emotion, Sentiment};

/// Platform-specific key/value row exactly as exported by a scraper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builds a record from a JSON value; non-object values yield an empty record.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Looks up a field by name, falling back to a dotted path (`authorMeta.name`)
    /// into nested objects. `null` values count as absent.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(path) {
            return (!value.is_null()).then_some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCounts {
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub view_count: u64,
}

/// Normalized post, independent of the source platform.
///
/// `text` is always present; it may be empty before cleansing, in which case
/// the keyword stage drops the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub platform: Platform,
    pub post_id: Option<String>,
    pub text: String,
    pub description: String,
    pub post_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    #[serde(flatten)]
    pub counts: EngagementCounts,
    #[serde(skip)]
    pub raw: RawRecord,
}

impl CanonicalRecord {
    /// Minimal record carrying only text, used by callers that already hold
    /// plain strings.
    #[must_use]
    pub fn from_text(platform: Platform, text: impl Into<String>) -> Self {
        Self {
            platform,
            post_id: None,
            text: text.into(),
            description: String::new(),
            post_url: None,
            posted_at: None,
            author: None,
            counts: EngagementCounts::default(),
            raw: RawRecord::default(),
        }
    }
}

/// Canonical record augmented with every classification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: CanonicalRecord,
    pub sentiment: Sentiment,
    pub topic: String,
    pub emotion: Emotion,
    pub age_group: String,
    pub gender: String,
    pub location_hint: String,
}

impl EnrichedRecord {
    #[must_use]
    pub fn new(record: CanonicalRecord, classification: ClassificationResult) -> Self {
        let ClassificationResult {
            sentiment,
            topic,
            emotion,
            demographics,
        } = classification;
        Self {
            record,
            sentiment,
            topic,
            emotion,
            age_group: demographics.age_group,
            gender: demographics.gender,
            location_hint: demographics.location_hint,
        }
    }
}
