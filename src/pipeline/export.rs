//! Side-channel export of enriched records.
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use csv::Writer;
use thiserror::Error;

use crate::normalize::{Layer, Platform};
use crate::record::EnrichedRecord;

const CSV_COLUMNS: [&str; 17] = [
    "platform",
    "postId",
    "postUrl",
    "postedAt",
    "author",
    "text",
    "description",
    "likeCount",
    "commentCount",
    "shareCount",
    "viewCount",
    "sentiment",
    "topic",
    "emotion",
    "ageGroup",
    "gender",
    "locationHint",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode backup: {0}")]
    Encode(#[from] csv::Error),
    #[error("failed to write backup {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives the enriched dataset of one platform unit.
#[async_trait]
pub trait EnrichedSink: Send + Sync + fmt::Debug {
    /// Writes the records and returns where they went.
    async fn write(
        &self,
        brand: &str,
        platform: Platform,
        layer: Layer,
        records: &[EnrichedRecord],
    ) -> Result<String, ExportError>;
}

/// Writes `{dir}/{platform}_{brand}_layer{N}.csv`, replacing older backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvBackupSink {
    dir: PathBuf,
}

impl CsvBackupSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, brand: &str, platform: Platform, layer: Layer) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{layer}.csv", platform.as_str(), file_safe(brand)))
    }
}

#[async_trait]
impl EnrichedSink for CsvBackupSink {
    async fn write(
        &self,
        brand: &str,
        platform: Platform,
        layer: Layer,
        records: &[EnrichedRecord],
    ) -> Result<String, ExportError> {
        let encoded = encode_csv(records)?;
        let path = self.path_for(brand, platform, layer);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ExportError::Io {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, encoded)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path.display().to_string())
    }
}

fn encode_csv(records: &[EnrichedRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    for enriched in records {
        let record = &enriched.record;
        let counts = record.counts;
        writer.write_record([
            record.platform.as_str().to_string(),
            record.post_id.clone().unwrap_or_default(),
            record.post_url.clone().unwrap_or_default(),
            record
                .posted_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            record.author.clone().unwrap_or_default(),
            record.text.clone(),
            record.description.clone(),
            counts.like_count.to_string(),
            counts.comment_count.to_string(),
            counts.share_count.to_string(),
            counts.view_count.to_string(),
            enriched.sentiment.to_string(),
            enriched.topic.clone(),
            enriched.emotion.to_string(),
            enriched.age_group.clone(),
            enriched.gender.clone(),
            enriched.location_hint.clone(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|error| ExportError::Encode(error.into_error().into()))
}

/// Brand names come from callers; keep them from escaping the backup dir.
fn file_safe(brand: &str) -> String {
    brand
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
