//! Raw dataset providers.
//!
//! The worker never scrapes; it reads exports produced elsewhere. A
//! [`DatasetSource`] yields the ordered raw rows for one platform unit.
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::RawRecord;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset {0} does not exist")]
    NotFound(PathBuf),
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse dataset {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported dataset format for {0} (expected .json, .jsonl, .ndjson or .csv)")]
    UnsupportedFormat(PathBuf),
}

#[async_trait]
pub trait DatasetSource: Send + Sync + fmt::Debug {
    /// Human-readable origin, used in logs and failure reports.
    fn describe(&self) -> String;

    /// Loads every row in source order.
    async fn load(&self) -> Result<Vec<RawRecord>, DatasetError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    JsonArray,
    JsonLines,
    Csv,
}

impl FileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(FileFormat::JsonArray),
            "jsonl" | "ndjson" => Some(FileFormat::JsonLines),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }
}

/// Export file on disk; the extension selects the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDatasetSource {
    path: PathBuf,
}

impl FileDatasetSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DatasetSource for FileDatasetSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<RawRecord>, DatasetError> {
        let format = FileFormat::from_path(&self.path)
            .ok_or_else(|| DatasetError::UnsupportedFormat(self.path.clone()))?;

        let bytes = tokio::fs::read(&self.path).await.map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                DatasetError::NotFound(self.path.clone())
            } else {
                DatasetError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let parse_error = |message: String| DatasetError::Parse {
            path: self.path.clone(),
            message,
        };
        match format {
            FileFormat::JsonArray => parse_json(&bytes).map_err(parse_error),
            FileFormat::JsonLines => parse_json_lines(&bytes).map_err(parse_error),
            FileFormat::Csv => parse_csv(&bytes).map_err(parse_error),
        }
    }
}

/// Rows already held in memory, e.g. handed over by a live scrape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryDataset {
    label: String,
    rows: Vec<RawRecord>,
}

impl InMemoryDataset {
    #[must_use]
    pub fn new(label: impl Into<String>, rows: Vec<RawRecord>) -> Self {
        Self {
            label: label.into(),
            rows,
        }
    }
}

#[async_trait]
impl DatasetSource for InMemoryDataset {
    fn describe(&self) -> String {
        format!("in-memory:{}", self.label)
    }

    async fn load(&self) -> Result<Vec<RawRecord>, DatasetError> {
        Ok(self.rows.clone())
    }
}

/// A top-level array of objects; a single object is read as one row.
fn parse_json(bytes: &[u8]) -> Result<Vec<RawRecord>, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|error| error.to_string())?;
    match value {
        Value::Array(items) => Ok(items.into_iter().map(RawRecord::from_value).collect()),
        Value::Object(map) => Ok(vec![RawRecord::new(map)]),
        other => Err(format!("expected an array of objects, found {}", json_kind(&other))),
    }
}

fn parse_json_lines(bytes: &[u8]) -> Result<Vec<RawRecord>, String> {
    let text = std::str::from_utf8(bytes).map_err(|error| error.to_string())?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line)
                .map(RawRecord::from_value)
                .map_err(|error| format!("line {}: {error}", index + 1))
        })
        .collect()
}

/// Every CSV cell becomes a JSON string; the normalizer coerces numbers later.
fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRecord>, String> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers().map_err(|error| error.to_string())?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|error| error.to_string())?;
        let fields: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();
        rows.push(RawRecord::new(fields));
    }
    Ok(rows)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Instagram hashtag exports nest the actual posts under `topPosts`.
///
/// Rows carrying that array are replaced by their nested posts; other rows
/// pass through. Posts sharing an `id` are kept once, first wins.
#[must_use]
pub(crate) fn flatten_top_posts(rows: Vec<RawRecord>) -> Vec<RawRecord> {
    if !rows.iter().any(|row| row.fields().contains_key("topPosts")) {
        return rows;
    }

    let mut seen_ids = HashSet::new();
    let mut posts = Vec::new();
    for row in rows {
        let mut fields = row.into_fields();
        let nested = match fields.remove("topPosts") {
            Some(Value::Array(items)) => items.into_iter().map(RawRecord::from_value).collect(),
            Some(_) | None => vec![RawRecord::new(fields)],
        };
        for post in nested {
            let id = post.get("id").map(|id| match id {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
            if id.is_none_or(|id| seen_ids.insert(id)) {
                posts.push(post);
            }
        }
    }
    posts
}
