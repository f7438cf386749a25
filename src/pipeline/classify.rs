//! Classification engine: four per-record tasks over the cleansed sequence.
//!
//! Every task runs through the shared [`BatchMapper`], so outputs are always
//! aligned with the input order. Classifier exhaustion never escapes this
//! module; each task substitutes its fallback value instead.
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clients::classifier::{ClassifierClient, ClassifierTask};
use crate::observability::metrics::Metrics;
use crate::pipeline::batch::BatchMapper;
use crate::pipeline::taxonomy::{Taxonomy, UNKNOWN_TOPIC};
use crate::util::text::{clean_label, strip_code_fence};

pub(crate) const UNKNOWN: &str = "unknown";
const AGE_GROUPS: [&str; 6] = ["18-24", "25-34", "35-44", "45-54", "55+", UNKNOWN];
const GENDERS: [&str; 4] = ["male", "female", "neutral", UNKNOWN];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }

    /// Reads a model reply; anything outside the vocabulary is `Neutral`.
    #[must_use]
    pub fn from_reply(reply: &str) -> Self {
        match_vocabulary(reply, &Self::ALL, |s| s.as_str()).unwrap_or_default()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Anger,
    Sadness,
    Fear,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
    #[default]
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Joy,
        Emotion::Anger,
        Emotion::Sadness,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Trust,
        Emotion::Anticipation,
        Emotion::Neutral,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Anger => "anger",
            Emotion::Sadness => "sadness",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
            Emotion::Neutral => "neutral",
        }
    }

    /// Reads a model reply; anything outside the vocabulary is `neutral`.
    #[must_use]
    pub fn from_reply(reply: &str) -> Self {
        match_vocabulary(reply, &Self::ALL, |e| e.as_str()).unwrap_or_default()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An exact (case-insensitive) match wins; otherwise a single vocabulary word
/// appearing in the reply is accepted, e.g. `Sentiment: Positive`.
fn match_vocabulary<T: Copy>(
    reply: &str,
    vocabulary: &[T],
    name: fn(&T) -> &'static str,
) -> Option<T> {
    let cleaned = clean_label(reply).to_lowercase();
    if let Some(exact) = vocabulary.iter().find(|item| name(item).eq_ignore_ascii_case(&cleaned)) {
        return Some(*exact);
    }

    let words: Vec<&str> = cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let mut found = vocabulary
        .iter()
        .filter(|item| words.iter().any(|word| name(item).eq_ignore_ascii_case(word)));
    match (found.next(), found.next()) {
        (Some(only), None) => Some(*only),
        _ => None,
    }
}

/// Inferred author attributes. Every field is a bounded value or `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub age_group: String,
    pub gender: String,
    pub location_hint: String,
}

impl Demographics {
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            age_group: UNKNOWN.to_string(),
            gender: UNKNOWN.to_string(),
            location_hint: UNKNOWN.to_string(),
        }
    }

    /// Parses the JSON object returned by the model.
    ///
    /// Replies that are not a JSON object are rejected so the client retries
    /// them. Individual fields outside their vocabulary become `unknown`.
    ///
    /// # Errors
    /// Returns a description of the parse failure.
    pub fn from_reply(reply: &str, location_max_chars: usize) -> Result<Self, String> {
        let value: Value = serde_json::from_str(strip_code_fence(reply))
            .map_err(|error| format!("demographics reply is not JSON: {error}"))?;
        let Value::Object(fields) = value else {
            return Err("demographics reply is not a JSON object".to_string());
        };

        let field = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(|raw| raw.trim().to_lowercase())
                .unwrap_or_default()
        };

        let age_group = bounded(field("age_group"), &AGE_GROUPS);
        let gender = bounded(field("gender"), &GENDERS);

        let location_hint = fields
            .get("location_hint")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|hint| {
                !hint.is_empty()
                    && !hint.eq_ignore_ascii_case(UNKNOWN)
                    && hint.chars().count() <= location_max_chars
            })
            .map_or_else(|| UNKNOWN.to_string(), ToString::to_string);

        Ok(Self {
            age_group,
            gender,
            location_hint,
        })
    }
}

impl Default for Demographics {
    fn default() -> Self {
        Self::unknown()
    }
}

fn bounded(value: String, vocabulary: &[&str]) -> String {
    if vocabulary.contains(&value.as_str()) {
        value
    } else {
        UNKNOWN.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub sentiment: Sentiment,
    pub topic: String,
    pub emotion: Emotion,
    pub demographics: Demographics,
}

/// Runs the four classification tasks over batches of text.
#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    client: Arc<ClassifierClient>,
    mapper: BatchMapper,
    metrics: Option<Arc<Metrics>>,
    location_max_chars: usize,
}

impl ClassificationEngine {
    #[must_use]
    pub fn new(client: Arc<ClassifierClient>, mapper: BatchMapper) -> Self {
        Self {
            client,
            mapper,
            metrics: None,
            location_max_chars: 64,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn with_location_max_chars(mut self, max_chars: usize) -> Self {
        self.location_max_chars = max_chars;
        self
    }

    #[must_use]
    pub fn mapper(&self) -> BatchMapper {
        self.mapper
    }

    pub async fn classify_sentiments(&self, texts: &[String]) -> Vec<Sentiment> {
        self.run_task(
            texts,
            ClassifierTask::Sentiment,
            |reply: &str| Ok(Sentiment::from_reply(reply)),
            Sentiment::Neutral,
        )
        .await
    }

    pub async fn classify_emotions(&self, texts: &[String]) -> Vec<Emotion> {
        self.run_task(
            texts,
            ClassifierTask::Emotion,
            |reply: &str| Ok(Emotion::from_reply(reply)),
            Emotion::Neutral,
        )
        .await
    }

    pub async fn classify_demographics(&self, texts: &[String]) -> Vec<Demographics> {
        let max_chars = self.location_max_chars;
        self.run_task(
            texts,
            ClassifierTask::Demographics,
            move |reply: &str| Demographics::from_reply(reply, max_chars),
            Demographics::unknown(),
        )
        .await
    }

    /// Infers one topic per text, growing `taxonomy` chunk by chunk.
    ///
    /// Each chunk sees the labels known before it started. Only after the
    /// whole chunk has returned are its new labels appended, then every guess
    /// is mapped onto its canonical entry.
    pub async fn classify_topics(&self, texts: &[String], taxonomy: &mut Taxonomy) -> Vec<String> {
        let mut topics = Vec::with_capacity(texts.len());

        for (chunk_idx, chunk) in self.mapper.chunks(texts).enumerate() {
            let task = ClassifierTask::Topic {
                existing: taxonomy.labels().to_vec(),
            };
            let guesses = self
                .run_chunk(chunk_idx, chunk, task, parse_topic, UNKNOWN_TOPIC.to_string())
                .await;

            let added = taxonomy.absorb(&guesses);
            if !added.is_empty() {
                debug!(chunk_idx, added = ?added, "taxonomy grew");
            }
            topics.extend(guesses.iter().map(|guess| taxonomy.normalize(guess)));
        }

        topics
    }

    /// Runs all four tasks, one after the other, and zips the results.
    pub async fn classify_all(
        &self,
        texts: &[String],
        taxonomy: &mut Taxonomy,
    ) -> Vec<ClassificationResult> {
        let sentiments = self.classify_sentiments(texts).await;
        let topics = self.classify_topics(texts, taxonomy).await;
        let emotions = self.classify_emotions(texts).await;
        let demographics = self.classify_demographics(texts).await;

        sentiments
            .into_iter()
            .zip(topics)
            .zip(emotions)
            .zip(demographics)
            .map(
                |(((sentiment, topic), emotion), demographics)| ClassificationResult {
                    sentiment,
                    topic,
                    emotion,
                    demographics,
                },
            )
            .collect()
    }

    async fn run_task<R, P>(
        &self,
        texts: &[String],
        task: ClassifierTask,
        parse: P,
        fallback: R,
    ) -> Vec<R>
    where
        R: Clone + Send + Sync + 'static,
        P: Fn(&str) -> Result<R, String> + Clone + Send + Sync + 'static,
    {
        let kind = task.kind();
        let started = Instant::now();
        let mut results = Vec::with_capacity(texts.len());

        for (chunk_idx, chunk) in self.mapper.chunks(texts).enumerate() {
            let mapped = self
                .run_chunk(chunk_idx, chunk, task.clone(), parse.clone(), fallback.clone())
                .await;
            results.extend(mapped);
        }

        info!(
            task = kind.as_str(),
            items = texts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classification task finished"
        );
        results
    }

    async fn run_chunk<R, P>(
        &self,
        chunk_idx: usize,
        chunk: &[String],
        task: ClassifierTask,
        parse: P,
        fallback: R,
    ) -> Vec<R>
    where
        R: Clone + Send + Sync + 'static,
        P: Fn(&str) -> Result<R, String> + Clone + Send + Sync + 'static,
    {
        let kind = task.kind();
        let started = Instant::now();
        let client = Arc::clone(&self.client);
        let metrics = self.metrics.clone();
        let task = Arc::new(task);
        let item_fallback = fallback.clone();

        let call = move |text: String| {
            let client = Arc::clone(&client);
            let metrics = metrics.clone();
            let task = Arc::clone(&task);
            let parse = parse.clone();
            let fallback = item_fallback.clone();
            async move {
                match client.classify_with(&text, &task, parse).await {
                    Ok(value) => value,
                    Err(error) => {
                        warn!(task = kind.as_str(), error = %error, "classification fell back");
                        if let Some(metrics) = &metrics {
                            metrics.record_fallback(kind.as_str());
                        }
                        fallback
                    }
                }
            }
        };

        let results = self
            .mapper
            .map_chunk(chunk, call, &|| fallback.clone())
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.chunk_duration.observe(started.elapsed().as_secs_f64());
        }
        debug!(
            task = kind.as_str(),
            chunk_idx,
            items = chunk.len(),
            "classification chunk collected"
        );
        results
    }
}

fn parse_topic(reply: &str) -> Result<String, String> {
    let label = clean_label(reply.lines().next().unwrap_or_default());
    if label.is_empty() {
        Err("topic reply is empty".to_string())
    } else {
        Ok(label)
    }
}
