//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use social_intel_worker::clients::classifier::{
    ClassifierBackend, ClassifierClient, ClassifierError,
};
use social_intel_worker::normalize::Platform;
use social_intel_worker::pipeline::batch::BatchMapper;
use social_intel_worker::pipeline::classify::ClassificationEngine;
use social_intel_worker::pipeline::dataset::{DatasetError, DatasetSource};
use social_intel_worker::pipeline::funnel::CleansingFunnel;
use social_intel_worker::pipeline::language::LanguageStage;
use social_intel_worker::pipeline::orchestrator::RunOrchestrator;
use social_intel_worker::record::RawRecord;
use social_intel_worker::util::retry::{RecordingClock, RetryPolicy};

/// Which classification a prompt asks for, recovered from its instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Language,
    Sentiment,
    Topic,
    Emotion,
    Demographics,
}

pub fn task_of(prompt: &str) -> Task {
    if prompt.contains("Return TRUE if the text is written in") {
        Task::Language
    } else if prompt.contains("Analyze the sentiment") {
        Task::Sentiment
    } else if prompt.contains("infer its main topic") {
        Task::Topic
    } else if prompt.contains("Analyze the emotion") {
        Task::Emotion
    } else if prompt.contains("demographic information") {
        Task::Demographics
    } else {
        panic!("unrecognised prompt: {prompt}")
    }
}

pub fn text_of(prompt: &str) -> &str {
    prompt
        .rsplit_once("\nText: ")
        .map_or(prompt, |(_, text)| text)
}

type ReplyFn = dyn Fn(Task, &str) -> Result<String, ClassifierError> + Send + Sync;

/// Backend answering through a closure of `(task, text)`.
pub struct FnBackend {
    reply: Box<ReplyFn>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FnBackend {
    pub fn new(
        reply: impl Fn(Task, &str) -> Result<String, ClassifierError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts_for(&self, task: Task) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| task_of(prompt) == task)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ClassifierBackend for FnBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.reply)(task_of(prompt), text_of(prompt))
    }
}

/// Deterministic answers keyed on words in the text.
pub fn happy_reply(task: Task, text: &str) -> Result<String, ClassifierError> {
    let lower = text.to_lowercase();
    let reply = match task {
        Task::Language => "TRUE".to_string(),
        Task::Sentiment if lower.contains("love") => "Positive".to_string(),
        Task::Sentiment if lower.contains("hate") => "Negative".to_string(),
        Task::Sentiment => "Neutral".to_string(),
        Task::Topic if lower.contains("price") => "Pricing".to_string(),
        Task::Topic => "General Chatter".to_string(),
        Task::Emotion if lower.contains("love") => "joy".to_string(),
        Task::Emotion => "neutral".to_string(),
        Task::Demographics => json!({
            "age_group": "25-34",
            "gender": "female",
            "location_hint": "Jakarta"
        })
        .to_string(),
    };
    Ok(reply)
}

pub fn mapper(batch: usize, workers: usize) -> BatchMapper {
    BatchMapper::new(
        NonZeroUsize::new(batch).unwrap(),
        NonZeroUsize::new(workers).unwrap(),
    )
}

pub fn client(backend: Arc<dyn ClassifierBackend>, clock: RecordingClock) -> Arc<ClassifierClient> {
    Arc::new(
        ClassifierClient::new(backend, RetryPolicy::default(), Duration::from_secs(30))
            .with_clock(Arc::new(clock)),
    )
}

pub fn engine(
    backend: Arc<dyn ClassifierBackend>,
    batch: usize,
    workers: usize,
) -> ClassificationEngine {
    ClassificationEngine::new(client(backend, RecordingClock::new()), mapper(batch, workers))
}

pub fn funnel(backend: Arc<dyn ClassifierBackend>) -> CleansingFunnel {
    let language = LanguageStage::new(
        client(backend, RecordingClock::new()),
        mapper(10, 4),
        "Indonesian",
    );
    CleansingFunnel::new(language)
}

pub fn orchestrator(backend: Arc<dyn ClassifierBackend>) -> RunOrchestrator {
    RunOrchestrator::new(funnel(Arc::clone(&backend)), engine(backend, 10, 4))
}

pub fn rows(platform: Platform, texts: &[&str]) -> Vec<RawRecord> {
    let field = match platform {
        Platform::Tiktok | Platform::Youtube => "title",
        Platform::Instagram => "caption",
        Platform::Twitter => "text",
    };
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let mut fields = serde_json::Map::new();
            fields.insert("id".into(), json!(format!("{}-{index}", platform.as_str())));
            fields.insert(field.into(), json!(text));
            RawRecord::new(fields)
        })
        .collect()
}

/// Dataset that counts how often it was loaded.
#[derive(Debug, Default)]
pub struct CountingDataset {
    pub rows: Vec<RawRecord>,
    pub loads: AtomicUsize,
}

#[async_trait]
impl DatasetSource for CountingDataset {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    async fn load(&self) -> Result<Vec<RawRecord>, DatasetError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}
