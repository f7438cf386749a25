//! Single-item classifier contract with bounded retry.
//!
//! [`ClassifierClient::classify_with`] wraps one prompt round-trip to a
//! [`ClassifierBackend`]. Transient failures (transport errors, 408/429/5xx,
//! empty or unparseable responses) are retried under a [`RetryPolicy`]; once
//! attempts are exhausted the caller receives [`ClassifierError::Exhausted`]
//! and applies its own task fallback.
mod gemini;
mod prompts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::observability::metrics::Metrics;
use crate::util::retry::{RetryClock, RetryPolicy, TokioClock};

pub use self::gemini::{GeminiBackend, GeminiConfig};
use self::prompts::build_prompt;

const MAX_ERROR_MESSAGE_LENGTH: usize = 300;

/// Classification tasks understood by the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierTask {
    /// Binary "is the text written in `target`" decision.
    Language { target: String },
    Sentiment,
    /// Topic inference against the labels known so far.
    Topic { existing: Vec<String> },
    Emotion,
    Demographics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Language,
    Sentiment,
    Topic,
    Emotion,
    Demographics,
}

impl TaskKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskKind::Language => "language",
            TaskKind::Sentiment => "sentiment",
            TaskKind::Topic => "topic",
            TaskKind::Emotion => "emotion",
            TaskKind::Demographics => "demographics",
        }
    }
}

impl ClassifierTask {
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            ClassifierTask::Language { .. } => TaskKind::Language,
            ClassifierTask::Sentiment => TaskKind::Sentiment,
            ClassifierTask::Topic { .. } => TaskKind::Topic,
            ClassifierTask::Emotion => TaskKind::Emotion,
            ClassifierTask::Demographics => TaskKind::Demographics,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier transport error: {0}")]
    Transport(String),
    #[error("classifier call timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed classifier response: {0}")]
    Malformed(String),
    #[error("{task} classification failed after {attempts} attempts: {last_error}")]
    Exhausted {
        task: &'static str,
        attempts: usize,
        last_error: String,
    },
}

impl ClassifierError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Transport(_)
            | ClassifierError::Timeout(_)
            | ClassifierError::Malformed(_) => true,
            ClassifierError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            ClassifierError::Exhausted { .. } => false,
        }
    }
}

pub(crate) fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated: String = msg.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    format!("{truncated}... (truncated, {char_count} chars)")
}

/// A text-understanding capability reachable over the network.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Sends one prompt and returns the raw text reply.
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError>;
}

#[derive(Clone)]
pub struct ClassifierClient {
    backend: Arc<dyn ClassifierBackend>,
    policy: RetryPolicy,
    call_timeout: Duration,
    clock: Arc<dyn RetryClock>,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ClassifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierClient")
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl ClassifierClient {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ClassifierBackend>,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            policy,
            call_timeout,
            clock: Arc::new(TokioClock),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn RetryClock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Upper bound on the time one item can take, retries included.
    #[must_use]
    pub fn max_item_duration(&self) -> Duration {
        self.policy.worst_case(self.call_timeout)
    }

    /// Classifies `text` and returns the trimmed raw reply.
    ///
    /// # Errors
    /// Returns [`ClassifierError::Exhausted`] once every attempt failed.
    pub async fn classify(
        &self,
        text: &str,
        task: &ClassifierTask,
    ) -> Result<String, ClassifierError> {
        self.classify_with(text, task, |reply| Ok(reply.to_string()))
            .await
    }

    /// Classifies `text` and runs `parse` on the reply; a parse failure is
    /// treated as a malformed response and retried like any transient error.
    ///
    /// # Errors
    /// Returns [`ClassifierError::Exhausted`] once every attempt failed or a
    /// non-retryable error was returned by the backend.
    pub async fn classify_with<T, F>(
        &self,
        text: &str,
        task: &ClassifierTask,
        parse: F,
    ) -> Result<T, ClassifierError>
    where
        T: Send,
        F: Fn(&str) -> Result<T, String> + Send + Sync,
    {
        let kind = task.kind();
        let prompt = build_prompt(task, text);
        let mut attempt = 0;
        let mut last_error = ClassifierError::Malformed("no attempt made".to_string());

        while self.policy.can_retry(attempt) {
            self.clock.sleep(self.policy.delay_for_attempt(attempt)).await;

            let outcome = match timeout(self.call_timeout, self.backend.complete(&prompt)).await {
                Ok(Ok(reply)) => {
                    let trimmed = reply.trim();
                    if trimmed.is_empty() {
                        Err(ClassifierError::Malformed("empty response".to_string()))
                    } else {
                        parse(trimmed).map_err(ClassifierError::Malformed)
                    }
                }
                Ok(Err(error)) => Err(error),
                Err(_) => Err(ClassifierError::Timeout(self.call_timeout)),
            };

            attempt += 1;
            match outcome {
                Ok(value) => {
                    self.record(kind, "ok");
                    debug!(task = kind.as_str(), attempt, "classifier call succeeded");
                    return Ok(value);
                }
                Err(error) => {
                    let retryable = error.is_retryable();
                    warn!(
                        task = kind.as_str(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        retryable,
                        error = %error,
                        "classifier call failed"
                    );
                    last_error = error;
                    if !retryable {
                        break;
                    }
                    if self.policy.can_retry(attempt) {
                        self.record(kind, "retry");
                    }
                }
            }
        }

        self.record(kind, "exhausted");
        Err(ClassifierError::Exhausted {
            task: kind.as_str(),
            attempts: attempt,
            last_error: truncate_error_message(&last_error.to_string()),
        })
    }

    fn record(&self, kind: TaskKind, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_call(kind.as_str(), outcome);
        }
    }
}
