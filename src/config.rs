use std::{env, fmt, num::NonZeroUsize, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::clients::classifier::GeminiConfig;
use crate::pipeline::batch::BatchMapper;
use crate::util::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BACKUP_DIR: &str = "data/scraped_data";

#[derive(Clone, PartialEq)]
pub struct Config {
    classifier_api_key: String,
    classifier_base_url: String,
    classifier_model: String,
    classifier_call_timeout: Duration,
    classifier_max_attempts: NonZeroUsize,
    classifier_retry_pause: Duration,
    analysis_batch_size: NonZeroUsize,
    analysis_max_workers: NonZeroUsize,
    target_language: String,
    backup_dir: Option<PathBuf>,
    location_hint_max_chars: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// Reads the worker configuration from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] when `CLASSIFIER_API_KEY` is unset and
    /// [`ConfigError::Invalid`] when a numeric value fails to parse or is zero
    /// where zero is not allowed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let classifier_api_key = env_var("CLASSIFIER_API_KEY")?;
        let classifier_base_url =
            env::var("CLASSIFIER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let classifier_model =
            env::var("CLASSIFIER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        // Per-call timeout and fixed-pause retry
        let classifier_call_timeout = parse_duration_ms("CLASSIFIER_CALL_TIMEOUT_MS", 30_000)?;
        let classifier_max_attempts = parse_non_zero_usize("CLASSIFIER_MAX_ATTEMPTS", 3)?;
        let classifier_retry_pause = parse_duration_ms("CLASSIFIER_RETRY_PAUSE_MS", 1_000)?;

        // Fan-out settings
        let analysis_batch_size = parse_non_zero_usize("ANALYSIS_BATCH_SIZE", 100)?;
        let analysis_max_workers = parse_non_zero_usize("ANALYSIS_MAX_WORKERS", 20)?;

        let target_language =
            env::var("TARGET_LANGUAGE").unwrap_or_else(|_| "Indonesian".to_string());
        let backup_dir = parse_optional_path("BACKUP_DIR", DEFAULT_BACKUP_DIR);
        let location_hint_max_chars = parse_usize("LOCATION_HINT_MAX_CHARS", 64)?;

        Ok(Self {
            classifier_api_key,
            classifier_base_url,
            classifier_model,
            classifier_call_timeout,
            classifier_max_attempts,
            classifier_retry_pause,
            analysis_batch_size,
            analysis_max_workers,
            target_language,
            backup_dir,
            location_hint_max_chars,
        })
    }

    #[must_use]
    pub fn classifier_base_url(&self) -> &str {
        &self.classifier_base_url
    }

    #[must_use]
    pub fn classifier_model(&self) -> &str {
        &self.classifier_model
    }

    #[must_use]
    pub fn classifier_call_timeout(&self) -> Duration {
        self.classifier_call_timeout
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.classifier_max_attempts.get(), self.classifier_retry_pause)
    }

    #[must_use]
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            base_url: self.classifier_base_url.clone(),
            model: self.classifier_model.clone(),
            api_key: self.classifier_api_key.clone(),
            call_timeout: self.classifier_call_timeout,
        }
    }

    #[must_use]
    pub fn batch_mapper(&self) -> BatchMapper {
        BatchMapper::new(self.analysis_batch_size, self.analysis_max_workers)
    }

    #[must_use]
    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// `None` when backups are disabled with an empty `BACKUP_DIR`.
    #[must_use]
    pub fn backup_dir(&self) -> Option<&PathBuf> {
        self.backup_dir.as_ref()
    }

    #[must_use]
    pub fn location_hint_max_chars(&self) -> usize {
        self.location_hint_max_chars
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("classifier_api_key", &"<redacted>")
            .field("classifier_base_url", &self.classifier_base_url)
            .field("classifier_model", &self.classifier_model)
            .field("classifier_call_timeout", &self.classifier_call_timeout)
            .field("classifier_max_attempts", &self.classifier_max_attempts)
            .field("classifier_retry_pause", &self.classifier_retry_pause)
            .field("analysis_batch_size", &self.analysis_batch_size)
            .field("analysis_max_workers", &self.analysis_max_workers)
            .field("target_language", &self.target_language)
            .field("backup_dir", &self.backup_dir)
            .field("location_hint_max_chars", &self.location_hint_max_chars)
            .finish()
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default_ms.to_string());
    let ms = raw.trim().parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    Ok(Duration::from_millis(ms))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<usize>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        })
}

fn parse_optional_path(name: &'static str, default: &str) -> Option<PathBuf> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}
