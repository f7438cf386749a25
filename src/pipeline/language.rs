//! Target-language filter backed by the classifier.
//!
//! Fail-closed: a record whose language call is exhausted is dropped.
use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::classifier::{ClassifierClient, ClassifierTask};
use crate::observability::metrics::Metrics;
use crate::pipeline::batch::BatchMapper;
use crate::record::CanonicalRecord;

#[derive(Debug, Clone)]
pub struct LanguageStage {
    client: Arc<ClassifierClient>,
    mapper: BatchMapper,
    target: String,
    metrics: Option<Arc<Metrics>>,
}

impl LanguageStage {
    #[must_use]
    pub fn new(
        client: Arc<ClassifierClient>,
        mapper: BatchMapper,
        target: impl Into<String>,
    ) -> Self {
        Self {
            client,
            mapper,
            target: target.into(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// One verdict per text, in input order. Exhausted calls yield `false`.
    pub async fn verdicts(&self, texts: &[String]) -> Vec<bool> {
        let client = Arc::clone(&self.client);
        let metrics = self.metrics.clone();
        let task = Arc::new(ClassifierTask::Language {
            target: self.target.clone(),
        });

        let call = move |text: String| {
            let client = Arc::clone(&client);
            let metrics = metrics.clone();
            let task = Arc::clone(&task);
            async move {
                match client.classify_with(&text, &task, parse_verdict).await {
                    Ok(verdict) => verdict,
                    Err(error) => {
                        warn!(error = %error, "language undecided, dropping record");
                        if let Some(metrics) = &metrics {
                            metrics.record_fallback("language");
                        }
                        false
                    }
                }
            }
        };

        self.mapper.map_all(texts, call, &|| false).await
    }

    pub async fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        if records.is_empty() {
            return records;
        }
        let texts: Vec<String> = records.iter().map(|record| record.text.clone()).collect();
        let verdicts = self.verdicts(&texts).await;
        let kept: Vec<CanonicalRecord> = records
            .into_iter()
            .zip(verdicts)
            .filter_map(|(record, keep)| keep.then_some(record))
            .collect();
        debug!(target_language = %self.target, kept = kept.len(), "language filter applied");
        kept
    }
}

/// Accepts `TRUE`/`FALSE` in any case, optionally followed by punctuation or
/// an explanation. Anything else is malformed and retried.
fn parse_verdict(reply: &str) -> Result<bool, String> {
    let first = reply
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| !word.is_empty())
        .unwrap_or_default();
    if first.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if first.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("expected TRUE or FALSE, got {reply:?}"))
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::clients::classifier::ClassifierError;
    use crate::clients::classifier::testing::ScriptedBackend;
    use crate::normalize::Platform;
    use crate::util::retry::{RecordingClock, RetryPolicy};

    fn stage(replies: Vec<Result<String, ClassifierError>>, attempts: usize) -> LanguageStage {
        let client = ClassifierClient::new(
            Arc::new(ScriptedBackend::new(replies)),
            RetryPolicy::new(attempts, Duration::from_secs(1)),
            Duration::from_secs(5),
        )
        .with_clock(Arc::new(RecordingClock::new()));
        LanguageStage::new(
            Arc::new(client),
            BatchMapper::new(NonZeroUsize::new(10).unwrap(), NonZeroUsize::new(1).unwrap()),
            "Indonesian",
        )
    }

    #[rstest]
    #[case("TRUE", Ok(true))]
    #[case("false.", Ok(false))]
    #[case("True - the text is Indonesian", Ok(true))]
    fn verdicts_parse(#[case] reply: &str, #[case] expected: Result<bool, String>) {
        assert_eq!(parse_verdict(reply), expected);
    }

    #[test]
    fn other_replies_are_malformed() {
        assert!(parse_verdict("maybe").is_err());
        assert!(parse_verdict("").is_err());
    }

    #[tokio::test]
    async fn keeps_only_confirmed_records() {
        let stage = stage(vec![Ok("TRUE".into()), Ok("FALSE".into()), Ok("true".into())], 1);
        let records = ["saya suka", "I like it", "bagus sekali"]
            .into_iter()
            .map(|text| CanonicalRecord::from_text(Platform::Tiktok, text))
            .collect();

        let kept = stage.apply(records).await;

        let texts: Vec<_> = kept.iter().map(|record| record.text.as_str()).collect();
        assert_eq!(texts, vec!["saya suka", "bagus sekali"]);
    }

    #[tokio::test]
    async fn exhausted_classification_drops_the_record() {
        let stage = stage(
            vec![
                Err(ClassifierError::Transport("down".into())),
                Ok("unsure".into()),
                Err(ClassifierError::Timeout(Duration::from_secs(5))),
            ],
            3,
        );

        let kept = stage
            .apply(vec![CanonicalRecord::from_text(Platform::Tiktok, "halo")])
            .await;

        assert!(kept.is_empty());
    }
}
