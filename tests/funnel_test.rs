mod support;

use std::sync::Arc;

use social_intel_worker::clients::classifier::ClassifierError;
use social_intel_worker::normalize::Platform;
use social_intel_worker::pipeline::date_range::DateRange;
use social_intel_worker::pipeline::funnel::{CleansingStats, FunnelParams};
use social_intel_worker::record::CanonicalRecord;

use proptest::prelude::*;

use support::{FnBackend, Task, happy_reply};

fn records(texts: &[&str]) -> Vec<CanonicalRecord> {
    texts
        .iter()
        .map(|text| CanonicalRecord::from_text(Platform::Tiktok, *text))
        .collect()
}

fn params(keywords: &[&str]) -> FunnelParams {
    FunnelParams {
        keywords: keywords.iter().map(ToString::to_string).collect(),
        date_range: None,
        validate_urls: false,
    }
}

#[tokio::test]
async fn duplicate_and_keyword_counts_follow_stage_order() {
    let backend = Arc::new(FnBackend::new(happy_reply));
    let funnel = support::funnel(backend);

    let outcome = funnel
        .run(
            records(&["buy X now", "buy X now", "I love X", "unrelated text"]),
            &params(&["X"]),
        )
        .await;

    // "unrelated text" contains an "x" once case is ignored.
    assert_eq!(
        outcome.stats,
        CleansingStats {
            initial: 4,
            after_url_validation: 4,
            after_duplicates: 3,
            after_keywords: 3,
            after_date_range: 3,
            after_language: 3,
            final_count: 3,
        }
    );
    let texts: Vec<_> = outcome.records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["buy X now", "I love X", "unrelated text"]);
}

#[tokio::test]
async fn language_exhaustion_excludes_the_record() {
    let backend = Arc::new(FnBackend::new(|task, text| match task {
        Task::Language if text.contains("unsure") => {
            Err(ClassifierError::Transport("connection reset".into()))
        }
        Task::Language if text.contains("english") => Ok("FALSE".into()),
        _ => Ok("TRUE".into()),
    }));
    let funnel = support::funnel(Arc::clone(&backend) as _);

    let outcome = funnel
        .run(
            records(&["promo serum", "serum unsure", "serum english"]),
            &params(&["serum"]),
        )
        .await;

    assert_eq!(outcome.stats.after_keywords, 3);
    assert_eq!(outcome.stats.after_language, 1);
    assert_eq!(outcome.stats.final_count, 1);
    assert_eq!(outcome.records[0].text, "promo serum");
    // one call each for the decided records, three for the exhausted one
    assert_eq!(backend.calls(), 5);
}

#[tokio::test]
async fn date_range_drops_missing_and_out_of_window_records() {
    let backend = Arc::new(FnBackend::new(happy_reply));
    let funnel = support::funnel(backend);

    let mut input = records(&["kopi pagi", "kopi siang", "kopi malam"]);
    input[0].posted_at = "2025-01-10T08:00:00Z".parse().ok();
    input[1].posted_at = None;
    input[2].posted_at = "2025-02-01T00:00:00Z".parse().ok();

    let outcome = funnel
        .run(
            input,
            &FunnelParams {
                keywords: vec!["kopi".into()],
                date_range: DateRange::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap(),
                validate_urls: false,
            },
        )
        .await;

    assert_eq!(outcome.stats.after_keywords, 3);
    assert_eq!(outcome.stats.after_date_range, 1);
    assert_eq!(outcome.records[0].text, "kopi pagi");
}

#[tokio::test]
async fn url_validation_runs_before_dedup() {
    let backend = Arc::new(FnBackend::new(happy_reply));
    let funnel = support::funnel(backend);

    let mut input = records(&["serum promo", "serum promo", "serum review"]);
    input[0].post_url = Some("https://www.youtube.com/watch?v=1".into());
    input[1].post_url = Some("https://www.tiktok.com/@shop/video/2".into());

    let outcome = funnel
        .run(
            input,
            &FunnelParams {
                validate_urls: true,
                ..params(&["serum"])
            },
        )
        .await;

    assert_eq!(outcome.stats.initial, 3);
    assert_eq!(outcome.stats.after_url_validation, 1);
    assert_eq!(outcome.stats.after_duplicates, 1);
    assert!(outcome.stats.is_monotonic());
    assert_eq!(
        outcome.records[0].post_url.as_deref(),
        Some("https://www.tiktok.com/@shop/video/2")
    );
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime builds")
        .block_on(future)
}

/// Short texts over a tiny alphabet so duplicates and keyword hits are common.
fn texts_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abcXY ]{0,6}", 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counters_never_increase_across_stages(
        texts in texts_strategy(),
        keywords in prop::collection::vec("[abcxy]{1,2}", 1..4),
    ) {
        // the language verdict depends on the text only, so it is stable
        let backend = Arc::new(FnBackend::new(|task, text| match task {
            Task::Language => Ok(if text.len() % 2 == 0 { "TRUE" } else { "FALSE" }.into()),
            _ => Ok("Neutral".into()),
        }));
        let funnel = support::funnel(backend);
        let input: Vec<&str> = texts.iter().map(String::as_str).collect();
        let keyword_refs: Vec<&str> = keywords.iter().map(String::as_str).collect();

        let outcome = block_on(funnel.run(records(&input), &params(&keyword_refs)));

        prop_assert!(outcome.stats.is_monotonic(), "{:?}", outcome.stats);
        prop_assert_eq!(outcome.stats.initial, texts.len());
        prop_assert_eq!(outcome.records.len(), outcome.stats.final_count);

        // survivors keep their relative input order
        let mut remaining = texts.iter();
        for record in &outcome.records {
            prop_assert!(remaining.any(|text| *text == record.text));
        }
    }
}
