//! Optional pre-funnel check that each post links back to its own platform.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::Platform;
use crate::record::CanonicalRecord;

use super::funnel::FilterStage;

static TIKTOK_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(tiktok\.com|vm\.tiktok\.com)").expect("valid tiktok regex"));
static INSTAGRAM_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)instagram\.com").expect("valid instagram regex"));
static TWITTER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(twitter\.com|x\.com)").expect("valid twitter regex"));
static YOUTUBE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(youtube\.com|youtu\.be)").expect("valid youtube regex"));

fn url_pattern(platform: Platform) -> &'static Regex {
    match platform {
        Platform::Tiktok => &TIKTOK_URL,
        Platform::Instagram => &INSTAGRAM_URL,
        Platform::Twitter => &TWITTER_URL,
        Platform::Youtube => &YOUTUBE_URL,
    }
}

/// Keeps records whose post URL points at their platform's domain.
///
/// A record without a URL is dropped, unless no record of the dataset has
/// a URL field at all; such a dataset passes untouched.
#[derive(Debug, Default, Clone)]
pub struct PostUrlStage;

impl PostUrlStage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn matches(platform: Platform, url: &str) -> bool {
        url_pattern(platform).is_match(url)
    }
}

fn has_url_field(record: &CanonicalRecord) -> bool {
    let fields = record.raw.fields();
    record.post_url.is_some()
        || record
            .platform
            .url_fields()
            .iter()
            .any(|field| fields.contains_key(*field))
}

impl FilterStage for PostUrlStage {
    fn name(&self) -> &'static str {
        "post_url"
    }

    fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        if !records.iter().any(has_url_field) {
            return records;
        }
        records
            .into_iter()
            .filter(|record| {
                record
                    .post_url
                    .as_deref()
                    .is_some_and(|url| Self::matches(record.platform, url))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Layer, normalize_record};
    use crate::record::RawRecord;
    use rstest::rstest;
    use serde_json::json;

    fn tiktok(value: serde_json::Value) -> CanonicalRecord {
        normalize_record(Platform::Tiktok, Layer::Posts, RawRecord::from_value(value))
    }

    #[rstest]
    #[case(Platform::Tiktok, "https://www.tiktok.com/@shop/video/1", true)]
    #[case(Platform::Tiktok, "https://VM.TIKTOK.COM/ZS8abc", true)]
    #[case(Platform::Tiktok, "https://www.instagram.com/p/abc", false)]
    #[case(Platform::Instagram, "https://www.instagram.com/p/abc", true)]
    #[case(Platform::Twitter, "https://x.com/shop/status/1", true)]
    #[case(Platform::Twitter, "https://twitter.com/shop/status/1", true)]
    #[case(Platform::Youtube, "https://youtu.be/abc", true)]
    #[case(Platform::Youtube, "https://example.com/watch?v=abc", false)]
    fn url_matches_platform_domain(
        #[case] platform: Platform,
        #[case] url: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(PostUrlStage::matches(platform, url), expected);
    }

    #[test]
    fn drops_foreign_and_missing_urls_in_order() {
        let records = vec![
            tiktok(json!({ "text": "a", "webVideoUrl": "https://www.tiktok.com/@s/video/1" })),
            tiktok(json!({ "text": "b", "webVideoUrl": "https://www.youtube.com/watch?v=1" })),
            tiktok(json!({ "text": "c" })),
            tiktok(json!({ "text": "d", "postPage": "https://vm.tiktok.com/ZS8" })),
        ];

        let kept: Vec<String> = PostUrlStage::new()
            .apply(records)
            .into_iter()
            .map(|record| record.text)
            .collect();

        assert_eq!(kept, vec!["a", "d"]);
    }

    #[test]
    fn dataset_without_url_fields_passes_untouched() {
        let records = vec![
            tiktok(json!({ "text": "a" })),
            tiktok(json!({ "text": "b", "playCount": 4 })),
        ];

        assert_eq!(PostUrlStage::new().apply(records).len(), 2);
    }
}
