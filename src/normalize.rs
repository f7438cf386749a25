//! Platform field extraction.
//!
//! Each platform exports posts with its own field names. A [`FieldExtractor`]
//! is selected by [`Platform`] and projects a [`RawRecord`] onto a
//! [`CanonicalRecord`]; it never fails, missing fields fall back to empty or
//! zero values.
mod aliases;
mod coerce;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{CanonicalRecord, EngagementCounts, RawRecord};

pub(crate) use self::coerce::parse_timestamp;

/// Comment exports carry the body under `text` on every platform.
const COMMENT_TEXT: &[&str] = &["text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Instagram,
    Twitter,
    Youtube,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("unsupported layer {0}, expected 1 (posts) or 2 (comments)")]
    UnsupportedLayer(u8),
}

/// Which export of a platform a dataset holds.
///
/// Numbered on the wire (`1` posts, `2` comments) to match backup file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Layer {
    #[default]
    Posts,
    Comments,
}

impl Layer {
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Layer::Posts => 1,
            Layer::Comments => 2,
        }
    }
}

impl TryFrom<u8> for Layer {
    type Error = NormalizeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Layer::Posts),
            2 => Ok(Layer::Comments),
            other => Err(NormalizeError::UnsupportedLayer(other)),
        }
    }
}

impl From<Layer> for u8 {
    fn from(layer: Layer) -> Self {
        layer.number()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer{}", self.number())
    }
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Youtube,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
        }
    }

    /// Extraction strategy for this platform.
    #[must_use]
    pub fn extractor(self) -> &'static dyn FieldExtractor {
        match self {
            Platform::Tiktok => &aliases::TIKTOK,
            Platform::Instagram => &aliases::INSTAGRAM,
            Platform::Twitter => &aliases::TWITTER,
            Platform::Youtube => &aliases::YOUTUBE,
        }
    }

    /// Raw field names that may hold the post URL.
    pub(crate) fn url_fields(self) -> &'static [&'static str] {
        match self {
            Platform::Tiktok => aliases::TIKTOK.url,
            Platform::Instagram => aliases::INSTAGRAM.url,
            Platform::Twitter => aliases::TWITTER.url,
            Platform::Youtube => aliases::YOUTUBE.url,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = NormalizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "youtube" => Ok(Platform::Youtube),
            other => Err(NormalizeError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Fixed capability every platform strategy provides.
pub trait FieldExtractor: Send + Sync {
    fn extract_text(&self, raw: &RawRecord) -> String;
    fn extract_counts(&self, raw: &RawRecord) -> EngagementCounts;
    fn extract_timestamp(&self, raw: &RawRecord) -> Option<DateTime<Utc>>;
    fn extract_author(&self, raw: &RawRecord) -> Option<String>;
    fn extract_post_id(&self, raw: &RawRecord) -> Option<String>;
    fn extract_url(&self, raw: &RawRecord) -> Option<String>;
    fn extract_description(&self, raw: &RawRecord) -> String;
}

/// Projects one raw row onto the canonical shape for `platform`.
///
/// Comment rows take their text from `text` whatever the platform.
#[must_use]
pub fn normalize_record(platform: Platform, layer: Layer, raw: RawRecord) -> CanonicalRecord {
    let extractor = platform.extractor();
    let text = match layer {
        Layer::Posts => extractor.extract_text(&raw),
        Layer::Comments => coerce::first_string(&raw, COMMENT_TEXT).unwrap_or_default(),
    };
    CanonicalRecord {
        platform,
        post_id: extractor.extract_post_id(&raw),
        text,
        description: extractor.extract_description(&raw),
        post_url: extractor.extract_url(&raw),
        posted_at: extractor.extract_timestamp(&raw),
        author: extractor.extract_author(&raw),
        counts: extractor.extract_counts(&raw),
        raw,
    }
}

#[must_use]
pub fn normalize_all(
    platform: Platform,
    layer: Layer,
    rows: Vec<RawRecord>,
) -> Vec<CanonicalRecord> {
    rows.into_iter()
        .map(|raw| normalize_record(platform, layer, raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("TikTok", Platform::Tiktok)]
    #[case(" instagram ", Platform::Instagram)]
    #[case("x", Platform::Twitter)]
    #[case("youtube", Platform::Youtube)]
    fn platform_parses_case_insensitively(#[case] input: &str, #[case] expected: Platform) {
        assert_eq!(input.parse::<Platform>().unwrap(), expected);
    }

    #[test]
    fn unsupported_platform_is_rejected() {
        assert_eq!(
            "myspace".parse::<Platform>(),
            Err(NormalizeError::UnsupportedPlatform("myspace".into()))
        );
    }

    #[test]
    fn tiktok_record_uses_platform_aliases() {
        let raw = RawRecord::from_value(json!({
            "id": 7301,
            "text": "buy hufagrip now",
            "diggCount": 120,
            "commentCount": "4",
            "shareCount": 2,
            "playCount": 9000,
            "createTime": 1_700_000_000,
            "authorMeta": { "name": "toko_sehat" },
            "webVideoUrl": "https://www.tiktok.com/@toko_sehat/video/7301"
        }));

        let record = normalize_record(Platform::Tiktok, Layer::Posts, raw);

        assert_eq!(record.text, "buy hufagrip now");
        assert_eq!(record.post_id.as_deref(), Some("7301"));
        assert_eq!(record.author.as_deref(), Some("toko_sehat"));
        assert_eq!(record.counts.like_count, 120);
        assert_eq!(record.counts.comment_count, 4);
        assert_eq!(record.counts.view_count, 9000);
        assert_eq!(
            record.posted_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
        assert_eq!(
            record.post_url.as_deref(),
            Some("https://www.tiktok.com/@toko_sehat/video/7301")
        );
    }

    #[test]
    fn title_wins_over_text_when_both_present() {
        let raw = RawRecord::from_value(json!({ "title": "first", "text": "second" }));
        assert_eq!(normalize_record(Platform::Tiktok, Layer::Posts, raw).text, "first");
    }

    #[test]
    fn instagram_caption_and_counts() {
        let raw = RawRecord::from_value(json!({
            "caption": "Hufagripp saves my day",
            "likesCount": 33,
            "commentsCount": 5,
            "timestamp": "2025-03-01T10:00:00.000Z",
            "ownerUsername": "mama_rina"
        }));

        let record = normalize_record(Platform::Instagram, Layer::Posts, raw);

        assert_eq!(record.text, "Hufagripp saves my day");
        assert_eq!(record.counts.like_count, 33);
        assert_eq!(record.counts.comment_count, 5);
        assert_eq!(record.counts.share_count, 0);
        assert_eq!(record.author.as_deref(), Some("mama_rina"));
        assert!(record.posted_at.is_some());
    }

    #[test]
    fn shape_mismatch_yields_empty_record() {
        let raw = RawRecord::from_value(json!({ "unexpected": true, "likesCount": -3 }));

        let record = normalize_record(Platform::Twitter, Layer::Posts, raw);

        assert!(record.text.is_empty());
        assert_eq!(record.counts, EngagementCounts::default());
        assert!(record.posted_at.is_none());
        assert!(record.author.is_none());
    }

    #[test]
    fn comment_layer_reads_text_on_every_platform() {
        let raw = RawRecord::from_value(json!({
            "caption": "the post caption",
            "title": "the video title",
            "text": "obatnya manjur banget",
            "likesCount": 3
        }));

        for platform in Platform::ALL {
            let record = normalize_record(platform, Layer::Comments, raw.clone());
            assert_eq!(record.text, "obatnya manjur banget", "{platform}");
        }
        let post = normalize_record(Platform::Instagram, Layer::Posts, raw);
        assert_eq!(post.text, "the post caption");
    }

    #[test]
    fn layer_uses_numbers_on_the_wire() {
        assert_eq!(serde_json::to_value(Layer::Comments).unwrap(), json!(2));
        assert_eq!(serde_json::from_value::<Layer>(json!(1)).unwrap(), Layer::Posts);
        assert!(serde_json::from_value::<Layer>(json!(3)).is_err());
        assert_eq!(Layer::Comments.to_string(), "layer2");
    }
}
