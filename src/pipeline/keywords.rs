use crate::record::CanonicalRecord;
use crate::util::text::contains_case_insensitive;

use super::funnel::FilterStage;

/// Keeps records whose text contains at least one keyword, ignoring case.
#[derive(Debug, Clone)]
pub struct KeywordStage {
    needles: Vec<String>,
}

impl KeywordStage {
    /// Blank keywords are ignored; an empty list keeps nothing.
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let needles = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { needles }
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.needles
            .iter()
            .any(|needle| contains_case_insensitive(text, needle))
    }
}

impl FilterStage for KeywordStage {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        records
            .into_iter()
            .filter(|record| self.matches(&record.text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Platform;
    use rstest::rstest;

    #[rstest]
    #[case("I love SKINCARE", true)]
    #[case("skincare routine", true)]
    #[case("Serum baru", true)]
    #[case("nothing relevant", false)]
    #[case("", false)]
    fn matches_any_keyword_case_insensitively(#[case] text: &str, #[case] expected: bool) {
        let stage = KeywordStage::new(["Skincare", "serum"]);
        assert_eq!(stage.matches(text), expected);
    }

    #[test]
    fn blank_keywords_match_nothing() {
        let stage = KeywordStage::new(["", "  "]);
        let kept = stage.apply(vec![CanonicalRecord::from_text(Platform::Youtube, "anything")]);
        assert!(kept.is_empty());
    }

    #[test]
    fn apply_preserves_order() {
        let stage = KeywordStage::new(["x"]);
        let kept = stage.apply(
            ["a x", "b", "c X", "d x"]
                .into_iter()
                .map(|text| CanonicalRecord::from_text(Platform::Twitter, text))
                .collect(),
        );
        let texts: Vec<_> = kept.iter().map(|record| record.text.as_str()).collect();
        assert_eq!(texts, vec!["a x", "c X", "d x"]);
    }
}
