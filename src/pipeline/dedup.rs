use std::collections::HashSet;

use crate::record::CanonicalRecord;

use super::funnel::FilterStage;

/// Drops records whose text exactly matches an earlier record's text.
///
/// Matching is byte-exact; the first occurrence wins and relative order of
/// the survivors is unchanged.
#[derive(Debug, Default, Clone)]
pub struct ExactTextDedupStage;

impl ExactTextDedupStage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FilterStage for ExactTextDedupStage {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let mut seen = HashSet::with_capacity(records.len());
        records
            .into_iter()
            .filter(|record| seen.insert(record.text.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Platform;

    fn records(texts: &[&str]) -> Vec<CanonicalRecord> {
        texts
            .iter()
            .map(|text| CanonicalRecord::from_text(Platform::Tiktok, *text))
            .collect()
    }

    fn texts(records: &[CanonicalRecord]) -> Vec<&str> {
        records.iter().map(|record| record.text.as_str()).collect()
    }

    #[test]
    fn first_occurrence_wins() {
        let mut input = records(&["buy X now", "I love X", "buy X now"]);
        input[0].post_id = Some("first".into());
        input[2].post_id = Some("second".into());

        let kept = ExactTextDedupStage::new().apply(input);

        assert_eq!(texts(&kept), vec!["buy X now", "I love X"]);
        assert_eq!(kept[0].post_id.as_deref(), Some("first"));
    }

    #[test]
    fn near_duplicates_are_kept() {
        let kept = ExactTextDedupStage::new().apply(records(&["Buy X", "buy x", "buy x "]));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn empty_texts_collapse_to_one() {
        let kept = ExactTextDedupStage::new().apply(records(&["", "a", ""]));
        assert_eq!(texts(&kept), vec!["", "a"]);
    }
}
