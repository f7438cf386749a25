//! Run-scoped, append-only topic vocabulary.
//!
//! Labels are compared through [`label_key`], so "Product Quality" and
//! "product  quality" are one entry; the first spelling seen becomes the
//! canonical label. Entries are never removed or renamed.
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::util::text::{clean_label, label_key};

/// Topic assigned when the classifier gives up or returns nothing usable.
pub const UNKNOWN_TOPIC: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Taxonomy {
    labels: Vec<String>,
    #[serde(skip)]
    keys: HashMap<String, usize>,
}

impl Taxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a taxonomy, e.g. with labels carried over from a previous run.
    #[must_use]
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut taxonomy = Self::new();
        taxonomy.absorb(labels);
        taxonomy
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Canonical entry matching `raw` up to case and whitespace.
    #[must_use]
    pub fn canonical(&self, raw: &str) -> Option<&str> {
        self.keys
            .get(&label_key(&clean_label(raw)))
            .map(|&index| self.labels[index].as_str())
    }

    /// Appends every label not yet known, in order, and returns the ones
    /// that were added. `Unknown` and blank labels are never stored.
    pub fn absorb<I, S>(&mut self, raws: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = Vec::new();
        for raw in raws {
            let cleaned = clean_label(raw.as_ref());
            let key = label_key(&cleaned);
            if is_unknown_key(&key) || self.keys.contains_key(&key) {
                continue;
            }
            self.keys.insert(key, self.labels.len());
            self.labels.push(cleaned.clone());
            added.push(cleaned);
        }
        added
    }

    /// Maps a raw guess onto its canonical entry, or [`UNKNOWN_TOPIC`].
    ///
    /// Guesses that were never absorbed are returned cleaned but unmapped.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = clean_label(raw);
        let key = label_key(&cleaned);
        if is_unknown_key(&key) {
            return UNKNOWN_TOPIC.to_string();
        }
        self.keys
            .get(&key)
            .map_or(cleaned, |&index| self.labels[index].clone())
    }

    /// Raw label to canonical label for every distinct input.
    #[must_use]
    pub fn mapping<S: AsRef<str>>(&self, raws: &[S]) -> BTreeMap<String, String> {
        raws.iter()
            .map(|raw| (raw.as_ref().to_string(), self.normalize(raw.as_ref())))
            .collect()
    }
}

fn is_unknown_key(key: &str) -> bool {
    key.is_empty() || key == "unknown"
}
