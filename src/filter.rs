//! # Dedup & Filter
//! Pure selection of tenders worth announcing: name matches a keyword and the
//! identifier has not been seen before. No I/O and no mutation of the seen
//! set, so every rule here is unit-testable on plain data.

use std::collections::{HashMap, HashSet};

use crate::ingest::types::{Listing, Tender};

/// Keywords used when neither `TENDER_KEYWORDS` nor a keyword file is given.
pub const DEFAULT_KEYWORDS: &[&str] = &["curso", "taller", "capacitación", "capacitacion"];

/// Identifier → tender last observed under it.
pub type SeenSet = HashMap<String, Tender>;

/// Immutable, case-insensitive substring patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    // Lowercased, trimmed, non-empty, unique; insertion order kept for logs.
    patterns: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut uniq = HashSet::new();
        let mut patterns = Vec::new();
        for it in items {
            let k = it.as_ref().trim().to_lowercase();
            if !k.is_empty() && uniq.insert(k.clone()) {
                patterns.push(k);
            }
        }
        Self { patterns }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.patterns.iter().any(|k| name.contains(k.as_str()))
    }

    /// Every pattern found in `name`.
    pub fn matched_in(&self, name: &str) -> Vec<&str> {
        let name = name.to_lowercase();
        self.patterns
            .iter()
            .filter(|k| name.contains(k.as_str()))
            .map(String::as_str)
            .collect()
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Tenders from `listing` whose name matches `keywords`.
pub fn keyword_matches<'a>(listing: &'a Listing, keywords: &KeywordSet) -> Vec<&'a Tender> {
    listing.iter().filter(|t| keywords.matches(&t.name)).collect()
}

/// Keyword matches not present in `seen`, in listing order. An identifier
/// repeated within the listing is returned once (first occurrence).
pub fn new_matches(listing: &Listing, keywords: &KeywordSet, seen: &SeenSet) -> Vec<Tender> {
    let mut in_cycle = HashSet::new();
    keyword_matches(listing, keywords)
        .into_iter()
        .filter(|t| !seen.contains_key(&t.id))
        .filter(|t| in_cycle.insert(t.id.as_str()))
        .cloned()
        .collect()
}
