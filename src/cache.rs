use std::collections::HashMap;

use crate::lookup::Citation;

/// Per-build cache of lookup results keyed by article id.
///
/// Entries are never evicted: failures are kept alongside successes so a
/// failing article is not requested again during the same build.
#[derive(Debug, Default)]
pub struct CitationCache {
    entries: HashMap<String, Citation>,
}

impl CitationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, article_id: &str) -> Option<&Citation> {
        self.entries.get(article_id)
    }

    pub fn insert(&mut self, article_id: &str, citation: Citation) {
        self.entries.insert(article_id.to_string(), citation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of cached entries that render as "N/A".
    pub fn failures(&self) -> usize {
        self.entries.values().filter(|c| !c.is_available()).count()
    }
}
