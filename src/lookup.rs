use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::cache::CitationCache;
use crate::config::Config;
use crate::delay::DelayPolicy;
use crate::format::format_count;
use crate::scholar::{CitationSource, FetchError};

/// Rendered in place of a count whenever a lookup fails.
pub const UNAVAILABLE: &str = "N/A";

/// Outcome of a single citation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    Count(u64),
    Unavailable(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Scholar or article id was absent or blank. Never cached.
    MissingParameter,
    /// Upstream answered with a non-2xx status.
    UpstreamStatus(u16),
    /// Transport, decoding or parsing failure.
    Fetch(String),
}

impl Citation {
    pub fn is_available(&self) -> bool {
        matches!(self, Citation::Count(_))
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Citation::Count(n) => f.write_str(&format_count(*n)),
            Citation::Unavailable(_) => f.write_str(UNAVAILABLE),
        }
    }
}

impl From<FetchError> for Failure {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Status(code) => Failure::UpstreamStatus(code),
            other => Failure::Fetch(other.to_string()),
        }
    }
}

/// Citation lookups for one build run.
///
/// Owns the cache, so every lookup for an article id after the first (whether
/// it succeeded or failed) is answered without throttling or network access.
pub struct CitationLookup<S, D> {
    source: S,
    delay: D,
    delay_min: Duration,
    delay_max: Duration,
    cache: CitationCache,
}

impl<S: CitationSource, D: DelayPolicy> CitationLookup<S, D> {
    pub fn new(source: S, delay: D, config: &Config) -> Self {
        Self::with_delay_bounds(source, delay, config.delay_min, config.delay_max)
    }

    pub fn with_delay_bounds(source: S, delay: D, delay_min: Duration, delay_max: Duration) -> Self {
        Self {
            source,
            delay,
            delay_min,
            delay_max,
            cache: CitationCache::new(),
        }
    }

    pub fn cache(&self) -> &CitationCache {
        &self.cache
    }

    pub async fn lookup(&mut self, scholar_id: Option<&str>, article_id: Option<&str>) -> Citation {
        let (Some(scholar_id), Some(article_id)) = (non_blank(scholar_id), non_blank(article_id))
        else {
            error!(?scholar_id, ?article_id, "scholar_id or article_id is missing");
            return Citation::Unavailable(Failure::MissingParameter);
        };

        if let Some(cached) = self.cache.get(article_id) {
            info!(article_id, "cache hit");
            return cached.clone();
        }

        self.delay.wait(self.delay_min, self.delay_max).await;

        let citation = match self.source.cited_by(scholar_id, article_id).await {
            Ok(count) => Citation::Count(count.unwrap_or(0)),
            Err(FetchError::Status(code)) => {
                warn!(scholar_id, article_id, status = code, "HTTP error fetching citation page");
                Citation::Unavailable(Failure::UpstreamStatus(code))
            }
            Err(e) => {
                warn!(article_id, error = %e, "error fetching citation count");
                Citation::Unavailable(e.into())
            }
        };

        self.cache.insert(article_id, citation.clone());
        citation
    }

    /// Lookup collapsed to the string substituted into the page.
    pub async fn render(&mut self, scholar_id: Option<&str>, article_id: Option<&str>) -> String {
        self.lookup(scholar_id, article_id).await.to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
