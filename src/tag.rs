//! The `google_scholar_citations` template tag.
//!
//! ```text
//! {% google_scholar_citations scholar_var article_var %}
//! ```
//!
//! Both arguments are variable names resolved against the render context.
//! Dotted names (`page.scholar_id`) walk nested objects.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::delay::DelayPolicy;
use crate::lookup::CitationLookup;
use crate::scholar::CitationSource;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*google_scholar_citations\b(.*?)\s*-?%\}")
        .expect("static pattern compiles")
});

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error(
        "syntax error in google_scholar_citations tag at line {line}: expected two variable names, got '{markup}'"
    )]
    Syntax { markup: String, line: usize },
}

/// A parsed tag: the names of the two context variables it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationsTag {
    pub scholar_var: String,
    pub article_var: String,
}

impl CitationsTag {
    /// Parse the tag's markup (everything after the tag name). Tokens beyond
    /// the second are ignored.
    pub fn parse(markup: &str) -> Option<Self> {
        let mut tokens = markup.split_whitespace();
        let scholar_var = tokens.next()?;
        let article_var = tokens.next()?;
        Some(Self {
            scholar_var: scholar_var.to_string(),
            article_var: article_var.to_string(),
        })
    }

    pub async fn render<S, D>(&self, context: &Value, lookup: &mut CitationLookup<S, D>) -> String
    where
        S: CitationSource,
        D: DelayPolicy,
    {
        let scholar_id = resolve(context, &self.scholar_var);
        let article_id = resolve(context, &self.article_var);
        lookup
            .render(scholar_id.as_deref(), article_id.as_deref())
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Citations(CitationsTag),
}

/// A template split into literal text and citation tags.
///
/// Anything that is not a `google_scholar_citations` tag, other template
/// tags included, is passed through untouched.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TagError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in TAG.captures_iter(source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let markup = caps.get(1).map_or("", |m| m.as_str());
            let tag = CitationsTag::parse(markup).ok_or_else(|| TagError::Syntax {
                markup: markup.trim().to_string(),
                line: line_of(source, whole.start),
            })?;

            if whole.start > last {
                segments.push(Segment::Text(source[last..whole.start].to_string()));
            }
            segments.push(Segment::Citations(tag));
            last = whole.end;
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        debug!(
            tags = segments
                .iter()
                .filter(|s| matches!(s, Segment::Citations(_)))
                .count(),
            "template parsed"
        );
        Ok(Self { segments })
    }

    /// Render every tag in document order, awaiting each lookup in turn.
    pub async fn render<S, D>(&self, context: &Value, lookup: &mut CitationLookup<S, D>) -> String
    where
        S: CitationSource,
        D: DelayPolicy,
    {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Citations(tag) => output.push_str(&tag.render(context, lookup).await),
            }
        }
        output
    }
}

pub async fn render_template<S, D>(
    source: &str,
    context: &Value,
    lookup: &mut CitationLookup<S, D>,
) -> Result<String, TagError>
where
    S: CitationSource,
    D: DelayPolicy,
{
    let template = Template::parse(source)?;
    Ok(template.render(context, lookup).await)
}

/// Look up a (possibly dotted) variable name. Strings and integers resolve to
/// text; anything else, fractional numbers included, counts as unbound.
fn resolve(context: &Value, name: &str) -> Option<String> {
    let value = name
        .split('.')
        .try_fold(context, |value, key| value.as_object()?.get(key))?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string())),
        _ => None,
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
