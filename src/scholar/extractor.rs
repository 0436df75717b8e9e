use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::FetchError;

static CITED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cited by\s+([0-9][0-9,]*)").expect("static pattern compiles"));

/// Find the first "Cited by N" marker in the page's visible text.
///
/// Returns `Ok(None)` when the page has no marker. Comma grouping
/// (`1,234`) is accepted.
pub(super) fn extract_cited_by(html: &str) -> Result<Option<u64>, FetchError> {
    let text = visible_text(html);
    let Some(caps) = CITED_BY.captures(&text) else {
        return Ok(None);
    };
    let digits = caps[1].replace(',', "");
    digits
        .parse::<u64>()
        .map(Some)
        .map_err(|_| FetchError::InvalidCount(caps[1].to_string()))
}

/// Elements whose text never renders.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Rendered text of `<body>`, one space between text nodes.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Some(body) = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
    else {
        return String::new();
    };

    body.descendants()
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
