//! Google Scholar citation-detail page client.

mod extractor;

use encoding_rs::{Encoding, UTF_8};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use extractor::extract_cited_by;

pub const DEFAULT_BASE_URL: &str = "https://scholar.google.com";

/// Browser identity sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_RESPONSE_BYTES: usize = 10_000_000;

/// Characters to percent-encode in an id placed in a query value.
/// `:` is included because it separates the ids in `citation_for_view`.
const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`');

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,

    #[error("unparseable citation count: {0}")]
    InvalidCount(String),
}

/// Source of raw citation counts.
/// Implemented by `ScholarClient` for production; mock implementations used in tests.
pub trait CitationSource {
    /// `Ok(None)` when the page was fetched but carries no "Cited by" marker.
    async fn cited_by(&self, scholar_id: &str, article_id: &str)
    -> Result<Option<u64>, FetchError>;
}

#[derive(Clone)]
pub struct ScholarClient {
    http: Client,
    base_url: String,
}

impl ScholarClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self::new(http, &config.base_url))
    }

    /// Citation-detail view for one article of one scholar profile.
    pub fn citation_url(&self, scholar_id: &str, article_id: &str) -> String {
        let user = utf8_percent_encode(scholar_id, QUERY_ENCODE_SET);
        let article = utf8_percent_encode(article_id, QUERY_ENCODE_SET);
        format!(
            "{}/citations?view_op=view_citation&hl=en&user={user}&citation_for_view={user}:{article}",
            self.base_url
        )
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_BYTES
        {
            return Err(FetchError::TooLarge);
        }

        let encoding = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type)
            .unwrap_or(UTF_8);

        let mut body = Vec::new();
        let mut stream = response;
        while let Some(chunk) = stream.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_RESPONSE_BYTES {
                return Err(FetchError::TooLarge);
            }
        }
        let (html, _, _) = encoding.decode(&body);
        Ok(html.into_owned())
    }
}

impl CitationSource for ScholarClient {
    async fn cited_by(
        &self,
        scholar_id: &str,
        article_id: &str,
    ) -> Result<Option<u64>, FetchError> {
        let url = self.citation_url(scholar_id, article_id);
        info!(url = %url, "fetching citation page");

        let html = self.download(&url).await?;
        debug!(article_id, bytes = html.len(), "citation page fetched");

        let count = extract_cited_by(&html)?;
        if count.is_none() {
            info!(article_id, "Cited by data not found on page");
        }
        Ok(count)
    }
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| Encoding::for_label(label.trim().trim_matches('"').as_bytes()))
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ScholarClient {
        ScholarClient::new(Client::new(), &server.uri())
    }

    #[tokio::test]
    async fn cited_by_sends_browser_request_and_extracts_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("view_op", "view_citation"))
            .and(query_param("hl", "en"))
            .and(query_param("user", "ABC123"))
            .and(query_param("citation_for_view", "ABC123:99"))
            // wiremock splits header values on ',', so match the UA as its comma-separated parts.
            .and(headers(
                "User-Agent",
                BROWSER_USER_AGENT.split(',').map(str::trim).collect(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><div>... Cited by 3,400,000 times ...</div></body></html>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let count = client_for(&server).cited_by("ABC123", "99").await.unwrap();
        assert_eq!(count, Some(3_400_000));
    }

    #[tokio::test]
    async fn cited_by_without_marker_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><p>hello</p></body></html>"),
            )
            .mount(&server)
            .await;

        let count = client_for(&server).cited_by("s", "a").await.unwrap();
        assert_eq!(count, None);
    }

    #[tokio::test]
    async fn year_labels_after_count_are_not_scraped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><script>var label = "Cited by 5";</script><div><a>Cited by 1,234</a></div><div id="gsc_oci_graph_bars"><span>2019</span><span>2020</span></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let count = client_for(&server).cited_by("s", "a").await.unwrap();
        assert_eq!(count, Some(1234));
    }

    #[tokio::test]
    async fn forbidden_returns_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client_for(&server).cited_by("s", "a").await;
        assert!(matches!(result, Err(FetchError::Status(403))));
    }

    #[tokio::test]
    async fn not_found_returns_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).cited_by("s", "a").await;
        assert!(matches!(result, Err(FetchError::Status(404))));
    }

    #[tokio::test]
    async fn too_large_body_rejected() {
        let oversized = "x".repeat(MAX_RESPONSE_BYTES + 1);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(oversized))
            .mount(&server)
            .await;

        let result = client_for(&server).cited_by("s", "a").await;
        assert!(matches!(result, Err(FetchError::TooLarge)));
    }

    #[tokio::test]
    async fn body_decoded_with_declared_charset() {
        let mut body = b"<html><body><p>Caf".to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</p><p>Cited by 8</p></body></html>");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=iso-8859-1"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let html = client
            .download(&client.citation_url("s", "a"))
            .await
            .unwrap();
        assert!(html.contains("Café"));
        assert_eq!(client.cited_by("s", "a").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn connection_failure_is_http_error() {
        let client = ScholarClient::new(Client::new(), "http://127.0.0.1:1");
        let result = client.cited_by("s", "a").await;
        assert!(matches!(result, Err(FetchError::Http(_))));
    }
}
