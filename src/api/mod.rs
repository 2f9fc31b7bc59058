//! HTTP client for the Context7 documentation API.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::library::LibraryId;

const SOURCE_HEADER: &str = "x-context7-source";
const SOURCE_VALUE: &str = "mcp-server";
const CLIENT_IP_HEADER: &str = "mcp-client-ip";
/// Response type requested when fetching documentation
const DOCUMENT_TYPE: &str = "txt";
/// Bodies the API returns instead of an error status when it has nothing
const EMPTY_BODIES: [&str; 2] = ["No content available", "No context data available"];
const NOT_AVAILABLE: &str = "N/A";
pub const NO_RESULTS_MESSAGE: &str = "No documentation libraries found matching your query.";

/// Errors returned by [`Context7Client`]
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered 429.
    #[error("Rate limited. Please try again later.")]
    RateLimited,

    /// The API answered with another non-success status.
    #[error("HTTP error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The API has no documentation for the library.
    #[error("No content available for this library.")]
    NoContent,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// One library returned by a search
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_snippets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchResult {
    title: Option<String>,
    id: Option<String>,
    description: Option<String>,
    total_snippets: Option<i64>,
    trust_score: Option<f64>,
    versions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    results: Option<Vec<RawSearchResult>>,
}

impl From<RawSearchResult> for SearchResult {
    fn from(raw: RawSearchResult) -> Self {
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            title: or_na(raw.title),
            id: or_na(raw.id),
            description: or_na(raw.description),
            // -1 is the API's marker for unknown
            total_snippets: raw.total_snippets.filter(|n| *n != -1),
            trust_score: raw.trust_score.filter(|s| *s != -1.0),
            versions: raw.versions.unwrap_or_default(),
        }
    }
}

/// Optional filters for a documentation fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub topic: Option<String>,
    pub tokens: Option<u32>,
}

/// Client for the remote documentation service
#[derive(Debug, Clone)]
pub struct Context7Client {
    http: reqwest::Client,
    base_url: String,
}

impl Context7Client {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        let http = config.proxy.apply(builder)?.build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search libraries matching a free-text query
    pub async fn search(
        &self,
        query: &str,
        client_ip: Option<&str>,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!("{}/v1/search", self.base_url);
        tracing::info!(query, "Searching libraries");

        let response = self
            .http
            .get(&url)
            .query(&[("query", query)])
            .headers(request_headers(client_ip))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let parsed: RawSearchResponse = serde_json::from_str(&body)?;
        let results: Vec<SearchResult> = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(SearchResult::from)
            .collect();

        tracing::info!(query, count = results.len(), "Search finished");
        Ok(results)
    }

    /// Fetch the documentation text of a library
    pub async fn fetch_documentation(
        &self,
        id: &LibraryId,
        options: &FetchOptions,
        client_ip: Option<&str>,
    ) -> Result<String, ApiError> {
        let url = format!("{}/v1/{}", self.base_url, id.as_str());

        let mut params = vec![("type", DOCUMENT_TYPE.to_string())];
        if let Some(tokens) = options.tokens.filter(|t| *t > 0) {
            params.push(("tokens", tokens.to_string()));
        }
        if let Some(topic) = options.topic.as_deref().filter(|t| !t.is_empty()) {
            params.push(("topic", topic.to_string()));
        }

        tracing::info!(library_id = %id, topic = ?options.topic, tokens = ?options.tokens, "Fetching documentation");
        let response = self
            .http
            .get(&url)
            .query(&params)
            .headers(request_headers(client_ip))
            .send()
            .await?;
        let text = check_status(response).await?.text().await?;

        if text.trim().is_empty() || EMPTY_BODIES.contains(&text.trim()) {
            return Err(ApiError::NoContent);
        }
        Ok(text)
    }
}

/// Headers sent with every API request.
///
/// The client IP is forwarded as given; an unusable value is dropped.
pub fn request_headers(client_ip: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(SOURCE_HEADER),
        HeaderValue::from_static(SOURCE_VALUE),
    );
    if let Some(ip) = client_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
        match HeaderValue::from_str(ip) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(CLIENT_IP_HEADER), value);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid client IP header value"),
        }
    }
    headers
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimited);
    }
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
        "" => status.canonical_reason().unwrap_or("unknown error").to_string(),
        text => text.to_string(),
    };
    tracing::warn!(status = status.as_u16(), %message, "API returned an error");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Render search results as readable text blocks
pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }

    results
        .iter()
        .map(|result| {
            let mut lines = vec![
                format!("- Title: {}", result.title),
                format!("- Context7-compatible library ID: {}", result.id),
                format!("- Description: {}", result.description),
            ];
            if let Some(snippets) = result.total_snippets {
                lines.push(format!("- Code Snippets: {snippets}"));
            }
            if let Some(score) = result.trust_score {
                lines.push(format!("- Trust Score: {score}"));
            }
            if !result.versions.is_empty() {
                lines.push(format!("- Versions: {}", result.versions.join(", ")));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n----------\n")
}
