//! AI-assisted alternative URL search for citations that failed validation.
//!
//! The generative backend sits behind the narrow [`SearchProvider`] trait so
//! it can be swapped for a different search/ranking service, or for a canned
//! fake in tests, without touching the repair state machine. The shipped
//! implementation, [`GeminiSearchProvider`], calls the Generative Language
//! API with the `google_search` tool and harvests candidate URLs from the
//! response's grounding chunks.
//!
//! [`AlternativeUrlFinder`] drives the provider under a bounded attempt
//! budget: each candidate is domain-filtered, then reachability-checked, and
//! the first acceptable one wins. Budget exhaustion returns `None`, never an
//! error, so the caller can fall back to the company URL.

use crate::filter::should_filter;
use crate::validator::UrlValidator;
use crate::{CompanyProfile, Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Maximum length of a search query built from a citation title.
const MAX_QUERY_CHARS: usize = 100;

/// One candidate produced by a search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    /// Human-readable title when the backend supplies one.
    pub title: Option<String>,
}

/// Ordered candidates for one search call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

/// Narrow seam over the generative search backend.
///
/// Implementations are explicitly constructed and injected; there is no
/// process-global client.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one web search and return candidate URLs in ranking order.
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

// --- Gemini-backed provider -------------------------------------------------

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// [`SearchProvider`] backed by the Generative Language API's grounded
/// search tool.
pub struct GeminiSearchProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiSearchProvider {
    /// Build a provider talking to the public API endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, GEMINI_ENDPOINT)
    }

    /// Build a provider against a custom endpoint (primarily for tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("citemend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: GEMINI_MODEL.to_string(),
        })
    }

    /// Override the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    tools: Vec<RequestTool>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
struct RequestTool {
    google_search: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

static TEXT_URL_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("static regex")
});

#[async_trait]
impl SearchProvider for GeminiSearchProvider {
    #[instrument(skip_all)]
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let endpoint = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: format!(
                        "Find authoritative public web pages covering: {query}. \
                         Prefer primary sources and research publishers."
                    ),
                }],
            }],
            tools: vec![RequestTool {
                google_search: serde_json::json!({}),
            }],
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "search API returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("malformed search response: {e}")))?;

        Ok(extract_hits(&parsed))
    }
}

/// Collect candidate URLs from a generate response.
///
/// Grounding chunks come first (they carry titles and are ranked by the
/// backend); bare URLs mentioned in the answer text follow. Duplicates are
/// dropped keeping the first occurrence.
fn extract_hits(response: &GenerateResponse) -> SearchResponse {
    let mut hits: Vec<SearchHit> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for candidate in &response.candidates {
        if let Some(metadata) = &candidate.grounding_metadata {
            for chunk in &metadata.grounding_chunks {
                let Some(web) = &chunk.web else { continue };
                let Some(uri) = &web.uri else { continue };
                if seen.insert(uri.clone()) {
                    hits.push(SearchHit {
                        url: uri.clone(),
                        title: web.title.clone().filter(|t| !t.trim().is_empty()),
                    });
                }
            }
        }

        if let Some(content) = &candidate.content {
            for part in &content.parts {
                for found in TEXT_URL_RE.find_iter(&part.text) {
                    let url = found.as_str().trim_end_matches(['.', ',']).to_string();
                    if seen.insert(url.clone()) {
                        hits.push(SearchHit { url, title: None });
                    }
                }
            }
        }
    }

    SearchResponse { hits }
}

// --- Finder -----------------------------------------------------------------

/// A validated replacement for a rejected citation URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternativeUrl {
    pub url: String,
    pub title: String,
}

static LEADING_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\s*\[\d+\]\s*[:.]?\s*").expect("static regex")
});

/// Bounded, validated alternative-URL search.
pub struct AlternativeUrlFinder {
    provider: std::sync::Arc<dyn SearchProvider>,
}

impl AlternativeUrlFinder {
    pub fn new(provider: std::sync::Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Find the first reachable, non-filtered candidate for a citation.
    ///
    /// Makes at most `max_attempts` provider calls. Provider errors are
    /// absorbed and count against the budget; exhaustion returns `None`.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn find(
        &self,
        title: &str,
        profile: &CompanyProfile,
        validator: &UrlValidator,
        max_attempts: usize,
    ) -> Option<AlternativeUrl> {
        let query = build_query(title, &profile.language);
        if query.is_empty() {
            debug!("empty query after stripping citation marker");
            return None;
        }

        for attempt in 1..=max_attempts {
            let response = match self.provider.search(&query).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(attempt, error = %err, "alternative search attempt failed");
                    continue;
                },
            };

            debug!(attempt, candidates = response.hits.len(), "search returned");

            for hit in response.hits {
                if should_filter(&hit.url, profile) {
                    debug!(url = %hit.url, "candidate rejected by domain filter");
                    continue;
                }

                let check = validator.check(&hit.url).await;
                if check.reachable {
                    return Some(AlternativeUrl {
                        url: check.final_url,
                        title: hit.title.unwrap_or_else(|| title.to_string()),
                    });
                }
                debug!(url = %hit.url, "candidate unreachable");
            }
        }

        debug!(max_attempts, "alternative search budget exhausted");
        None
    }
}

/// Build a short search query from a citation title.
///
/// Strips a leading `[n]` marker and truncates on a char boundary. A
/// non-English article language is appended as a search hint so results
/// match the language the article cites in.
fn build_query(title: &str, language: &str) -> String {
    let stripped = LEADING_MARKER_RE.replace(title, "");
    let trimmed = stripped.trim();

    let mut query = if trimmed.chars().count() <= MAX_QUERY_CHARS {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(MAX_QUERY_CHARS).collect();
        truncated.trim_end().to_string()
    };

    let language = language.trim();
    if !query.is_empty()
        && !language.is_empty()
        && !language.eq_ignore_ascii_case("en")
        && !language.eq_ignore_ascii_case("english")
    {
        query.push(' ');
        query.push_str(language);
    }
    query
}
