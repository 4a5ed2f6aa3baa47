//! HTTP reachability checks for citation URLs.
//!
//! A check is a classification, never an error: timeouts, DNS failures, TLS
//! failures and non-2xx statuses all come back as "unreachable" so the
//! caller can route the citation into repair. HEAD is tried first; servers
//! that reject HEAD (405/501) or leave redirect resolution ambiguous fall
//! back to a GET with redirects followed.
//!
//! Many sites answer soft-404s with HTTP 200, so a final URL whose path
//! looks like an error page is treated as unreachable regardless of status.

use crate::{Error, Result, ValidationConfig};
use reqwest::{Client, StatusCode, redirect};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Maximum redirect hops followed during a reachability check.
const MAX_REDIRECTS: usize = 5;

/// Path fragments that mark a page as an error page even on HTTP 200.
const ERROR_PAGE_PATTERNS: &[&str] = &[
    "/404",
    "/not-found",
    "/notfound",
    "/page-not-found",
    "/error",
    "/errors/",
];

/// Outcome of a reachability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCheck {
    /// Whether the URL answered with a usable page.
    pub reachable: bool,
    /// The redirect-resolved URL when reachable; the original URL otherwise.
    pub final_url: String,
}

impl UrlCheck {
    fn unreachable(url: &str) -> Self {
        Self {
            reachable: false,
            final_url: url.to_string(),
        }
    }
}

/// HTTP client wrapper performing bounded reachability checks.
pub struct UrlValidator {
    client: Client,
    no_redirect: Client,
}

impl UrlValidator {
    /// Build a validator from the validation config.
    ///
    /// This is the one constructor whose failure aborts the whole validation
    /// stage: if the TLS-backed client cannot be built there is nothing
    /// useful the pass can do.
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        Self::with_timeout(config.http_timeout(), &config.user_agent)
    }

    /// Build a validator with an explicit timeout (primarily for tests).
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(Error::Network)?;

        let no_redirect = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            no_redirect,
        })
    }

    /// Check whether a URL answers with a usable page.
    ///
    /// HEAD with redirects followed; 405/501 and redirect ambiguity fall
    /// back to GET. On any failure the original URL is returned unchanged
    /// with `reachable = false`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn check(&self, url: &str) -> UrlCheck {
        let Ok(parsed) = Url::parse(url) else {
            debug!("unparseable URL");
            return UrlCheck::unreachable(url);
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            debug!(scheme = %parsed.scheme(), "unsupported scheme");
            return UrlCheck::unreachable(url);
        }
        if looks_like_error_page(&parsed) {
            debug!("URL path matches an error-page pattern");
            return UrlCheck::unreachable(url);
        }

        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().clone();

                if status.is_success() {
                    return classify_final(url, final_url);
                }

                if status == StatusCode::METHOD_NOT_ALLOWED
                    || status == StatusCode::NOT_IMPLEMENTED
                    || status.is_redirection()
                {
                    debug!(%status, "HEAD inconclusive; falling back to GET");
                    return self.check_with_get(url).await;
                }

                debug!(%status, "HEAD rejected URL");
                UrlCheck::unreachable(url)
            },
            Err(err) if err.is_redirect() => {
                // Redirect loop or hop limit under HEAD; GET sometimes
                // resolves where HEAD does not.
                debug!(error = %err, "HEAD redirect ambiguity; falling back to GET");
                self.check_with_get(url).await
            },
            Err(err) => {
                debug!(error = %err, "HEAD request failed");
                UrlCheck::unreachable(url)
            },
        }
    }

    /// GET fallback with redirects followed.
    async fn check_with_get(&self, url: &str) -> UrlCheck {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().clone();

                if status.is_success() {
                    classify_final(url, final_url)
                } else {
                    debug!(%status, "GET rejected URL");
                    UrlCheck::unreachable(url)
                }
            },
            Err(err) => {
                debug!(error = %err, "GET request failed");
                UrlCheck::unreachable(url)
            },
        }
    }

    /// Follow a redirector URL one hop, returning the absolute target.
    ///
    /// Used during extraction to unwrap search-provider proxy links. Reads
    /// the `Location` header of a single 3xx response without chasing the
    /// chain; anything else resolves to `None`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn resolve_redirect(&self, url: &str) -> Option<String> {
        let response = match self.no_redirect.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "redirector request failed");
                return None;
            },
        };

        if !response.status().is_redirection() {
            debug!(status = %response.status(), "redirector did not redirect");
            return None;
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())?;

        let resolved = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            // Relative Location; resolve against the redirector URL
            let base = Url::parse(url).ok()?;
            base.join(location).ok()?.to_string()
        };

        debug!(target = %resolved, "resolved redirector");
        Some(resolved)
    }
}

/// Apply the soft-404 guard to a redirect-resolved URL.
fn classify_final(original: &str, final_url: Url) -> UrlCheck {
    if looks_like_error_page(&final_url) {
        warn!(%final_url, "2xx response resolved to an error page");
        return UrlCheck::unreachable(original);
    }
    UrlCheck {
        reachable: true,
        final_url: final_url.to_string(),
    }
}

/// Check a URL path against the error-page patterns.
///
/// Matches whole path segments so `/error` hits but `/error-handling` does
/// not; patterns with a trailing slash use prefix semantics.
fn looks_like_error_page(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let path = path.trim_end_matches('/');

    for pattern in ERROR_PAGE_PATTERNS {
        if let Some(prefix) = pattern.strip_suffix('/') {
            if path.starts_with(pattern) || path == prefix {
                return true;
            }
            continue;
        }
        if let Some(pos) = path.find(pattern) {
            let rest = &path[pos + pattern.len()..];
            if rest.is_empty() || rest.starts_with('/') {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::match_wildcard_for_single_variants
)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_validator() -> UrlValidator {
        UrlValidator::with_timeout(Duration::from_millis(500), "citemend-test/0.0").unwrap()
    }

    #[tokio::test]
    async fn test_head_200_is_reachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/article", mock_server.uri());
        let check = test_validator().check(&url).await;

        assert!(check.reachable);
        assert_eq!(check.final_url, url);
    }

    #[tokio::test]
    async fn test_head_404_is_unreachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/gone", mock_server.uri());
        let check = test_validator().check(&url).await;

        assert!(!check.reachable);
        assert_eq!(check.final_url, url, "original URL kept on failure");
    }

    #[tokio::test]
    async fn test_head_500_is_unreachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let url = format!("{}/broken", mock_server.uri());
        assert!(!test_validator().check(&url).await.reachable);
    }

    #[tokio::test]
    async fn test_head_405_falls_back_to_get() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(200).set_body_string("page"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/no-head", mock_server.uri());
        let check = test_validator().check(&url).await;

        assert!(check.reachable);
    }

    #[tokio::test]
    async fn test_get_fallback_failure_is_unreachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/no-head"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let url = format!("{}/no-head", mock_server.uri());
        assert!(!test_validator().check(&url).await.reachable);
    }

    #[tokio::test]
    async fn test_redirect_followed_to_final_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&mock_server)
            .await;

        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/old", mock_server.uri());
        let check = test_validator().check(&url).await;

        assert!(check.reachable);
        assert!(check.final_url.ends_with("/new"));
    }

    #[tokio::test]
    async fn test_redirect_to_soft_404_is_unreachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/404"))
            .mount(&mock_server)
            .await;

        Mock::given(method("HEAD"))
            .and(path("/404"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/moved", mock_server.uri());
        let check = test_validator().check(&url).await;

        assert!(!check.reachable, "200 at /404 must count as unreachable");
        assert_eq!(check.final_url, url);
    }

    #[tokio::test]
    async fn test_error_page_path_short_circuits() {
        // No mock mounted: the pattern check rejects before any request
        let check = test_validator()
            .check("https://example.com/not-found")
            .await;
        assert!(!check.reachable);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let url = format!("{}/slow", mock_server.uri());
        let start = std::time::Instant::now();
        let check = test_validator().check(&url).await;

        assert!(!check.reachable);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Unroutable port on loopback
        let check = test_validator().check("http://127.0.0.1:1/x").await;
        assert!(!check.reachable);
    }

    #[tokio::test]
    async fn test_unparseable_and_non_http_urls() {
        let validator = test_validator();
        assert!(!validator.check("not a url").await.reachable);
        assert!(!validator.check("ftp://example.com/file").await.reachable);
    }

    #[tokio::test]
    async fn test_resolve_redirect_absolute_location() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/redirect/abc"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "https://real-source.com/article"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/redirect/abc", mock_server.uri());
        let resolved = test_validator().resolve_redirect(&url).await;

        assert_eq!(resolved.as_deref(), Some("https://real-source.com/article"));
    }

    #[tokio::test]
    async fn test_resolve_redirect_relative_location() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/redirect/rel"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landed"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/redirect/rel", mock_server.uri());
        let resolved = test_validator().resolve_redirect(&url).await.unwrap();

        assert_eq!(resolved, format!("{}/landed", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_resolve_redirect_non_redirect_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/plain", mock_server.uri());
        assert!(test_validator().resolve_redirect(&url).await.is_none());
    }

    #[test]
    fn test_error_page_patterns() {
        let check = |u: &str| looks_like_error_page(&Url::parse(u).unwrap());

        assert!(check("https://example.com/404"));
        assert!(check("https://example.com/404/"));
        assert!(check("https://example.com/not-found"));
        assert!(check("https://example.com/page-not-found"));
        assert!(check("https://example.com/error"));
        assert!(check("https://example.com/errors/500"));
        assert!(check("https://example.com/en/404"));

        assert!(!check("https://example.com/article"));
        assert!(!check("https://example.com/error-handling-guide"));
        assert!(!check("https://example.com/4040-ways-to-win"));
    }

    #[test]
    fn test_validator_construction() {
        let config = ValidationConfig::default();
        assert!(UrlValidator::new(&config).is_ok());
    }
}
