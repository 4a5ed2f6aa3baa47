//! Domain-based rejection of citation URLs.
//!
//! A citation URL is rejected outright, regardless of reachability, when its
//! host belongs to a search/AI redirector, the company's own site, or a
//! competitor. Hostname comparison strips a leading `www.`, lowercases, and
//! is subdomain-inclusive: `example.com` matches `sub.example.com` but not
//! `notexample.com`.
//!
//! ```rust
//! use citemend_core::{filter::should_filter, CompanyProfile};
//!
//! let profile = CompanyProfile {
//!     company_url: "https://mycompany.com".to_string(),
//!     competitor_domains: vec!["rival.io".to_string()],
//!     language: "en".to_string(),
//! };
//!
//! assert!(should_filter("https://blog.rival.io/post", &profile));
//! assert!(should_filter("https://mycompany.com/about", &profile));
//! assert!(!should_filter("https://gartner.com/research", &profile));
//! ```

use crate::CompanyProfile;
use tracing::debug;
use url::Url;

/// Search and AI-infrastructure hosts that proxy or redirect to real content.
///
/// Links on these hosts are never useful as citations: they are opaque
/// redirectors whose targets should have been resolved during extraction.
pub(crate) const REDIRECTOR_HOSTS: &[&str] = &[
    "vertexaisearch.cloud.google.com",
    "grounding-api-redirect.googleapis.com",
    "webcache.googleusercontent.com",
    "translate.googleusercontent.com",
    "gemini.google.com",
];

/// Decide whether a citation URL must be rejected.
///
/// Returns `true` when the URL's host equals or is a subdomain of:
/// a fixed redirector block-list, the company's own domain, or any
/// competitor domain. Unparseable URLs are rejected too, so they enter the
/// repair path instead of reaching the rendered article.
#[must_use]
pub fn should_filter(url: &str, profile: &CompanyProfile) -> bool {
    let Some(host) = host_of(url) else {
        debug!(%url, "filtering citation with unparseable URL");
        return true;
    };

    for blocked in REDIRECTOR_HOSTS {
        if host_matches(&host, blocked) {
            debug!(%url, %blocked, "filtering redirector host");
            return true;
        }
    }

    if let Some(company_host) = host_of(&profile.company_url) {
        if host_matches(&host, &company_host) {
            debug!(%url, "filtering self-citation");
            return true;
        }
    }

    for competitor in &profile.competitor_domains {
        let normalized = normalize_host(competitor);
        if !normalized.is_empty() && host_matches(&host, &normalized) {
            debug!(%url, %competitor, "filtering competitor domain");
            return true;
        }
    }

    false
}

/// Extract the normalized host of a URL, tolerating a missing scheme.
pub(crate) fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{}", url.trim())))
        .ok()?;
    parsed.host_str().map(normalize_host)
}

/// Lowercase and strip a single leading `www.`.
pub(crate) fn normalize_host(host: &str) -> String {
    let lower = host.trim().trim_end_matches('.').to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

/// Subdomain-inclusive host comparison over normalized hosts.
pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}
