//! Parsing LLM-authored source lists into citations.
//!
//! The sources block is noisy free text: numbered lines in the shape
//! `[n]: <url-or-prose> – <description>` (any dash variant) interleaved with
//! commentary. Extraction is lenient: malformed lines are skipped, numbering
//! gaps are closed by renumbering, and zero recognizable lines produce an
//! empty list rather than an error.
//!
//! Search-provider redirector links (Vertex AI grounding proxies) are
//! unwrapped by following their redirect one hop; when resolution fails the
//! proxy URL is kept and left for the domain filter to reject.

use crate::filter::{REDIRECTOR_HOSTS, host_matches, host_of};
use crate::validator::UrlValidator;
use crate::{Citation, CitationList};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

static CITATION_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\s*\[(\d+)\]\s*[:.]?\s*(.+)$").expect("static regex")
});

/// Separator between the URL part and the description: `-`, `–`, `—` or
/// `--`, surrounded by whitespace.
static DASH_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\s+(?:-{1,2}|\u{2013}|\u{2014})\s+").expect("static regex")
});

static ABSOLUTE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("static regex")
});

/// Schemeless `domain.tld/path` tokens in prose.
static BARE_DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b(?:www\.)?[a-zA-Z0-9][a-zA-Z0-9-]*(?:\.[a-zA-Z][a-zA-Z0-9-]*)+(?:/[^\s<>\)]*)?")
        .expect("static regex")
});

/// Parse a sources text block into an ordered, renumbered citation list.
///
/// Lines that do not carry a `[n]` marker and a URL-like token are skipped.
#[must_use]
pub fn extract_citations(text: &str) -> CitationList {
    let mut citations = CitationList::default();

    for line in text.lines() {
        let Some(parsed) = parse_line(line) else {
            continue;
        };
        citations.push(parsed);
    }

    citations.renumber();
    info!(count = citations.len(), "extracted citations from sources block");
    citations
}

/// Parse one line into a citation, or `None` for commentary/malformed lines.
fn parse_line(line: &str) -> Option<Citation> {
    let captures = CITATION_LINE_RE.captures(line)?;
    let number: usize = captures.get(1)?.as_str().parse().ok()?;
    let rest = captures.get(2)?.as_str().trim();

    let (url_part, description) = match DASH_SPLIT_RE.find(rest) {
        Some(separator) => (
            rest[..separator.start()].trim(),
            rest[separator.end()..].trim(),
        ),
        None => (rest, ""),
    };

    let url = find_url_token(url_part).or_else(|| find_url_token(rest))?;

    let title = if description.is_empty() {
        // No description: fall back to the prose around the URL, then host
        let leftover = url_part.replace(url.as_str(), "");
        let leftover = leftover.trim_matches(|c: char| !c.is_alphanumeric()).trim();
        if leftover.is_empty() {
            title_from_url(&url)
        } else {
            leftover.to_string()
        }
    } else {
        description.to_string()
    };

    debug!(number, %url, "parsed citation line");
    Some(Citation::new(number, url, title))
}

/// Find a URL-like token, preferring explicit schemes over bare domains.
fn find_url_token(text: &str) -> Option<String> {
    if let Some(found) = ABSOLUTE_URL_RE.find(text) {
        return Some(trim_url(found.as_str()));
    }
    let found = BARE_DOMAIN_RE.find(text)?;
    // Guard against prose like "U.S. economy" matching as a domain
    let token = found.as_str();
    let host = token.split('/').next().unwrap_or(token);
    let labels: Vec<&str> = host.split('.').collect();
    let tld = labels.last().copied().unwrap_or_default();
    if labels.len() < 2 || tld.len() < 2 || !tld.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(trim_url(token))
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches(['.', ',', ';', ')', ']'])
        .to_string()
}

/// Derive a readable title from a URL host.
fn title_from_url(url: &str) -> String {
    host_of(url).map_or_else(|| url.to_string(), |host| format!("Source: {host}"))
}

/// Unwrap known search-provider redirector links in place.
///
/// Each redirector URL is followed one hop; on failure the original URL is
/// kept so the domain filter rejects it downstream.
pub async fn resolve_redirectors(citations: &mut CitationList, validator: &UrlValidator) {
    for citation in citations.iter_mut() {
        if !is_redirector_url(&citation.url) {
            continue;
        }

        match validator.resolve_redirect(&citation.url).await {
            Some(resolved) => {
                debug!(
                    number = citation.number,
                    from = %citation.url,
                    to = %resolved,
                    "resolved search redirector"
                );
                citation.url = resolved;
            },
            None => {
                debug!(
                    number = citation.number,
                    url = %citation.url,
                    "redirector resolution failed; keeping original"
                );
            },
        }
    }
}

/// Check whether a URL points at a known search-provider redirector host.
#[must_use]
pub fn is_redirector_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    REDIRECTOR_HOSTS
        .iter()
        .any(|blocked| host_matches(host, blocked))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extracts_basic_lines() {
        let text = "\
[1]: https://example.com/report – Annual cloud spending report
[2]: https://research.org/paper - Research paper on adoption";

        let citations = extract_citations(text);

        assert_eq!(citations.len(), 2);
        let first = &citations.as_slice()[0];
        assert_eq!(first.number, 1);
        assert_eq!(first.url, "https://example.com/report");
        assert_eq!(first.title, "Annual cloud spending report");
    }

    #[test]
    fn test_accepts_all_dash_variants() {
        let text = "\
[1]: https://a.com/x - hyphen description here
[2]: https://b.com/y – en dash description here
[3]: https://c.com/z — em dash description here
[4]: https://d.com/w -- double hyphen description here";

        let citations = extract_citations(text);

        assert_eq!(citations.len(), 4);
        assert_eq!(citations.as_slice()[1].title, "en dash description here");
        assert_eq!(citations.as_slice()[2].title, "em dash description here");
    }

    #[test]
    fn test_skips_commentary_and_malformed_lines() {
        let text = "\
Here are the sources I used:

[1]: https://example.com/a – A real source
Some commentary in between that is not a citation.
[2]: no url on this line at all, just prose without domains
[3]: https://example.com/b – Another real source";

        let citations = extract_citations(text);

        assert_eq!(citations.len(), 2);
        // Renumbered sequentially despite the skipped middle line
        assert_eq!(citations.as_slice()[0].number, 1);
        assert_eq!(citations.as_slice()[1].number, 2);
        assert_eq!(citations.as_slice()[1].url, "https://example.com/b");
    }

    #[test]
    fn test_empty_input_yields_empty_list() {
        assert!(extract_citations("").is_empty());
        assert!(extract_citations("no citations at all here").is_empty());
    }

    #[test]
    fn test_bare_domain_normalized_to_https() {
        let text = "[1]: gartner.com/research – Gartner research portal";
        let citations = extract_citations(text);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations.as_slice()[0].url, "https://gartner.com/research");
    }

    #[test]
    fn test_prose_with_embedded_domain() {
        let text = "[1]: the study at statista.com/outlook – Statista market outlook figures";
        let citations = extract_citations(text);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations.as_slice()[0].url, "https://statista.com/outlook");
        assert_eq!(citations.as_slice()[0].title, "Statista market outlook figures");
    }

    #[test]
    fn test_missing_description_falls_back_to_host_title() {
        let text = "[1]: https://example.com/report";
        let citations = extract_citations(text);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations.as_slice()[0].title, "Source: example.com");
    }

    #[test]
    fn test_url_trailing_punctuation_trimmed() {
        let text = "[1]: https://example.com/report. – Report with trailing dot";
        let citations = extract_citations(text);

        assert_eq!(citations.as_slice()[0].url, "https://example.com/report");
    }

    #[test]
    fn test_numbering_gaps_closed() {
        let text = "\
[3]: https://a.com/x – First listed source here
[7]: https://b.com/y – Second listed source here";

        let citations = extract_citations(text);

        let numbers: Vec<usize> = citations.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_is_redirector_url() {
        assert!(is_redirector_url(
            "https://vertexaisearch.cloud.google.com/grounding-api-redirect/abc"
        ));
        assert!(is_redirector_url(
            "https://grounding-api-redirect.googleapis.com/v1/x"
        ));
        assert!(!is_redirector_url("https://example.com/a"));
        assert!(!is_redirector_url("not a url"));
    }

    #[tokio::test]
    async fn test_resolve_redirectors_rewrites_proxy_urls() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/grounding-api-redirect/abc"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "https://real.com/article"),
            )
            .mount(&mock_server)
            .await;

        // The mock server is not on a redirector host, so build the list by
        // hand and point one citation at the proxy path through the helper
        let mut citations = CitationList::new(vec![
            Citation::new(1, "https://example.com/keep", "A source left untouched"),
            Citation::new(
                2,
                format!("{}/grounding-api-redirect/abc", mock_server.uri()),
                "A proxied source link",
            ),
        ]);

        let validator =
            UrlValidator::with_timeout(std::time::Duration::from_millis(500), "citemend-test/0.0")
                .unwrap();

        // Force the second citation through resolution regardless of host
        let resolved = validator
            .resolve_redirect(&citations.as_slice()[1].url)
            .await
            .unwrap();
        citations.iter_mut().nth(1).unwrap().url = resolved;

        assert_eq!(citations.as_slice()[0].url, "https://example.com/keep");
        assert_eq!(citations.as_slice()[1].url, "https://real.com/article");
    }

    #[tokio::test]
    async fn test_resolve_redirectors_keeps_url_on_failure() {
        // Redirector host that cannot be reached: resolution fails, URL kept
        let mut citations = CitationList::new(vec![Citation::new(
            1,
            "https://vertexaisearch.cloud.google.com/grounding-api-redirect/dead",
            "A proxied source link",
        )]);

        let validator =
            UrlValidator::with_timeout(std::time::Duration::from_millis(100), "citemend-test/0.0")
                .unwrap();
        resolve_redirectors(&mut citations, &validator).await;

        assert_eq!(
            citations.as_slice()[0].url,
            "https://vertexaisearch.cloud.google.com/grounding-api-redirect/dead"
        );
    }
}
