//! The per-citation validation state machine and its concurrency glue.
//!
//! Every citation independently moves through
//! `extracted → (enhanced) → checked → {valid | needs repair} →
//! (searching → {repaired | exhausted}) → finalized`. All citations run
//! concurrently as one future per slot; `join_all` is the single barrier,
//! after which a sequential pass renumbers 1..N in original order. Dropping
//! the returned future cancels all in-flight checks, so a cancelled job
//! yields no partial output.
//!
//! Failures inside one citation's pipeline are absorbed into that slot: an
//! unreachable or filtered URL triggers the alternative search, and an
//! exhausted search budget falls back to the company URL. The count of
//! slots never changes.

use crate::extract::{extract_citations, resolve_redirectors};
use crate::filter::{host_of, should_filter};
use crate::grounding::GroundingUrlEnhancer;
use crate::search::{AlternativeUrlFinder, SearchProvider};
use crate::validator::UrlValidator;
use crate::{
    Citation, CitationCheck, CitationList, CompanyProfile, GroundingUrl, Result,
    ValidationConfig, ValidationOutcome, ValidationReport,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Orchestrates extraction, enhancement, validation and repair for one
/// article's citations.
pub struct CitationPipeline {
    config: ValidationConfig,
    profile: CompanyProfile,
    validator: UrlValidator,
    finder: AlternativeUrlFinder,
}

impl CitationPipeline {
    /// Build the pipeline with an injected search provider.
    ///
    /// Client construction is the only fatal failure of the subsystem;
    /// everything downstream degrades per slot.
    pub fn new(
        config: ValidationConfig,
        profile: CompanyProfile,
        provider: Arc<dyn SearchProvider>,
    ) -> Result<Self> {
        let validator = UrlValidator::new(&config)?;
        Ok(Self {
            config,
            profile,
            validator,
            finder: AlternativeUrlFinder::new(provider),
        })
    }

    /// Extract citations from a sources text block and validate them.
    #[instrument(skip_all)]
    pub async fn run(&self, sources_text: &str, grounding: &[GroundingUrl]) -> ValidationReport {
        let citations = extract_citations(sources_text);
        self.validate(citations, grounding).await
    }

    /// Validate an already-extracted citation list.
    ///
    /// Count-preserving: the report holds exactly one check per input slot,
    /// in input order, renumbered 1..N.
    #[instrument(skip_all, fields(citations = citations.len()))]
    pub async fn validate(
        &self,
        mut citations: CitationList,
        grounding: &[GroundingUrl],
    ) -> ValidationReport {
        if citations.is_empty() {
            debug!("no citations to validate");
            return ValidationReport::default();
        }

        if !self.config.enabled {
            info!("citation validation disabled; passing citations through");
            citations.renumber();
            let checks = citations
                .iter()
                .cloned()
                .map(|citation| CitationCheck {
                    citation,
                    outcome: ValidationOutcome::OriginalUrl,
                    issues: Vec::new(),
                })
                .collect();
            return ValidationReport { citations, checks };
        }

        resolve_redirectors(&mut citations, &self.validator).await;

        let enhancer = GroundingUrlEnhancer::new(grounding);
        enhancer.enhance(&mut citations);

        // Fan out one future per slot; join_all preserves input order
        let mut checks: Vec<CitationCheck> = join_all(
            citations
                .iter()
                .map(|citation| self.process_citation(citation.clone())),
        )
        .await;

        // Single sequential renumbering pass after the barrier
        for (idx, check) in checks.iter_mut().enumerate() {
            check.citation.number = idx + 1;
        }
        let finalized: CitationList = checks.iter().map(|c| c.citation.clone()).collect();

        let report = ValidationReport {
            citations: finalized,
            checks,
        };
        info!(
            total = report.checks.len(),
            original = report.count_with(ValidationOutcome::OriginalUrl),
            alternative = report.count_with(ValidationOutcome::AlternativeFound),
            fallback = report.count_with(ValidationOutcome::Fallback),
            "citation validation complete"
        );
        report
    }

    /// Run one citation through the state machine.
    async fn process_citation(&self, citation: Citation) -> CitationCheck {
        let mut issues: Vec<String> = Vec::new();

        if should_filter(&citation.url, &self.profile) {
            issues.push(format!("domain rejected: {}", citation.url));
        } else {
            let check = self.validator.check(&citation.url).await;
            if check.reachable {
                // Redirects may land on a filtered domain; re-check the
                // resolved URL before accepting it
                if should_filter(&check.final_url, &self.profile) {
                    issues.push(format!("redirected to rejected domain: {}", check.final_url));
                } else {
                    return CitationCheck {
                        citation: Citation {
                            url: check.final_url,
                            ..citation
                        },
                        outcome: ValidationOutcome::OriginalUrl,
                        issues,
                    };
                }
            } else {
                issues.push(format!("unreachable: {}", citation.url));
            }
        }

        debug!(number = citation.number, url = %citation.url, "citation needs repair");

        if let Some(alternative) = self
            .finder
            .find(
                &citation.title,
                &self.profile,
                &self.validator,
                self.config.max_attempts,
            )
            .await
        {
            return CitationCheck {
                citation: Citation::new(citation.number, alternative.url, alternative.title),
                outcome: ValidationOutcome::AlternativeFound,
                issues,
            };
        }

        let (url, title) = fallback_citation(&self.profile);
        CitationCheck {
            citation: Citation::new(citation.number, url, title),
            outcome: ValidationOutcome::Fallback,
            issues,
        }
    }

    /// Render a finalized citation list as the article's sources fragment.
    #[must_use]
    pub fn render_html(&self, citations: &CitationList) -> String {
        crate::format::render_citations(citations)
    }
}

/// Last-resort citation pointing at the company's own site.
///
/// Always succeeds, keeping every slot filled when search comes up empty.
#[must_use]
pub fn fallback_citation(profile: &CompanyProfile) -> (String, String) {
    let url = profile.company_url.trim().to_string();
    let name = host_of(&url)
        .and_then(|host| host.split('.').next().map(capitalize))
        .unwrap_or_else(|| "Company".to_string());

    (url, format!("{name} official website"))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::search::{SearchHit, SearchResponse};
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticProvider {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchProvider for StaticProvider {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            Ok(SearchResponse {
                hits: self.hits.clone(),
            })
        }
    }

    struct EmptyProvider;

    #[async_trait]
    impl SearchProvider for EmptyProvider {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            Ok(SearchResponse::default())
        }
    }

    fn profile() -> CompanyProfile {
        CompanyProfile {
            company_url: "https://mycompany.com".to_string(),
            competitor_domains: vec!["rival.io".to_string()],
            language: "en".to_string(),
        }
    }

    fn fast_config() -> ValidationConfig {
        ValidationConfig {
            timeout_secs: 1,
            ..ValidationConfig::default()
        }
    }

    fn pipeline(provider: Arc<dyn SearchProvider>) -> CitationPipeline {
        CitationPipeline::new(fast_config(), profile(), provider).unwrap()
    }

    #[tokio::test]
    async fn test_reachable_citations_keep_original_urls() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let text = format!(
            "[1]: {0}/a – First reachable source here\n[2]: {0}/b – Second reachable source here",
            mock_server.uri()
        );
        let report = pipeline(Arc::new(EmptyProvider)).run(&text, &[]).await;

        assert_eq!(report.citations.len(), 2);
        assert_eq!(report.count_with(ValidationOutcome::OriginalUrl), 2);
        assert!(report.citations.iter().all(Citation::has_http_scheme));
    }

    #[tokio::test]
    async fn test_unreachable_citation_repaired_by_search() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/dead"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/replacement"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let provider = Arc::new(StaticProvider {
            hits: vec![SearchHit {
                url: format!("{}/replacement", mock_server.uri()),
                title: Some("Replacement source".to_string()),
            }],
        });

        let text = format!("[1]: {}/dead – A dead source link", mock_server.uri());
        let report = pipeline(provider).run(&text, &[]).await;

        assert_eq!(report.citations.len(), 1);
        assert_eq!(report.count_with(ValidationOutcome::AlternativeFound), 1);
        let repaired = &report.citations.as_slice()[0];
        assert!(repaired.url.ends_with("/replacement"));
        assert_eq!(repaired.title, "Replacement source");
        assert!(!report.checks[0].issues.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_citation_falls_back_to_company() {
        let report = pipeline(Arc::new(EmptyProvider))
            .run("[1]: https://rival.io/post – Competitor blog post here", &[])
            .await;

        assert_eq!(report.citations.len(), 1);
        assert_eq!(report.count_with(ValidationOutcome::Fallback), 1);
        assert_eq!(report.citations.as_slice()[0].url, "https://mycompany.com");
        assert_eq!(
            report.citations.as_slice()[0].title,
            "Mycompany official website"
        );
    }

    #[tokio::test]
    async fn test_count_preserved_under_mixed_outcomes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/alive"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/dead"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let text = format!(
            "[1]: {0}/alive – First source stays valid\n\
             [2]: {0}/dead – Second source goes away\n\
             [3]: https://rival.io/x – Third source is filtered",
            mock_server.uri()
        );
        let report = pipeline(Arc::new(EmptyProvider)).run(&text, &[]).await;

        assert_eq!(report.citations.len(), 3);
        let numbers: Vec<usize> = report.citations.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(report.count_with(ValidationOutcome::OriginalUrl), 1);
        assert_eq!(report.count_with(ValidationOutcome::Fallback), 2);
    }

    #[tokio::test]
    async fn test_disabled_validation_passes_through() {
        let config = ValidationConfig {
            enabled: false,
            ..ValidationConfig::default()
        };
        let pipeline =
            CitationPipeline::new(config, profile(), Arc::new(EmptyProvider)).unwrap();

        // Unreachable and even filtered URLs survive untouched when disabled
        let report = pipeline
            .run("[1]: https://rival.io/post – Competitor blog post here", &[])
            .await;

        assert_eq!(report.citations.len(), 1);
        assert_eq!(report.citations.as_slice()[0].url, "https://rival.io/post");
        assert_eq!(report.count_with(ValidationOutcome::OriginalUrl), 1);
    }

    #[tokio::test]
    async fn test_empty_sources_text() {
        let report = pipeline(Arc::new(EmptyProvider))
            .run("just commentary, no sources", &[])
            .await;

        assert!(report.citations.is_empty());
        assert!(report.checks.is_empty());
    }

    #[tokio::test]
    async fn test_grounding_enhancement_feeds_validation() {
        let mock_server = MockServer::start().await;
        // Only the specific grounding path is reachable; the bare domain 404s
        Mock::given(method("HEAD"))
            .and(path("/research/2025-report"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let host = mock_server.uri();
        // Grounding domains never carry a port; match on the bare host
        let grounding = vec![GroundingUrl {
            url: format!("{host}/research/2025-report"),
            title: "Gartner research".to_string(),
            domain: "127.0.0.1".to_string(),
        }];

        let text = format!("[1]: {host} – Gartner research annual report");
        let report = pipeline(Arc::new(EmptyProvider)).run(&text, &grounding).await;

        assert_eq!(report.count_with(ValidationOutcome::OriginalUrl), 1);
        assert!(
            report.citations.as_slice()[0]
                .url
                .ends_with("/research/2025-report")
        );
    }

    #[tokio::test]
    async fn test_idempotent_on_all_valid_list() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let pipeline = pipeline(Arc::new(EmptyProvider));
        let text = format!(
            "[1]: {0}/a – First reachable source here\n[2]: {0}/b – Second reachable source here",
            mock_server.uri()
        );

        let first = pipeline.run(&text, &[]).await;
        let second = pipeline.validate(first.citations.clone(), &[]).await;

        assert_eq!(first.citations, second.citations);
        assert_eq!(second.count_with(ValidationOutcome::OriginalUrl), 2);
    }

    #[test]
    fn test_fallback_citation_shape() {
        let (url, title) = fallback_citation(&profile());
        assert_eq!(url, "https://mycompany.com");
        assert_eq!(title, "Mycompany official website");
    }

    #[test]
    fn test_fallback_citation_unparseable_company_url() {
        let profile = CompanyProfile {
            company_url: String::new(),
            competitor_domains: Vec::new(),
            language: "en".to_string(),
        };
        let (_, title) = fallback_citation(&profile);
        assert_eq!(title, "Company official website");
    }
}
