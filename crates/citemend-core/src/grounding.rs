//! Upgrading generic citation URLs with research-time grounding hints.
//!
//! The research step that produced the article also surfaced concrete source
//! URLs ("grounding URLs"). When the model cites only a bare domain, the
//! grounding set often holds the specific article that was actually read;
//! swapping it in repairs the citation without any network traffic.
//!
//! Matching is by domain. When several grounding URLs share a domain, the
//! one whose title overlaps the citation title most wins; ties keep the
//! first entry. A citation that already carries a specific multi-segment
//! path is only upgraded to a strictly longer path, never downgraded.

use crate::filter::{host_of, normalize_host};
use crate::{CitationList, GroundingUrl};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Domain-indexed view over the grounding URL set.
pub struct GroundingUrlEnhancer {
    by_domain: HashMap<String, Vec<GroundingUrl>>,
}

impl GroundingUrlEnhancer {
    /// Index grounding URLs by normalized domain.
    ///
    /// Entries with an empty `domain` field fall back to the domain of their
    /// `url`; entries with neither are dropped.
    #[must_use]
    pub fn new(grounding: &[GroundingUrl]) -> Self {
        let mut by_domain: HashMap<String, Vec<GroundingUrl>> = HashMap::new();

        for entry in grounding {
            let domain = if entry.domain.trim().is_empty() {
                host_of(&entry.url)
            } else {
                Some(normalize_host(&entry.domain))
            };
            let Some(domain) = domain else {
                debug!(url = %entry.url, "dropping grounding entry without a domain");
                continue;
            };
            by_domain.entry(domain).or_default().push(entry.clone());
        }

        Self { by_domain }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }

    /// Upgrade under-specified citation URLs in place.
    ///
    /// Never changes the citation count and never introduces a URL absent
    /// from the grounding set.
    pub fn enhance(&self, citations: &mut CitationList) {
        if self.by_domain.is_empty() {
            return;
        }

        for citation in citations.iter_mut() {
            let Some(domain) = host_of(&citation.url) else {
                continue;
            };
            let Some(candidates) = self.by_domain.get(&domain) else {
                continue;
            };

            let current_depth = meaningful_path_segments(&citation.url);
            let eligible: Vec<&GroundingUrl> = if current_depth <= 1 {
                candidates.iter().collect()
            } else {
                // Already specific; only a strictly deeper grounding path
                // may replace it
                candidates
                    .iter()
                    .filter(|g| meaningful_path_segments(&g.url) > current_depth)
                    .collect()
            };

            if let Some(best) = best_title_match(&citation.title, &eligible) {
                debug!(
                    number = citation.number,
                    from = %citation.url,
                    to = %best.url,
                    "enhancing citation with grounding URL"
                );
                citation.url = best.url.clone();
            }
        }
    }
}

/// Pick the grounding URL whose title overlaps the citation title most.
///
/// Ties keep the first candidate in grounding order.
fn best_title_match<'a>(title: &str, candidates: &[&'a GroundingUrl]) -> Option<&'a GroundingUrl> {
    let mut best: Option<(&GroundingUrl, usize)> = None;

    for candidate in candidates {
        let score = title_overlap_score(title, &candidate.title);
        match best {
            Some((_, best_score)) if score <= best_score => {},
            _ => best = Some((candidate, score)),
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Count shared meaningful words between two titles.
///
/// Words shorter than three characters are ignored so articles and
/// prepositions do not dominate the score.
fn title_overlap_score(a: &str, b: &str) -> usize {
    let words_of = |s: &str| {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3)
            .map(str::to_lowercase)
            .collect::<std::collections::HashSet<_>>()
    };

    let a_words = words_of(a);
    let b_words = words_of(b);
    a_words.intersection(&b_words).count()
}

/// Count non-empty path segments of a URL.
///
/// A "domain-only" URL has at most one; trailing slashes and the empty root
/// path do not count.
pub(crate) fn meaningful_path_segments(url: &str) -> usize {
    let Ok(parsed) = Url::parse(url).or_else(|_| Url::parse(&format!("https://{url}"))) else {
        return 0;
    };
    parsed.path_segments().map_or(0, |segments| {
        segments.filter(|s| !s.trim().is_empty()).count()
    })
}
