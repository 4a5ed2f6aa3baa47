use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub number: usize,
    pub url: String,
    pub title: String,
}

impl Citation {
    /// Builds a citation, normalizing a scheme-less URL to `https://`.
    pub fn new(number: usize, url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = normalize_scheme(url.into());
        let title = title.into();

        let words = title.split_whitespace().count();
        if !(3..=25).contains(&words) {
            warn!(number, words, "citation title outside expected 3-25 word range");
        }

        Self { number, url, title }
    }

    pub fn has_http_scheme(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

fn normalize_scheme(url: String) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty()
        || trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
    {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Ordered list of citations for one article.
///
/// Born from extraction, mutated in place by the validation pass, and frozen
/// once handed to the renderer. Numbers are unique; after [`renumber`] they
/// are contiguous from 1.
///
/// [`renumber`]: CitationList::renumber
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationList(Vec<Citation>);

impl CitationList {
    #[must_use]
    pub const fn new(citations: Vec<Citation>) -> Self {
        Self(citations)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Citation> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Citation> {
        self.0.iter_mut()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Citation> {
        self.0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Citation] {
        &self.0
    }

    pub fn push(&mut self, citation: Citation) {
        self.0.push(citation);
    }

    /// Reassigns numbers 1..=N in current order.
    pub fn renumber(&mut self) {
        for (idx, citation) in self.0.iter_mut().enumerate() {
            citation.number = idx + 1;
        }
    }
}

impl IntoIterator for CitationList {
    type Item = Citation;
    type IntoIter = std::vec::IntoIter<Citation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CitationList {
    type Item = &'a Citation;
    type IntoIter = std::slice::Iter<'a, Citation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Citation> for CitationList {
    fn from_iter<T: IntoIterator<Item = Citation>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A URL surfaced by the research step, keyed by domain.
///
/// Higher-confidence hint for citation repair; read-only for this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingUrl {
    pub url: String,
    pub title: String,
    pub domain: String,
}

/// Why the final URL of a citation slot was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The extracted (possibly grounding-enhanced) URL was reachable and
    /// passed the domain filter.
    OriginalUrl,
    /// The original URL was rejected and an alternative search produced a
    /// reachable replacement.
    AlternativeFound,
    /// No acceptable alternative was found; the company URL fills the slot.
    Fallback,
}

/// Per-slot result of the validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCheck {
    pub citation: Citation,
    pub outcome: ValidationOutcome,
    /// Human-readable notes on what went wrong with the original URL.
    pub issues: Vec<String>,
}

/// Outcome of a whole validation pass, count-preserved from extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub citations: CitationList,
    pub checks: Vec<CitationCheck>,
}

impl ValidationReport {
    #[must_use]
    pub fn count_with(&self, outcome: ValidationOutcome) -> usize {
        self.checks.iter().filter(|c| c.outcome == outcome).count()
    }

    /// Fraction of slots that kept their original URL, in `0.0..=1.0`.
    ///
    /// Callers wanting a minimum-quality gate can threshold on this; the
    /// library itself stays best-effort.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn original_ratio(&self) -> f64 {
        if self.checks.is_empty() {
            return 1.0;
        }
        self.count_with(ValidationOutcome::OriginalUrl) as f64 / self.checks.len() as f64
    }
}

/// Caller-supplied company context, read-only for this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_url: String,
    pub competitor_domains: Vec<String>,
    pub language: String,
}
