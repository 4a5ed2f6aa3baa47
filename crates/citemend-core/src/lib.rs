//! # citemend-core
//!
//! Citation validation and repair for LLM-generated articles.
//!
//! A language model writing an SEO article produces a free-text block of
//! numbered sources. This crate turns that block into a fixed-count list of
//! citations whose URLs are real, reachable, and free of competitor,
//! self-referential and search-redirector domains. Broken or rejected URLs
//! are repaired with two independent strategies: upgrading to a grounding
//! URL captured during research, and an AI-assisted alternative search.
//! When both fail, the company's own URL fills the slot, so the article
//! always renders its advertised number of citations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use citemend_core::{
//!     CitationPipeline, CompanyProfile, GeminiSearchProvider, Result, ValidationConfig,
//! };
//!
//! # async fn example() -> Result<()> {
//! let profile = CompanyProfile {
//!     company_url: "https://mycompany.com".to_string(),
//!     competitor_domains: vec!["rival.io".to_string()],
//!     language: "en".to_string(),
//! };
//! let provider = Arc::new(GeminiSearchProvider::new("api-key")?);
//! let pipeline = CitationPipeline::new(ValidationConfig::default(), profile, provider)?;
//!
//! let report = pipeline
//!     .run("[1]: https://gartner.com – Gartner research report", &[])
//!     .await;
//! let html = pipeline.render_html(&report.citations);
//! # let _ = html;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - The number of citation slots never decreases during validation; repair
//!   replaces contents, never deletes a slot.
//! - Every output URL carries an explicit `http://` or `https://` scheme.
//! - Per-citation failures (timeouts, DNS errors, search outages) are
//!   absorbed into that slot; only HTTP client construction can fail the
//!   whole pass.
//! - Citations validate concurrently; output order always matches input
//!   order.

/// Configuration for the validation pass
pub mod config;
/// Error types and result aliases
pub mod error;
/// Parsing LLM-authored source lists
pub mod extract;
/// Domain-based rejection rules
pub mod filter;
/// HTML rendering of the finalized list
pub mod format;
/// Grounding-URL enhancement of generic citations
pub mod grounding;
/// The validation state machine and concurrency glue
pub mod pipeline;
/// AI-assisted alternative URL search
pub mod search;
/// Core data types
pub mod types;
/// HTTP reachability checks
pub mod validator;

// Re-export commonly used types
pub use config::ValidationConfig;
pub use error::{Error, Result};
pub use extract::extract_citations;
pub use filter::should_filter;
pub use format::render_citations;
pub use grounding::GroundingUrlEnhancer;
pub use pipeline::{CitationPipeline, fallback_citation};
pub use search::{
    AlternativeUrl, AlternativeUrlFinder, GeminiSearchProvider, SearchHit, SearchProvider,
    SearchResponse,
};
pub use types::{
    Citation, CitationCheck, CitationList, CompanyProfile, GroundingUrl, ValidationOutcome,
    ValidationReport,
};
pub use validator::{UrlCheck, UrlValidator};
