//! HTML rendering of the finalized citation list.
//!
//! Output is the sources fragment consumed by the page renderer: one
//! paragraph per citation, ascending by number, with URLs escaped in
//! attribute context and titles in text context.

use crate::CitationList;
use html_escape::{encode_double_quoted_attribute, encode_text};

/// Render citations as the article's sources HTML fragment.
///
/// Each citation becomes
/// `<p>[n]: <a href="URL" target="_blank" rel="noopener noreferrer">Title</a></p>`.
/// An empty list renders as the empty string.
#[must_use]
pub fn render_citations(citations: &CitationList) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut ordered: Vec<_> = citations.iter().collect();
    ordered.sort_by_key(|c| c.number);

    let mut html = String::new();
    for citation in ordered {
        let href = encode_double_quoted_attribute(&citation.url);
        let title = encode_text(&citation.title);
        html.push_str(&format!(
            "<p>[{}]: <a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">{title}</a></p>\n",
            citation.number,
        ));
    }
    html
}
