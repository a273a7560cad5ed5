//! Pure HTML extraction of scrape candidates and item details.
//!
//! Both extractors operate over already-fetched document text and never
//! perform I/O. They are best-effort heuristics, not structured schema
//! parses: missing fields are expected outcomes, never errors, and an
//! empty or unparsable document yields empty results.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::store::ItemRecord;

/// Path prefix identifying content links on a listing page.
const LISTING_PREFIX: &str = "/wiki/";

/// Reserved namespace marker; links containing it are navigational,
/// not content.
const CATEGORY_MARKER: &str = "Category:";

/// A (name, URL) pair produced by list-page parsing, not yet fetched
/// as a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeCandidate {
    /// Visible link text, whitespace-trimmed.
    pub name: String,
    /// Link target resolved against the listing page's base URL.
    pub url: Url,
}

/// Extracts content-link candidates from a listing page.
///
/// Scans all hyperlinks whose href starts with `/wiki/`, taking the
/// visible link text as the candidate name and the href resolved against
/// `base_url` as the candidate URL. Links containing a reserved namespace
/// marker (`Category:`) or an in-page fragment (`#`) are discarded.
///
/// Output preserves document order. No deduplication is performed here;
/// duplicates are filtered implicitly by later per-URL fetches.
#[must_use]
pub fn extract_candidates(html: &str, base_url: &Url) -> Vec<ScrapeCandidate> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse(r#"a[href^="/wiki/"]"#) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.starts_with(LISTING_PREFIX) {
            continue;
        }
        // Navigational links: namespace pages and in-page anchors
        if href.contains(CATEGORY_MARKER) || href.contains('#') {
            continue;
        }

        let Ok(url) = base_url.join(href) else {
            debug!(href, "skipping unresolvable candidate href");
            continue;
        };

        let name = link.text().collect::<String>().trim().to_string();
        candidates.push(ScrapeCandidate { name, url });
    }

    candidates
}

/// Extracts a structured item record from a detail page.
///
/// The first paragraph in document order supplies the description and the
/// first link into the category namespace supplies the category; either
/// may be absent, in which case the field is `None` rather than an empty
/// string.
#[must_use]
pub fn extract_detail(html: &str, name: &str) -> ItemRecord {
    let document = Html::parse_document(html);

    let description = Selector::parse("p").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    });

    let category = Selector::parse("a[href]").ok().and_then(|selector| {
        document
            .select(&selector)
            .find(|link| {
                link.value()
                    .attr("href")
                    .is_some_and(|href| href.contains("/wiki/Category:"))
            })
            .map(|link| link.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    });

    ItemRecord {
        name: name.to_string(),
        description,
        category,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LISTING_PAGE: &str = r#"
        <html>
            <body>
                <a href="/wiki/Item1">Item 1</a>
                <a href="/wiki/Item2">Item 2</a>
            </body>
        </html>
    "#;

    const DETAIL_PAGE: &str = r#"
        <html>
            <body>
                <p>This is a test description for Item 1.</p>
                <a href="/wiki/Category:TestCategory">Category: TestCategory</a>
            </body>
        </html>
    "#;

    fn base() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    #[test]
    fn test_extract_candidates_returns_links_in_document_order() {
        let candidates = extract_candidates(LISTING_PAGE, &base());

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Item 1");
        assert_eq!(candidates[0].url.as_str(), "https://example.com/wiki/Item1");
        assert_eq!(candidates[1].name, "Item 2");
        assert_eq!(candidates[1].url.as_str(), "https://example.com/wiki/Item2");
    }

    #[test]
    fn test_extract_candidates_excludes_category_and_fragment_links() {
        let html = r##"
            <html><body>
                <a href="/wiki/Item1">Item 1</a>
                <a href="/wiki/Category:Fauna">Fauna</a>
                <a href="/wiki/Item2#Uses">Item 2 uses</a>
                <a href="/about">About</a>
            </body></html>
        "##;

        let candidates = extract_candidates(html, &base());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Item 1");
    }

    #[test]
    fn test_extract_candidates_trims_link_text() {
        let html = r#"<a href="/wiki/Item1">  Item 1
        </a>"#;

        let candidates = extract_candidates(html, &base());
        assert_eq!(candidates[0].name, "Item 1");
    }

    #[test]
    fn test_extract_candidates_empty_document() {
        assert!(extract_candidates("", &base()).is_empty());
        assert!(extract_candidates("<html><body></body></html>", &base()).is_empty());
    }

    #[test]
    fn test_extract_candidates_no_dedup() {
        let html = r#"
            <a href="/wiki/Item1">Item 1</a>
            <a href="/wiki/Item1">Item 1</a>
        "#;

        let candidates = extract_candidates(html, &base());
        assert_eq!(candidates.len(), 2, "Duplicates are kept in document order");
    }

    #[test]
    fn test_extract_detail_full_page() {
        let item = extract_detail(DETAIL_PAGE, "Item 1");

        assert_eq!(item.name, "Item 1");
        assert_eq!(
            item.description.as_deref(),
            Some("This is a test description for Item 1.")
        );
        assert_eq!(item.category.as_deref(), Some("Category: TestCategory"));
    }

    #[test]
    fn test_extract_detail_missing_description() {
        let html = r#"<a href="/wiki/Category:Fauna">Fauna</a>"#;
        let item = extract_detail(html, "Peeper");

        assert_eq!(item.description, None);
        assert_eq!(item.category.as_deref(), Some("Fauna"));
    }

    #[test]
    fn test_extract_detail_missing_category() {
        let html = "<p>Just a description.</p>";
        let item = extract_detail(html, "Peeper");

        assert_eq!(item.description.as_deref(), Some("Just a description."));
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_extract_detail_empty_document_yields_unset_fields() {
        let item = extract_detail("", "Peeper");

        assert_eq!(item.name, "Peeper");
        assert_eq!(item.description, None);
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_extract_detail_uses_first_paragraph_only() {
        let html = "<p>First paragraph.</p><p>Second paragraph.</p>";
        let item = extract_detail(html, "Peeper");

        assert_eq!(item.description.as_deref(), Some("First paragraph."));
    }

    #[test]
    fn test_extract_detail_whitespace_only_paragraph_is_unset() {
        let html = "<p>   </p>";
        let item = extract_detail(html, "Peeper");

        assert_eq!(item.description, None);
    }
}
