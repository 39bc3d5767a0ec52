//! Article body extraction from Thairath article HTML.
//!
//! The body lives in a `div` whose class contains `article-content`. Its first
//! child element wraps the paragraphs; the first entry of that wrapper is
//! boilerplate (byline/share bar) and is skipped.
//!
//! The heuristic is isolated behind [`ContentExtractor`] so a layout change
//! only touches this file.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

static ARTICLE_CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="article-content"]"#).unwrap());

/// Turns a fetched article page into body text.
pub trait ContentExtractor: Send + Sync {
    /// Returns `None` when the page has no extractable body. `url` is only
    /// used for log context.
    fn extract(&self, url: &str, html: &str) -> Option<String>;
}

/// Default Thairath extractor, see the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArticleContentExtractor;

impl ContentExtractor for ArticleContentExtractor {
    fn extract(&self, url: &str, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        content_from_document(&document, url)
    }
}

/// Extract paragraph text from a parsed page.
pub fn content_from_document(document: &Html, url: &str) -> Option<String> {
    let mut candidates = document.select(&ARTICLE_CONTENT);
    let Some(candidate) = candidates.next() else {
        debug!(%url, "No article-content candidate");
        return None;
    };
    if candidates.next().is_some() {
        warn!(%url, "Page got more than 1 candidate, selecting first element");
    }

    let mut wrappers = candidate.children().filter_map(ElementRef::wrap);
    let Some(wrapper) = wrappers.next() else {
        warn!(%url, "article-content has no child element");
        return None;
    };
    if wrappers.next().is_some() {
        warn!(%url, "article-content got more than 1 child, selecting first element");
    }

    let paragraphs: Vec<String> = wrapper
        .children()
        .filter_map(|node| match ElementRef::wrap(node) {
            Some(element) => Some(element.text().collect::<String>()),
            None => node
                .value()
                .as_text()
                .map(|text| text.to_string())
                .filter(|text| !text.trim().is_empty()),
        })
        .skip(1)
        .map(|text| normalize_whitespace(&text))
        .collect();

    let content = paragraphs.join("\n\n").trim().to_string();
    if content.is_empty() { None } else { Some(content) }
}

/// Normalize Thairath's no-break-space formatting.
///
/// A pair of U+00A0 marks a paragraph break; a lone one is a plain space.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace("\u{a0}\u{a0}", "\n\n")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.thairath.co.th/news/crime/1";

    #[test]
    fn test_normalize_whitespace_pairs_and_singles() {
        assert_eq!(normalize_whitespace("a\u{a0}\u{a0}b\u{a0}c"), "a\n\nb c");
        assert_eq!(normalize_whitespace("\u{a0}x\u{a0}"), "x");
        assert_eq!(normalize_whitespace("  plain text \n"), "plain text");
        assert_eq!(
            normalize_whitespace("one\u{a0}\u{a0}two\u{a0}\u{a0}three"),
            "one\n\ntwo\n\nthree"
        );
    }

    #[test]
    fn test_no_candidate_returns_none() {
        let html = r#"<html><body><div class="sidebar"><p>nothing</p></div></body></html>"#;
        assert_eq!(ArticleContentExtractor.extract(URL, html), None);
    }

    #[test]
    fn test_single_candidate_skips_first_child() {
        let html = r#"<html><body>
            <div class="css-1x article-content">
              <div>
                <p>byline</p>
                <p>First paragraph.</p>
                <p>Second&nbsp;&nbsp;Third&nbsp;word</p>
              </div>
            </div>
        </body></html>"#;

        let content = ArticleContentExtractor.extract(URL, html).unwrap();
        assert_eq!(content, "First paragraph.\n\nSecond\n\nThird word");
    }

    #[test]
    fn test_multiple_candidates_select_first() {
        let html = r#"<html><body>
            <div class="article-content"><div><span>skip</span><p>from first</p></div></div>
            <div class="article-content-extra"><div><span>skip</span><p>from second</p></div></div>
        </body></html>"#;

        let content = ArticleContentExtractor.extract(URL, html).unwrap();
        assert_eq!(content, "from first");
    }

    #[test]
    fn test_nested_text_is_flattened() {
        let html = r#"<div class="article-content"><div><div>ads</div><p>Police <b>arrested</b> two men.</p></div></div>"#;
        let content = ArticleContentExtractor.extract(URL, html).unwrap();
        assert_eq!(content, "Police arrested two men.");
    }

    #[test]
    fn test_only_boilerplate_is_no_content() {
        let html = r#"<div class="article-content"><div><p>byline</p></div></div>"#;
        assert_eq!(ArticleContentExtractor.extract(URL, html), None);
    }

    #[test]
    fn test_candidate_without_wrapper_is_no_content() {
        let html = r#"<div class="article-content">just text</div>"#;
        assert_eq!(ArticleContentExtractor.extract(URL, html), None);
    }
}
