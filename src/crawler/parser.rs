//! HTML parsing for link extraction and page inspection
//!
//! This module handles parsing HTML content to:
//! - Extract outbound references (the [`LinkExtractor`] capability)
//! - Detect consent/cookie accept buttons
//! - Strip scripts and styles from saved markup

use scraper::{Html, Selector};
use url::Url;

/// Extraction failure; the engine treats the page as having no links
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Link extraction failed: {0}")]
pub struct ExtractionError(pub String);

/// The capability of listing the outbound references of a document
///
/// Returned strings are raw: they may be relative or malformed, and may repeat.
/// Resolution and validation happen in the engine.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, body: &str, base: &Url) -> Result<Vec<String>, ExtractionError>;
}

/// Elements and attributes that carry references
const REFERENCE_SELECTORS: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("source[src]", "src"),
];

/// Button labels treated as a consent/cookie accept affordance
const CONSENT_LABELS: &[&str] = &["accept", "i agree", "allow all", "accept all"];

/// Link extractor over HTML markup
///
/// # Extraction Rules
///
/// **Include:**
/// - `<a href>` and `<area href>`
/// - `<link href>` (stylesheets, icons, canonical)
/// - `<img src>`, `<script src>`, `<source src>`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - Empty and fragment-only references
pub struct HtmlLinkExtractor {
    selectors: Vec<(Selector, &'static str)>,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        let selectors = REFERENCE_SELECTORS
            .iter()
            .filter_map(|(css, attr)| Selector::parse(css).ok().map(|s| (s, *attr)))
            .collect();
        Self { selectors }
    }
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, body: &str, _base: &Url) -> Result<Vec<String>, ExtractionError> {
        let document = Html::parse_document(body);
        let mut references = Vec::new();

        for (selector, attr) in &self.selectors {
            for element in document.select(selector) {
                if let Some(value) = element.value().attr(attr) {
                    if is_followable(value) {
                        references.push(value.trim().to_string());
                    }
                }
            }
        }

        Ok(references)
    }
}

/// Filters out references that can never name a fetchable resource
fn is_followable(reference: &str) -> bool {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return false;
    }

    let lower = reference.to_ascii_lowercase();
    !["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Returns the label of the first button that accepts a consent banner
pub fn find_consent_button(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("button").ok()?;

    document
        .select(&selector)
        .map(|button| button.text().collect::<String>().trim().to_lowercase())
        .find(|label| CONSENT_LABELS.contains(&label.as_str()))
}

/// Returns true if any element in `html` matches `selector`
pub fn contains_selector(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

/// Removes `<script>` and `<style>` elements from an HTML document
///
/// The rest of the markup is re-serialized unchanged.
pub fn strip_scripts(html: &str) -> String {
    let mut document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("script, style") else {
        return html.to_string();
    };

    let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.root_element().html()
}
