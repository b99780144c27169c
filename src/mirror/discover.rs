// src/mirror/discover.rs
// =============================================================================
// This module finds everything a page references: same-domain hyperlinks to
// crawl next, and asset URLs to download later.
//
// Three complementary strategies:
// 1. Structural: query the parsed DOM for anchor, image, script and link
//    elements and read their URL-bearing attribute
// 2. Raw scan: regex over the unparsed markup for absolute in-scope URLs
//    ending in a recognized asset extension, which catches references the
//    selectors miss (inline style attributes, data attributes)
// 3. CSS scan: url(...) references inside a downloaded stylesheet, resolved
//    against the stylesheet's own URL, which is how fonts and background
//    images behind a chain of imports are found
//
// Discovery never mutates the HTML or CSS text; it only collects references.
//
// Rust concepts:
// - scraper: parses HTML into a DOM queryable with CSS selectors
// - url::Url::join: resolves relative references like a browser does
// - regex captures: pull the reference out of url('...')
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::rewrite::{asset_url_pattern, AssetKind};
use super::session::SiteScope;

// Element/attribute pairs that carry asset URLs
const STRUCTURAL_SOURCES: [(&str, &str); 4] = [
    ("img[src]", "src"),
    ("script[src]", "src"),
    (r#"link[rel="stylesheet"][href]"#, "href"),
    (r#"link[rel~="icon"][href]"#, "href"),
];

// url(...) reference inside CSS, quoted or bare
static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).unwrap());

/// Collects page links and asset references from fetched content.
/// Built once per run; the raw-scan patterns are compiled per scope host.
pub struct Discovery {
    scope: SiteScope,
    scan_patterns: Vec<Regex>,
}

impl Discovery {
    pub fn new(scope: &SiteScope) -> Self {
        let all_extensions: Vec<&str> = AssetKind::ALL
            .into_iter()
            .flat_map(|kind| kind.extensions().iter().copied())
            .collect();
        let scan_patterns = scope
            .hosts()
            .iter()
            .map(|host| asset_url_pattern(host, &all_extensions))
            .collect();
        Discovery {
            scope: scope.clone(),
            scan_patterns,
        }
    }

    /// Hyperlink targets to feed into the frontier: every anchor href,
    /// resolved against the page URL, fragment stripped, restricted to the
    /// primary domain. Duplicates are fine; the frontier dedups on admission.
    pub fn page_links(&self, html: &str, base: &Url) -> Vec<Url> {
        let mut links = Vec::new();
        let document = Html::parse_document(html);
        // The selector is a constant and known to be valid
        let selector = Selector::parse("a[href]").unwrap();

        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(mut url) = resolve_href(base, href) {
                    url.set_fragment(None);
                    if url.host_str() == Some(self.scope.primary()) {
                        links.push(url);
                    }
                }
            }
        }
        links
    }

    /// Asset URLs referenced by a page, found structurally and by scanning
    /// the raw markup for in-scope absolute URLs with asset extensions.
    pub fn page_assets(&self, html: &str, base: &Url) -> Vec<Url> {
        let mut assets = Vec::new();
        let document = Html::parse_document(html);

        for (css_selector, attr) in STRUCTURAL_SOURCES {
            let selector = Selector::parse(css_selector).unwrap();
            for element in document.select(&selector) {
                if let Some(value) = element.value().attr(attr) {
                    if let Ok(url) = base.join(value) {
                        if self.is_in_scope_asset(&url) {
                            assets.push(url);
                        }
                    }
                }
            }
        }

        // Catches absolute URLs outside the queried elements, e.g. inside
        // inline styles or data attributes
        for pattern in &self.scan_patterns {
            for found in pattern.find_iter(html) {
                if let Ok(url) = Url::parse(found.as_str()) {
                    assets.push(url);
                }
            }
        }
        assets
    }

    /// url(...) references in a stylesheet, resolved against the
    /// stylesheet's own URL. Not scope-filtered: fonts regularly live on
    /// foreign CDNs, and the classification step still applies downstream.
    pub fn css_assets(&self, css: &str, stylesheet_url: &Url) -> Vec<Url> {
        let mut assets = Vec::new();
        for caps in CSS_URL_RE.captures_iter(css) {
            let reference = &caps[1];
            if reference.starts_with("data:") || reference.starts_with("blob:") {
                continue;
            }
            if let Ok(url) = stylesheet_url.join(reference) {
                assets.push(url);
            }
        }
        assets
    }

    fn is_in_scope_asset(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url.host_str().map_or(false, |host| self.scope.contains(host))
            && AssetKind::classify(url).is_some()
    }
}

// Resolves a possibly-relative href to an absolute URL, skipping anchors
// and non-fetchable schemes up front
fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
