// src/mirror/rewrite.rs
// =============================================================================
// This module rewrites in-scope absolute URLs inside a saved page so the
// mirror renders correctly when served locally.
//
// How it works:
// 1. Every asset category (scripts, styles, images, fonts, icons) is defined
//    by a fixed set of filename extensions
// 2. For each scope hostname and each category we compile one regex rule
// 3. Each matched URL is replaced by /assets/<category>/<sanitized-basename>
// 4. srcset attributes get a dedicated pass because they hold a
//    comma-separated list of URL + descriptor pairs
// 5. Line endings are normalized (CRLF -> LF) once, after all substitutions
//
// Rewriting is purely textual (regex substitution over the serialized HTML),
// not a DOM re-serialization, so untouched markup keeps byte-for-byte
// fidelity.
//
// Rust concepts:
// - Enums with methods: AssetKind carries its own extension table
// - once_cell::sync::Lazy: compile a static regex exactly once
// - Closures as regex replacements: Regex::replace_all with a function
// =============================================================================

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;
use url::Url;

use super::session::SiteScope;

// The five asset categories a URL can be classified into.
// Anything that matches none of these extension sets is not an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Scripts,
    Styles,
    Images,
    Fonts,
    Icons,
}

impl AssetKind {
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Scripts,
        AssetKind::Styles,
        AssetKind::Images,
        AssetKind::Fonts,
        AssetKind::Icons,
    ];

    // Extensions are lower-case; classification lower-cases before comparing.
    // woff2 must come before woff: these lists feed regex alternations, and
    // the regex crate picks the leftmost alternative, not the longest.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AssetKind::Scripts => &["js"],
            AssetKind::Styles => &["css"],
            AssetKind::Images => &["avif", "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"],
            AssetKind::Fonts => &["woff2", "woff", "ttf", "otf", "eot"],
            AssetKind::Icons => &["ico"],
        }
    }

    /// Directory name under assets/ where this category is stored
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Scripts => "scripts",
            AssetKind::Styles => "styles",
            AssetKind::Images => "images",
            AssetKind::Fonts => "fonts",
            AssetKind::Icons => "icons",
        }
    }

    /// Classifies a URL by the filename extension of its path,
    /// case-insensitively. Returns None for anything unrecognized.
    pub fn classify(url: &Url) -> Option<AssetKind> {
        let ext = Path::new(url.path()).extension()?.to_str()?.to_ascii_lowercase();
        AssetKind::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

// Runs of whitespace or encoded spaces collapse into a single dash.
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:%20|\s)+").unwrap());

// Matches a whole srcset attribute; the capture is the comma-separated value.
static SRCSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)srcset\s*=\s*["']([^"']*)["']"#).unwrap());

/// Normalizes a raw URL path segment into a safe on-disk basename:
/// percent-decoded (a doubly-encoded space survives as %20 and is still
/// collapsed), lower-cased, with whitespace runs replaced by a single dash.
///
/// Sanitizing twice yields the same result as sanitizing once.
pub fn sanitize_filename(raw: &str) -> String {
    // An invalid percent sequence is left as-is rather than rejected
    let decoded = match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    };
    SPACE_RUN.replace_all(&decoded.to_lowercase(), "-").into_owned()
}

/// Compiles a pattern matching absolute http(s) URLs on `host` (with or
/// without a www. prefix) whose path ends in one of `extensions`.
///
/// The shared character class stops at quotes, whitespace and '>', so a
/// match never escapes the attribute or text node it started in.
pub(crate) fn asset_url_pattern(host: &str, extensions: &[&str]) -> Regex {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let pattern = format!(
        r#"(?i)https?://(?:www\.)?{}/[^"'\s>]+\.(?:{})"#,
        regex::escape(host),
        extensions.join("|"),
    );
    // The host is escaped and extensions are plain ASCII words, so the
    // pattern is always valid
    Regex::new(&pattern).unwrap()
}

// One entry of the rewrite rule table: URLs on one scope hostname ending in
// one category's extensions, rewritten into that category's local directory.
struct RewriteRule {
    kind: AssetKind,
    pattern: Regex,
}

/// Rewrites in-scope absolute asset URLs in page HTML to local paths.
///
/// Built once per run from the Site Scope; the rule table is fixed for the
/// whole crawl.
pub struct RewriteEngine {
    scope: SiteScope,
    rules: Vec<RewriteRule>,
}

impl RewriteEngine {
    pub fn new(scope: &SiteScope) -> Self {
        let mut rules = Vec::new();
        for host in scope.hosts() {
            for kind in AssetKind::ALL {
                rules.push(RewriteRule {
                    kind,
                    pattern: asset_url_pattern(host, kind.extensions()),
                });
            }
        }
        RewriteEngine {
            scope: scope.clone(),
            rules,
        }
    }

    /// Rewrites a single absolute URL to its local asset path, or None when
    /// the URL is out of scope or not a recognized asset.
    pub fn rewrite_url(&self, raw: &str) -> Option<String> {
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        if !self.scope.contains(host) {
            return None;
        }
        let kind = AssetKind::classify(&url)?;
        local_asset_path(&url, kind)
    }

    /// Applies the srcset pass, then every rule in the table, then CRLF -> LF
    /// normalization. Unmatched markup passes through untouched.
    pub fn rewrite_page(&self, html: &str) -> String {
        let mut output = SRCSET_RE
            .replace_all(html, |caps: &Captures| match self.rewrite_srcset(&caps[1]) {
                Some(value) => format!(r#"srcset="{}""#, value),
                None => caps[0].to_string(),
            })
            .into_owned();

        for rule in &self.rules {
            output = rule
                .pattern
                .replace_all(&output, |caps: &Captures| {
                    match Url::parse(&caps[0]).ok().and_then(|url| local_asset_path(&url, rule.kind)) {
                        Some(local) => local,
                        None => caps[0].to_string(),
                    }
                })
                .into_owned();
        }

        output.replace("\r\n", "\n").replace('\r', "\n")
    }

    // Rewrites one srcset value: each comma-separated entry is a URL followed
    // by an optional descriptor ("500w", "2x"). URLs are rewritten
    // independently; descriptors are preserved. Returns None when no entry
    // changed, so the original attribute text is kept byte-for-byte.
    fn rewrite_srcset(&self, value: &str) -> Option<String> {
        let mut changed = false;
        let entries: Vec<String> = value
            .split(',')
            .map(|entry| {
                let entry = entry.trim();
                let mut parts = entry.split_whitespace();
                let Some(url_part) = parts.next() else {
                    return entry.to_string();
                };
                let descriptors: Vec<&str> = parts.collect();
                match self.rewrite_url(url_part) {
                    Some(local) => {
                        changed = true;
                        if descriptors.is_empty() {
                            local
                        } else {
                            format!("{} {}", local, descriptors.join(" "))
                        }
                    }
                    None => entry.to_string(),
                }
            })
            .collect();
        changed.then(|| entries.join(", "))
    }
}

// Flattened destination for an asset: the directory part of the remote path
// is discarded, only the sanitized basename is kept.
fn local_asset_path(url: &Url, kind: AssetKind) -> Option<String> {
    let basename = url.path_segments().and_then(|mut segments| segments.next_back())?;
    if basename.is_empty() {
        return None;
    }
    Some(format!("/assets/{}/{}", kind.dir_name(), sanitize_filename(basename)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(aliases: &[&str]) -> SiteScope {
        let seed = Url::parse("https://x.com/").unwrap();
        let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
        SiteScope::new(&seed, &aliases).unwrap()
    }

    #[test]
    fn test_sanitize_decodes_and_dashes() {
        assert_eq!(sanitize_filename("My%20File.PNG"), "my-file.png");
        assert_eq!(sanitize_filename("Spa ced  Name.woff2"), "spa-ced-name.woff2");
    }

    #[test]
    fn test_sanitize_tolerates_double_encoding() {
        // %2520 decodes to %20, which still collapses into a dash
        assert_eq!(sanitize_filename("a%2520b.css"), "a-b.css");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in [
            "My%20File.PNG",
            "a%2520b.css",
            "already-clean.js",
            "Spa ced  Name.woff2",
            "plain.jpg",
        ] {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn test_classify_by_extension() {
        let classify = |u: &str| AssetKind::classify(&Url::parse(u).unwrap());
        assert_eq!(classify("https://x.com/img/photo.JPG"), Some(AssetKind::Images));
        assert_eq!(classify("https://x.com/a/b/site.css"), Some(AssetKind::Styles));
        assert_eq!(classify("https://x.com/app.js"), Some(AssetKind::Scripts));
        assert_eq!(classify("https://x.com/f/a.woff2"), Some(AssetKind::Fonts));
        assert_eq!(classify("https://x.com/favicon.ico"), Some(AssetKind::Icons));
        assert_eq!(classify("https://x.com/page.html"), None);
        assert_eq!(classify("https://x.com/about"), None);
    }

    #[test]
    fn test_rewrite_image_src() {
        let engine = RewriteEngine::new(&scope(&[]));
        let html = r#"<img src="https://x.com/img/photo.JPG">"#;
        assert_eq!(
            engine.rewrite_page(html),
            r#"<img src="/assets/images/photo.jpg">"#
        );
    }

    #[test]
    fn test_rewrite_leaves_out_of_scope_urls() {
        let engine = RewriteEngine::new(&scope(&[]));
        let html = r#"<img src="https://other.com/img/photo.jpg">"#;
        assert_eq!(engine.rewrite_page(html), html);
    }

    #[test]
    fn test_rewrite_alias_and_www_hosts() {
        let engine = RewriteEngine::new(&scope(&["cdn.x.com"]));
        let html = concat!(
            r#"<script src="https://cdn.x.com/lib/app.js"></script>"#,
            r#"<link href="https://www.x.com/theme/site.css">"#,
        );
        let output = engine.rewrite_page(html);
        assert!(output.contains(r#"src="/assets/scripts/app.js""#), "{}", output);
        assert!(output.contains(r#"href="/assets/styles/site.css""#), "{}", output);
    }

    #[test]
    fn test_rewrite_woff2_keeps_full_extension() {
        let engine = RewriteEngine::new(&scope(&[]));
        let html = r#"<a href="https://x.com/static/opensans.woff2">font</a>"#;
        assert_eq!(
            engine.rewrite_page(html),
            r#"<a href="/assets/fonts/opensans.woff2">font</a>"#
        );
    }

    #[test]
    fn test_rewrite_srcset_preserves_descriptors() {
        let engine = RewriteEngine::new(&scope(&[]));
        let html = r#"<img srcset="https://x.com/a.png 1x, https://x.com/b.png 2x">"#;
        assert_eq!(
            engine.rewrite_page(html),
            r#"<img srcset="/assets/images/a.png 1x, /assets/images/b.png 2x">"#
        );
    }

    #[test]
    fn test_rewrite_srcset_untouched_when_out_of_scope() {
        let engine = RewriteEngine::new(&scope(&[]));
        let html = r#"<img srcset="https://other.com/a.png 1x, https://other.com/b.png 2x">"#;
        assert_eq!(engine.rewrite_page(html), html);
    }

    #[test]
    fn test_rewrite_normalizes_line_endings() {
        let engine = RewriteEngine::new(&scope(&[]));
        assert_eq!(engine.rewrite_page("<p>a</p>\r\n<p>b</p>\r"), "<p>a</p>\n<p>b</p>\n");
    }

    #[test]
    fn test_rewrite_url_rejects_non_assets() {
        let engine = RewriteEngine::new(&scope(&[]));
        assert_eq!(engine.rewrite_url("https://x.com/about"), None);
        assert_eq!(engine.rewrite_url("ftp://x.com/a.png"), None);
        assert_eq!(engine.rewrite_url("not a url"), None);
        assert_eq!(
            engine.rewrite_url("https://x.com/deep/dir/photo.png"),
            Some("/assets/images/photo.png".to_string())
        );
    }
}
