// src/mirror/fetch.rs
// =============================================================================
// This module fetches pages and assets and persists them to the output tree.
//
// Error posture:
// - A network failure or non-2xx status abandons that single page or asset
//   with a clearly marked ❌ line; the crawl keeps going
// - A filesystem failure (permissions, disk full) is fatal for the run and
//   propagates with ? - the environment is broken, not the network
// - Nothing is retried
//
// Page save paths preserve the URL path: a path ending in "/" or without a
// file extension gets index.html appended, anything else gets ".html"
// appended. Assets are flattened into assets/<category>/<sanitized-basename>.
//
// Rust concepts:
// - tokio::fs: async file IO with ? propagation
// - anyhow's .with_context(): attach the failing path to an error
// - String::from_utf8_lossy: decode stylesheet bytes without failing
// =============================================================================

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::discover::Discovery;
use super::rewrite::{sanitize_filename, AssetKind, RewriteEngine};
use super::session::CrawlSession;

/// Where a mirrored page lands on disk, relative to the site output root.
/// "/" and "/blog/" map to index.html under their directory; "/about" maps
/// to about/index.html; "/page.php" maps to page.php.html.
pub fn page_local_path(root: &Path, url: &Url) -> PathBuf {
    let path = url.path();
    let relative = path.trim_start_matches('/');
    let has_extension = Path::new(path).extension().is_some();
    if path.ends_with('/') || !has_extension {
        root.join(relative).join("index.html")
    } else {
        root.join(format!("{relative}.html"))
    }
}

/// Fetches one page, feeds discovery, rewrites, and saves it.
///
/// Fetch failures count against the summary and return Ok so the traversal
/// continues; only filesystem errors bubble up.
pub async fn fetch_page(
    client: &Client,
    session: &mut CrawlSession,
    discovery: &Discovery,
    rewriter: &RewriteEngine,
    url: &Url,
) -> Result<()> {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("❌ Failed to retrieve: {} ({})", url, e);
            session.summary.pages_failed += 1;
            return Ok(());
        }
    };
    if !response.status().is_success() {
        eprintln!("❌ Failed to retrieve: {} (HTTP {})", url, response.status());
        session.summary.pages_failed += 1;
        return Ok(());
    }
    let html = match response.text().await {
        Ok(html) => html,
        Err(e) => {
            eprintln!("❌ Failed to read body: {} ({})", url, e);
            session.summary.pages_failed += 1;
            return Ok(());
        }
    };

    // Discovery first, so the frontier and asset queue grow before the page
    // text is rewritten
    for link in discovery.page_links(&html, url) {
        session.enqueue_page(link);
    }
    for asset in discovery.page_assets(&html, url) {
        session.enqueue_asset(asset);
    }

    let rewritten = rewriter.rewrite_page(&html);
    let path = page_local_path(session.output_dir(), url);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, rewritten)
        .await
        .with_context(|| format!("failed to write page {}", path.display()))?;

    println!("✅ Saved page: {} -> {}", url, path.display());
    session.summary.pages_saved += 1;
    Ok(())
}

/// Downloads one asset body after the per-worker throttle delay.
/// Returns the URL with the outcome so results can be persisted in order
/// by the caller.
pub async fn download_asset(client: Client, url: Url, throttle: Duration) -> (Url, Result<Vec<u8>>) {
    tokio::time::sleep(throttle).await;
    let outcome = async {
        let response = client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            bail!("HTTP {}", response.status());
        }
        Ok(response.bytes().await?.to_vec())
    }
    .await;
    (url, outcome)
}

/// Writes a downloaded asset into assets/<category>/<sanitized-basename>.
///
/// Stylesheets are additionally scanned for url(...) references, and any new
/// asset URLs join the queue; that chain is how fonts and background images
/// reachable only through CSS imports end up in the mirror.
pub async fn persist_asset(
    session: &mut CrawlSession,
    discovery: &Discovery,
    url: &Url,
    outcome: Result<Vec<u8>>,
) -> Result<()> {
    let bytes = match outcome {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Failed to download: {} ({})", url, e);
            session.summary.assets_failed += 1;
            return Ok(());
        }
    };

    // The queue only admits classifiable URLs; an unclassifiable one here is
    // silently skipped, matching the enqueue contract
    let Some(kind) = AssetKind::classify(url) else {
        return Ok(());
    };
    let Some(basename) = url.path_segments().and_then(|mut segments| segments.next_back()) else {
        return Ok(());
    };

    let path = session
        .output_dir()
        .join("assets")
        .join(kind.dir_name())
        .join(sanitize_filename(basename));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write asset {}", path.display()))?;

    println!("✅ Downloaded: {} -> {}", url, path.display());
    session.summary.assets_saved += 1;

    if kind == AssetKind::Styles {
        let css = String::from_utf8_lossy(&bytes);
        for found in discovery.css_assets(&css, url) {
            session.enqueue_asset(found);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::session::SiteScope;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn path_for(url: &str) -> PathBuf {
        page_local_path(Path::new("sites/x.com"), &Url::parse(url).unwrap())
    }

    #[test]
    fn test_page_path_root_is_index() {
        assert_eq!(path_for("https://x.com/"), Path::new("sites/x.com/index.html"));
    }

    #[test]
    fn test_page_path_trailing_slash_nests_index() {
        assert_eq!(path_for("https://x.com/blog/"), Path::new("sites/x.com/blog/index.html"));
    }

    #[test]
    fn test_page_path_without_extension_nests_index() {
        assert_eq!(path_for("https://x.com/about"), Path::new("sites/x.com/about/index.html"));
    }

    #[test]
    fn test_page_path_with_extension_appends_html() {
        assert_eq!(path_for("https://x.com/page.php"), Path::new("sites/x.com/page.php.html"));
    }

    #[test]
    fn test_page_path_ignores_dots_in_directories() {
        assert_eq!(
            path_for("https://x.com/v1.2/about"),
            Path::new("sites/x.com/v1.2/about/index.html")
        );
    }

    fn session_in(dir: &Path) -> (CrawlSession, Discovery) {
        let seed = Url::parse("https://x.com/").unwrap();
        let scope = SiteScope::new(&seed, &[]).unwrap();
        let discovery = Discovery::new(&scope);
        let session = CrawlSession::new(scope, dir, Arc::new(AtomicBool::new(false)));
        (session, discovery)
    }

    #[tokio::test]
    async fn test_persist_asset_writes_sanitized_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut session, discovery) = session_in(tmp.path());
        session.prepare_output_dirs().await.unwrap();

        let url = Url::parse("https://x.com/img/My%20Photo.PNG").unwrap();
        persist_asset(&mut session, &discovery, &url, Ok(b"png-bytes".to_vec()))
            .await
            .unwrap();

        let saved = tmp.path().join("x.com/assets/images/my-photo.png");
        assert_eq!(std::fs::read(saved).unwrap(), b"png-bytes");
        assert_eq!(session.summary.assets_saved, 1);
    }

    #[tokio::test]
    async fn test_persist_stylesheet_discovers_transitive_assets() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut session, discovery) = session_in(tmp.path());
        session.prepare_output_dirs().await.unwrap();

        let css_url = Url::parse("https://x.com/css/site.css").unwrap();
        let css = b"@font-face { src: url('fonts/a.woff2'); }".to_vec();
        persist_asset(&mut session, &discovery, &css_url, Ok(css)).await.unwrap();

        assert!(tmp.path().join("x.com/assets/styles/site.css").exists());
        // The font referenced by the stylesheet is now queued for download
        let batch = session.drain_asset_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].as_str(), "https://x.com/css/fonts/a.woff2");
    }

    #[tokio::test]
    async fn test_persist_failure_counts_and_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut session, discovery) = session_in(tmp.path());
        session.prepare_output_dirs().await.unwrap();

        let url = Url::parse("https://x.com/img/gone.png").unwrap();
        let outcome = Err(anyhow::anyhow!("HTTP 404 Not Found"));
        persist_asset(&mut session, &discovery, &url, outcome).await.unwrap();

        assert_eq!(session.summary.assets_failed, 1);
        assert_eq!(session.summary.assets_saved, 0);
    }
}
