// src/mirror/session.rs
// =============================================================================
// This module owns all mutable crawl state and drives the run.
//
// How a run works:
// 1. The seed URL initializes the Frontier (a FIFO page queue)
// 2. Pages are fetched one at a time, breadth-first, until the Frontier
//    drains; discovery feeds new pages and assets back into the session
// 3. Only then does the asset queue drain, in FIFO rounds of up to
//    --concurrent downloads; stylesheets discovered mid-round append their
//    own assets to the next round
//
// All queues and sets live on a CrawlSession value that is passed around by
// reference, so repeated runs (and tests) stay independent - there are no
// process-wide singletons.
//
// Politeness:
// - A configurable delay between request starts
// - Only the primary domain is crawled as pages; aliases are asset-only
//
// Rust concepts:
// - HashSet: To track visited URLs (O(1) check-and-insert)
// - VecDeque: Double-ended queue for breadth-first order
// - Arc<AtomicBool>: A cancellation flag shared with the Ctrl-C handler
// =============================================================================

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::discover::Discovery;
use super::fetch;
use super::rewrite::{AssetKind, RewriteEngine};

/// The set of hostnames treated as "local" for rewriting and asset
/// collection: the primary domain (hostname of the seed URL) plus any alias
/// hostnames given on the command line. Fixed once at run start.
#[derive(Debug, Clone)]
pub struct SiteScope {
    primary: String,
    hosts: Vec<String>,
}

impl SiteScope {
    /// Builds the scope from the seed URL and the alias arguments. An alias
    /// may be a bare hostname or a full URL (its hostname is taken).
    pub fn new(seed: &Url, aliases: &[String]) -> Result<Self> {
        let primary = seed
            .host_str()
            .ok_or_else(|| anyhow!("URL has no hostname: {}", seed))?
            .to_string();

        let mut hosts = vec![primary.clone()];
        for alias in aliases {
            let host = Url::parse(alias)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_else(|| alias.trim().trim_end_matches('/').to_string());
            if !host.is_empty() && !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        Ok(SiteScope { primary, hosts })
    }

    /// The hostname pages are crawled from
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Primary domain plus every alias
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Scope membership, tolerating a www. prefix on either side
    pub fn contains(&self, host: &str) -> bool {
        let host = strip_www(host);
        self.hosts.iter().any(|h| strip_www(h) == host)
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// The FIFO queue of not-yet-fetched page URLs, plus the visited set that
/// keeps each page from being fetched twice.
#[derive(Debug)]
pub struct Frontier {
    primary: String,
    queue: VecDeque<Url>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(primary: &str) -> Self {
        Frontier {
            primary: primary.to_string(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    /// Admits a page URL iff its hostname equals the primary domain (aliases
    /// are asset-only, never crawled) and it has not been seen before.
    /// The fragment is stripped first: two URLs that differ only by fragment
    /// are the same page. Membership test and insert are a single
    /// HashSet::insert, so duplicate discovery passes cannot double-enqueue.
    pub fn enqueue(&mut self, mut url: Url) -> bool {
        url.set_fragment(None);
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        if url.host_str() != Some(self.primary.as_str()) {
            return false;
        }
        if !self.visited.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(url);
        true
    }

    /// Removes and returns the earliest-enqueued URL (breadth-first order)
    pub fn next(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }

    /// Number of pages fetched or enqueued so far
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

/// Counters reported at the end of a run. Serializes for --json output.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub pages_saved: usize,
    pub pages_failed: usize,
    pub assets_saved: usize,
    pub assets_failed: usize,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.pages_failed + self.assets_failed
    }
}

/// Operator-facing tuning for a run
pub struct CrawlConfig {
    /// Minimum delay between successive request starts
    pub throttle: Duration,
    /// Maximum asset downloads in flight at once
    pub concurrent: usize,
    /// User-agent header sent with every request
    pub user_agent: String,
    /// Raised (e.g. by Ctrl-C) to stop admitting new work; in-flight
    /// fetches complete and partial output is kept
    pub cancel: Arc<AtomicBool>,
}

/// All mutable state of one crawl run: scope, frontier, asset queue,
/// dedup sets and counters. Created empty, grows monotonically, discarded
/// when the run ends.
pub struct CrawlSession {
    scope: SiteScope,
    output_dir: PathBuf,
    frontier: Frontier,
    asset_queue: VecDeque<Url>,
    seen_assets: HashSet<String>,
    pub summary: RunSummary,
    cancelled: Arc<AtomicBool>,
}

impl CrawlSession {
    pub fn new(scope: SiteScope, output_root: &Path, cancelled: Arc<AtomicBool>) -> Self {
        let output_dir = output_root.join(scope.primary());
        let frontier = Frontier::new(scope.primary());
        CrawlSession {
            scope,
            output_dir,
            frontier,
            asset_queue: VecDeque::new(),
            seen_assets: HashSet::new(),
            summary: RunSummary::default(),
            cancelled,
        }
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn enqueue_page(&mut self, url: Url) -> bool {
        self.frontier.enqueue(url)
    }

    pub fn pages_visited(&self) -> usize {
        self.frontier.visited_len()
    }

    /// Admits an asset URL iff it classifies into a known category and has
    /// not been queued or downloaded before. Unclassifiable URLs are dropped
    /// here, before any network fetch.
    pub fn enqueue_asset(&mut self, mut url: Url) -> bool {
        url.set_fragment(None);
        if AssetKind::classify(&url).is_none() {
            return false;
        }
        if !self.seen_assets.insert(url.to_string()) {
            return false;
        }
        self.asset_queue.push_back(url);
        true
    }

    pub fn pending_assets(&self) -> usize {
        self.asset_queue.len()
    }

    /// Takes everything currently queued, in FIFO order, leaving the queue
    /// empty for assets discovered while the batch downloads
    pub fn drain_asset_batch(&mut self) -> Vec<Url> {
        self.asset_queue.drain(..).collect()
    }

    /// Creates the output directory skeleton:
    /// sites/<domain>/assets/{scripts,styles,images,fonts,icons}
    pub async fn prepare_output_dirs(&self) -> Result<()> {
        for kind in AssetKind::ALL {
            let dir = self.output_dir.join("assets").join(kind.dir_name());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Mirrors a website: crawls same-domain pages breadth-first, then downloads
/// every discovered asset, rewriting pages so the copy renders locally.
///
/// Per-item network failures are logged and skipped; filesystem failures and
/// an invalid seed URL are fatal.
pub async fn mirror_site(start_url: &str, aliases: &[String], config: &CrawlConfig) -> Result<RunSummary> {
    let seed = Url::parse(start_url).map_err(|e| anyhow!("Invalid URL '{}': {}", start_url, e))?;
    let scope = SiteScope::new(&seed, aliases)?;

    let mut session = CrawlSession::new(scope, Path::new("sites"), config.cancel.clone());
    let discovery = Discovery::new(session.scope());
    let rewriter = RewriteEngine::new(session.scope());
    session.prepare_output_dirs().await?;

    // One client for the whole run (connection pooling)
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(config.user_agent.as_str())
        .build()?;

    session.enqueue_page(seed);

    // Stage 1: drain the frontier page by page. Discovery during this stage
    // fully populates the asset queue before any asset download starts.
    while let Some(page) = session.frontier.next() {
        if session.is_cancelled() {
            println!("🛑 Cancelled, skipping remaining pages");
            break;
        }
        fetch::fetch_page(&client, &mut session, &discovery, &rewriter, &page).await?;
        tokio::time::sleep(config.throttle).await;
    }

    println!("\n📄 Crawled {} page(s)", session.pages_visited());
    println!("📦 Downloading {} asset(s)...\n", session.pending_assets());

    // Stage 2: drain the asset queue in FIFO rounds. Each round downloads
    // with up to `concurrent` requests in flight; stylesheets scanned during
    // persist feed the next round until no new work appears.
    let concurrent = config.concurrent.max(1);
    while session.pending_assets() > 0 {
        if session.is_cancelled() {
            println!("🛑 Cancelled, skipping remaining assets");
            break;
        }
        let batch = session.drain_asset_batch();
        let downloads = batch.into_iter().map(|url| {
            let client = client.clone();
            let throttle = config.throttle;
            async move { fetch::download_asset(client, url, throttle).await }
        });
        let results: Vec<_> = stream::iter(downloads).buffer_unordered(concurrent).collect().await;
        for (url, outcome) in results {
            fetch::persist_asset(&mut session, &discovery, &url, outcome).await?;
        }
    }

    Ok(session.summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scope(aliases: &[&str]) -> SiteScope {
        let seed = Url::parse("https://example.com/").unwrap();
        let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
        SiteScope::new(&seed, &aliases).unwrap()
    }

    fn test_session(scope: SiteScope) -> CrawlSession {
        CrawlSession::new(scope, Path::new("target/test-sites"), Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_scope_from_alias_urls_and_hostnames() {
        let scope = test_scope(&["https://cdn.example.com/x", "static.example.com"]);
        assert_eq!(scope.primary(), "example.com");
        assert_eq!(scope.hosts(), ["example.com", "cdn.example.com", "static.example.com"]);
        assert!(scope.contains("cdn.example.com"));
        assert!(scope.contains("www.example.com"));
        assert!(!scope.contains("other.com"));
    }

    #[test]
    fn test_frontier_only_admits_primary_domain() {
        let mut frontier = Frontier::new("example.com");
        assert!(frontier.enqueue(Url::parse("https://example.com/a").unwrap()));
        // Aliases and foreign hosts are never crawled as pages
        assert!(!frontier.enqueue(Url::parse("https://cdn.example.com/a").unwrap()));
        assert!(!frontier.enqueue(Url::parse("https://other.com/a").unwrap()));
        assert!(!frontier.enqueue(Url::parse("ftp://example.com/a").unwrap()));
        assert_eq!(frontier.visited_len(), 1);
    }

    #[test]
    fn test_frontier_dedups_and_strips_fragments() {
        let mut frontier = Frontier::new("example.com");
        assert!(frontier.enqueue(Url::parse("https://example.com/page").unwrap()));
        assert!(!frontier.enqueue(Url::parse("https://example.com/page").unwrap()));
        // Same page, different fragment: still a duplicate
        assert!(!frontier.enqueue(Url::parse("https://example.com/page#section").unwrap()));
        assert_eq!(frontier.visited_len(), 1);
        assert_eq!(frontier.next().unwrap().as_str(), "https://example.com/page");
        assert!(frontier.next().is_none());
    }

    #[test]
    fn test_frontier_is_fifo() {
        let mut frontier = Frontier::new("example.com");
        frontier.enqueue(Url::parse("https://example.com/1").unwrap());
        frontier.enqueue(Url::parse("https://example.com/2").unwrap());
        frontier.enqueue(Url::parse("https://example.com/3").unwrap());
        let order: Vec<String> = std::iter::from_fn(|| frontier.next()).map(|u| u.path().to_string()).collect();
        assert_eq!(order, ["/1", "/2", "/3"]);
    }

    #[test]
    fn test_enqueue_asset_dedups_and_classifies() {
        let mut session = test_session(test_scope(&[]));
        let img = Url::parse("https://example.com/img/x.png").unwrap();
        assert!(session.enqueue_asset(img.clone()));
        assert!(!session.enqueue_asset(img));
        // Unclassifiable extensions are dropped before any fetch
        assert!(!session.enqueue_asset(Url::parse("https://example.com/file.xyz").unwrap()));
        assert!(!session.enqueue_asset(Url::parse("https://example.com/about").unwrap()));
        assert_eq!(session.pending_assets(), 1);
    }

    #[test]
    fn test_drain_asset_batch_empties_queue_in_order() {
        let mut session = test_session(test_scope(&[]));
        session.enqueue_asset(Url::parse("https://example.com/a.css").unwrap());
        session.enqueue_asset(Url::parse("https://example.com/b.js").unwrap());
        let batch = session.drain_asset_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].path(), "/a.css");
        assert_eq!(batch[1].path(), "/b.js");
        assert_eq!(session.pending_assets(), 0);
    }

    // The end-to-end frontier walk from the design notes: one seed page
    // linking to /page2 with one image, no aliases.
    #[test]
    fn test_two_page_walk_visits_each_page_once() {
        let discovery = Discovery::new(&test_scope(&[]));
        let mut session = test_session(test_scope(&[]));
        let seed = Url::parse("https://example.com/").unwrap();
        session.enqueue_page(seed.clone());

        let page_one = r#"
            <a href="/page2">next</a>
            <a href="/page2#anchor">same page</a>
            <img src="https://example.com/img/x.png">
        "#;

        let first = session.frontier.next().unwrap();
        assert_eq!(first, seed);
        for link in discovery.page_links(page_one, &first) {
            session.enqueue_page(link);
        }
        for asset in discovery.page_assets(page_one, &first) {
            session.enqueue_asset(asset);
        }

        let second = session.frontier.next().unwrap();
        assert_eq!(second.as_str(), "https://example.com/page2");
        for link in discovery.page_links("<p>no links</p>", &second) {
            session.enqueue_page(link);
        }

        assert!(session.frontier.next().is_none());
        assert_eq!(session.pages_visited(), 2);
        assert_eq!(session.pending_assets(), 1);
    }
}
