// src/mirror/mod.rs
// =============================================================================
// This module is the crawl-and-rewrite engine.
//
// Submodules:
// - session: Site Scope, the Frontier, all per-run mutable state, run loop
// - discover: finds page links and asset references in HTML and CSS
// - rewrite: classifies assets and rewrites in-scope URLs to local paths
// - fetch: downloads pages/assets and persists them to the output tree
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

mod discover;
mod fetch;
mod rewrite;
mod session;

// Re-export public items from submodules
// This lets users write `mirror::mirror_site()` instead of
// `mirror::session::mirror_site()`
pub use session::{mirror_site, CrawlConfig, RunSummary};
