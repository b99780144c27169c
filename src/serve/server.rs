// src/serve/server.rs
// =============================================================================
// Static file server for a mirrored site.
//
// We use axum with tower-http's ServeDir, which handles index.html
// resolution, content types and range requests for us. The directory
// argument may be given as the original URL; any http:// or https:// prefix
// is stripped so `serve https://example.com` finds ./sites/example.com.
//
// Rust concepts:
// - Router::fallback_service: every request falls through to the file tree
// - tokio::net::TcpListener + axum::serve: the standard axum serve loop
// =============================================================================

use anyhow::{bail, Result};
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use tower_http::services::ServeDir;

/// Serves ./sites/<directory> on localhost at the given port.
/// A missing directory is an error; the caller exits non-zero.
pub async fn serve_directory(directory: &str, port: u16) -> Result<()> {
    let site = strip_scheme(directory);
    let root = Path::new("sites").join(site);
    if !root.is_dir() {
        bail!("directory \"{}\" not found under ./sites/", site);
    }

    let app = Router::new().fallback_service(ServeDir::new(&root));
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    println!("🌐 Serving \"{}\" at http://{}", root.display(), addr);
    println!("   Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// Accepts "example.com" and "https://example.com" alike
fn strip_scheme(directory: &str) -> &str {
    directory
        .strip_prefix("https://")
        .or_else(|| directory.strip_prefix("http://"))
        .unwrap_or(directory)
}
