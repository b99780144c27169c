// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// clap also generates the `help` subcommand and --help output for us, so
// running with no recognized command prints usage and exits non-zero.
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Enums: Types that can be one of several variants
// - Derive macros: Automatically generate code for our types
// =============================================================================

use clap::{Parser, Subcommand};

// The browser user-agent sent with every request unless overridden.
// Some sites refuse requests without a familiar-looking one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version = "0.1.0",
    about = "Mirror a website into a local, browser-renderable copy",
    long_about = "site-mirror crawls a website breadth-first, downloads its pages and assets \
                  (scripts, styles, images, fonts, icons), rewrites absolute URLs into a local \
                  relative layout, and saves everything under ./sites/<domain>/."
)]
pub struct Cli {
    // The #[command(subcommand)] attribute tells clap that this field
    // will hold one of the subcommands defined in the Commands enum
    #[command(subcommand)]
    pub command: Commands,
}

// This enum defines our subcommands (copy, serve, zip)
//
// Each variant represents a different subcommand the user can run
// The fields inside each variant become the arguments for that subcommand
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror a website into ./sites/<domain>/
    ///
    /// Example: site-mirror copy https://example.com https://cdn.example.com
    Copy {
        /// Website URL to start crawling from (e.g., https://example.com)
        url: String,

        /// Additional hostnames (or URLs) treated as the primary domain
        /// when rewriting asset links, e.g. a CDN or www. variant.
        /// Aliases are rewritten only, never crawled as pages.
        #[arg(value_name = "ALIAS")]
        aliases: Vec<String>,

        /// Delay in milliseconds between successive request starts
        #[arg(long, default_value_t = 300)]
        throttle: u64,

        /// Maximum concurrent asset downloads
        #[arg(long, default_value_t = 5)]
        concurrent: usize,

        /// Custom user-agent header sent with every request
        #[arg(long, default_value = DEFAULT_USER_AGENT)]
        user_agent: String,

        /// Output the run summary in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Serve a previously mirrored directory over local HTTP
    ///
    /// Example: site-mirror serve example.com --port 8000
    Serve {
        /// Directory under ./sites/ to serve (a leading http:// or
        /// https:// is stripped, so the original URL works too)
        directory: String,

        /// Port to serve on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },

    /// Zip a mirrored directory into <directory>.zip
    ///
    /// Example: site-mirror zip sites/example.com
    Zip {
        /// Directory to archive
        directory: String,
    },
}
