// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Dispatch to the appropriate subcommand handler
// 3. Print a run summary (table or JSON)
// 4. Exit with proper code (0 = clean run, 1 = run finished with failed
//    pages/assets, 2 = fatal error)
//
// Rust concepts used:
// - async/await: Because the crawl is network-bound
// - Result<T, E>: For error handling (T = success type, E = error type)
// - match: Pattern matching to handle different subcommands
// =============================================================================

// Module declarations - tells Rust about our other source files
mod archive; // src/archive/ - zipping a mirrored directory
mod cli; // src/cli.rs - command-line parsing
mod mirror; // src/mirror/ - the crawl-and-rewrite engine
mod serve; // src/serve/ - serving a mirrored directory

// Import items we need from our modules
use clap::Parser; // Parser trait enables the parse() method
use cli::{Cli, Commands};
use mirror::{CrawlConfig, RunSummary};

// anyhow::Result is like std::result::Result but simpler for applications
// It lets us return any error type with the ? operator
use anyhow::Result;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// The #[tokio::main] attribute transforms our async main into a real main
// function. It creates a tokio runtime and runs our async code inside it.
#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // An unrecoverable error (bad seed URL, filesystem failure, ...)
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    // Parse command-line arguments into our Cli struct
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();

    match cli.command {
        Commands::Copy {
            url,
            aliases,
            throttle,
            concurrent,
            user_agent,
            json,
        } => handle_copy(&url, &aliases, throttle, concurrent, user_agent, json).await,
        Commands::Serve { directory, port } => handle_serve(&directory, port).await,
        Commands::Zip { directory } => handle_zip(&directory),
    }
}

// Handles the 'copy' subcommand: runs the crawl-and-rewrite engine
async fn handle_copy(
    url: &str,
    aliases: &[String],
    throttle: u64,
    concurrent: usize,
    user_agent: String,
    json: bool,
) -> Result<i32> {
    println!("🔍 Mirroring website: {}", url);
    if !aliases.is_empty() {
        println!("🔗 Alias domains: {}", aliases.join(", "));
    }

    // Ctrl-C raises the cancellation flag; queues stop admitting work and
    // in-flight requests finish, keeping whatever was already written
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Ctrl-C received, finishing in-flight requests...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let config = CrawlConfig {
        throttle: Duration::from_millis(throttle),
        concurrent,
        user_agent,
        cancel,
    };

    let summary = mirror::mirror_site(url, aliases, &config).await?;
    print_summary(&summary, json)?;

    // Exit code 1 flags a run that finished but left gaps
    if summary.failure_count() > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Handles the 'serve' subcommand (external collaborator of the engine)
async fn handle_serve(directory: &str, port: u16) -> Result<i32> {
    serve::serve_directory(directory, port).await?;
    Ok(0)
}

// Handles the 'zip' subcommand (external collaborator of the engine)
fn handle_zip(directory: &str) -> Result<i32> {
    archive::zip_directory(directory)?;
    Ok(0)
}

// Prints the run summary either as a small table or as JSON
fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        // Serialize the summary to JSON and print
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
    } else {
        println!("\n📊 Summary:");
        println!("   ✅ Pages saved:   {}", summary.pages_saved);
        println!("   ❌ Pages failed:  {}", summary.pages_failed);
        println!("   ✅ Assets saved:  {}", summary.assets_saved);
        println!("   ❌ Assets failed: {}", summary.assets_failed);
    }
    Ok(())
}
