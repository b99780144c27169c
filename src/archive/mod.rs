// src/archive/mod.rs
// =============================================================================
// This module archives a mirrored directory into a .zip for handoff.
// =============================================================================

mod zip;

// Re-export the main function from zip.rs
pub use zip::zip_directory;
