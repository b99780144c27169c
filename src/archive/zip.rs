// src/archive/zip.rs
// =============================================================================
// Zips a mirrored directory by shelling out to the system `zip` binary,
// producing <directory>.zip next to it. The archive step is a thin wrapper;
// compression itself stays the system tool's job.
// =============================================================================

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Archives `directory` into `<directory>.zip`.
/// The directory must exist; a failed `zip` invocation is an error.
pub fn zip_directory(directory: &str) -> Result<PathBuf> {
    if !Path::new(directory).is_dir() {
        bail!("directory \"{}\" not found", directory);
    }
    let output = PathBuf::from(format!("{}.zip", directory.trim_end_matches('/')));

    println!("🗜️  Zipping folder: {}", directory);
    let status = Command::new("zip")
        .arg("-r")
        .arg(&output)
        .arg(directory)
        .status()
        .context("failed to run the system `zip` binary")?;
    if !status.success() {
        bail!("zip exited with status {}", status);
    }

    println!("✅ Zipped to {}", output.display());
    Ok(output)
}
