//! Shared utilities: logging, key normalization, bounds.

use std::path::Path;
use tracing::Level;

/// Initialize tracing with env filter. Safe to call once at startup.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Normalize a faction or shell key for lookup (lowercase, trim).
pub fn normalize_id(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Check a file exists and is within the size limit; returns its size.
pub fn check_file_size(path: &Path, max_bytes: usize) -> Result<u64, String> {
    let meta = std::fs::metadata(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if !meta.is_file() {
        return Err(format!("not a file: {}", path.display()));
    }
    let size = meta.len();
    if size > max_bytes as u64 {
        return Err(format!(
            "file too large: {} ({} bytes, max {})",
            path.display(),
            size,
            max_bytes
        ));
    }
    Ok(size)
}
