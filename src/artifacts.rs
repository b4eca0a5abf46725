//! Debug artifact store — page captures from failed scrape cycles.
//!
//! Artifacts are named by cycle timestamp so filenames sort chronologically
//! and never collide. The directory is bounded: after each write the oldest
//! files beyond the cap are evicted. Everything here is best-effort; a
//! failed artifact write is logged by the caller, never escalated.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bounded, append-only store of failure-cycle page captures.
pub struct ArtifactStore {
    dir: PathBuf,
    max_files: usize,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf, max_files: usize) -> Self {
        Self { dir, max_files }
    }

    /// Write the failing cycle's page HTML.
    pub fn capture_page(&self, captured_at: DateTime<Utc>, html: &str) -> Result<PathBuf> {
        self.write(captured_at, html)
    }

    /// Write a stub artifact for failures with no document (e.g. navigation
    /// timeouts), recording what went wrong instead.
    pub fn capture_failure(&self, captured_at: DateTime<Utc>, detail: &str) -> Result<PathBuf> {
        let body = format!("<!-- scrape failed, no document captured: {detail} -->\n");
        self.write(captured_at, &body)
    }

    fn write(&self, captured_at: DateTime<Utc>, body: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let name = format!("page-{}.html", captured_at.format("%Y%m%dT%H%M%S%3fZ"));
        let path = self.dir.join(name);
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.prune()?;
        Ok(path)
    }

    /// Delete the oldest artifacts until the directory is within bounds.
    /// Timestamped names sort chronologically, so name order is age order.
    fn prune(&self) -> Result<()> {
        let mut files = list_artifacts(&self.dir)?;
        if files.len() <= self.max_files {
            return Ok(());
        }
        files.sort();
        let excess = files.len() - self.max_files;
        for path in files.into_iter().take(excess) {
            debug!("evicting debug artifact {}", path.display());
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }
}

fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .flatten()
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("html") {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, secs).unwrap()
    }

    #[test]
    fn test_capture_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), 10);
        let path = store.capture_page(ts(0), "<html>broken</html>").unwrap();
        assert!(path.exists());
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("broken"));
    }

    #[test]
    fn test_failure_stub() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), 10);
        let path = store
            .capture_failure(ts(1), "navigation timed out after 30s")
            .unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("navigation timed out"));
    }

    #[test]
    fn test_oldest_first_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), 3);
        for i in 0..5u32 {
            store.capture_page(ts(i), "<html></html>").unwrap();
        }
        let mut remaining = list_artifacts(dir.path()).unwrap();
        remaining.sort();
        assert_eq!(remaining.len(), 3);
        // The two oldest captures (seconds 0 and 1) are gone.
        let names: Vec<String> = remaining
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names[0].contains("120002"));
    }

    #[test]
    fn test_filenames_unique_per_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), 10);
        let a = store.capture_page(ts(0), "a").unwrap();
        let b = store.capture_page(ts(1), "b").unwrap();
        assert_ne!(a, b);
    }
}
