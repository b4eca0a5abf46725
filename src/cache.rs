// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Latest-snapshot cache.
//!
//! Holds at most one snapshot at a time behind an `Arc` that the scheduler
//! swaps in whole. Readers either see a fully formed snapshot or the
//! explicit no-data state — never a half-written one. The write lock is
//! held only for the pointer swap, so `get` never waits on a scrape.

use crate::model::{Snapshot, Staleness};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

const SNAPSHOT_FILE: &str = "snapshot_latest.json";

/// A read of the cache: the snapshot plus its age classification.
#[derive(Clone)]
pub struct CachedSnapshot {
    pub snapshot: Arc<Snapshot>,
    pub staleness: Staleness,
}

/// Single-writer, multi-reader snapshot cache.
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
    freshness_threshold: Duration,
}

impl SnapshotCache {
    pub fn new(freshness_threshold: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            freshness_threshold,
        }
    }

    /// Current snapshot with staleness classification, or `None` before the
    /// first successful scrape.
    pub fn get(&self) -> Option<CachedSnapshot> {
        let snapshot = self.get_raw()?;
        let age = Utc::now()
            .signed_duration_since(snapshot.captured_at)
            .to_std()
            .unwrap_or_default();
        let staleness = if age < self.freshness_threshold {
            Staleness::Fresh
        } else {
            Staleness::Stale
        };
        Some(CachedSnapshot {
            snapshot,
            staleness,
        })
    }

    /// Current snapshot without classification. Used by the scheduler when
    /// diffing against the previous cycle.
    pub fn get_raw(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the cached snapshot. Called only by the scheduler.
    pub fn put(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let arc = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(arc.clone());
        arc
    }

    /// Persist the current snapshot to `dir` as JSON, via a temp file and
    /// atomic rename so a crash mid-write never corrupts the stored copy.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let Some(snapshot) = self.get_raw() else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        let path = dir.join(SNAPSHOT_FILE);
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let body = serde_json::to_vec(snapshot.as_ref()).context("failed to encode snapshot")?;
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        Ok(())
    }

    /// Load a previously persisted snapshot, if one exists. Lets a restarted
    /// process serve stale-but-available data before its first scrape.
    /// Returns whether anything was restored.
    pub fn restore(&self, dir: &Path) -> Result<bool> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(false);
        }
        let body = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot: Snapshot =
            serde_json::from_slice(&body).context("persisted snapshot is not valid JSON")?;
        info!(
            "restored persisted snapshot: {} records captured at {}",
            snapshot.records.len(),
            snapshot.captured_at
        );
        self.put(snapshot);
        Ok(true)
    }
}
