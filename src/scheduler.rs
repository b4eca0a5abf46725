// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-flight scrape scheduler.
//!
//! One loop owns the browser session: every tick it acquires a session,
//! navigates, extracts, and publishes the result to the cache. Ticks that
//! fire while a cycle is still running are skipped — overlapping cycles
//! never start and nothing queues up. A failed cycle leaves the previous
//! snapshot in place and the loop simply waits for the next tick; nothing
//! a cycle does can take the process down.

use crate::artifacts::ArtifactStore;
use crate::automation::{acquire_with_fallback, Engine};
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::diff::{diff_snapshots, OddsDelta};
use crate::error::{CycleError, EngineError};
use crate::events::{EventBus, FeedEvent};
use crate::extract::Extractor;
use crate::model::{EngineKind, Snapshot};
use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Attempts at acquiring-and-navigating per cycle: the initial try plus two
/// retries. Resets every cycle.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Counters shared with the status endpoint.
#[derive(Default)]
pub struct SchedulerStats {
    cycles_total: AtomicU64,
    cycles_failed: AtomicU64,
    consecutive_failures: AtomicU64,
    last_cycle_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SchedulerStats {
    fn begin_cycle(&self) -> u64 {
        self.cycles_total.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_success(&self, elapsed_ms: u64) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_cycle_ms.store(elapsed_ms, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn record_failure(&self, detail: String) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(detail);
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn last_cycle_ms(&self) -> u64 {
        self.last_cycle_ms.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub records: usize,
    pub changes: OddsDelta,
    pub engine: EngineKind,
    pub extraction_ms: u64,
    pub total_ms: u64,
}

/// The periodic scrape loop. Exactly one instance exists per process; the
/// PID-file check at startup keeps it that way across processes too.
pub struct Scheduler {
    config: Arc<Config>,
    cache: Arc<SnapshotCache>,
    artifacts: ArtifactStore,
    events: EventBus,
    extractor: Extractor,
    primary: Arc<dyn Engine>,
    fallback: Option<Arc<dyn Engine>>,
    stats: Arc<SchedulerStats>,
    last_persist: Mutex<Option<Instant>>,
}

impl Scheduler {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<SnapshotCache>,
        events: EventBus,
        primary: Arc<dyn Engine>,
        fallback: Option<Arc<dyn Engine>>,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        let artifacts = ArtifactStore::new(
            config.debug_html_dir.clone(),
            config.max_debug_artifacts,
        );
        Self {
            config,
            cache,
            artifacts,
            events,
            extractor: Extractor::new(),
            primary,
            fallback,
            stats,
            last_persist: Mutex::new(None),
        }
    }

    /// Run the loop until `shutdown` is notified, then release the engines.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.config.scrape_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.events.emit(FeedEvent::SchedulerStarted {
            interval_secs: self.config.scrape_interval.as_secs(),
        });
        info!(
            "scheduler started: interval={}s target={}",
            self.config.scrape_interval.as_secs(),
            self.config.target_url
        );

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = self.run_once().await;
                }
            }
        }

        // Persist the latest snapshot and release any held browser before
        // the process exits.
        if let Err(e) = self.cache.save(&self.config.data_dir) {
            warn!("final snapshot persist failed: {e:#}");
        }
        self.primary.shutdown().await;
        if let Some(fallback) = &self.fallback {
            fallback.shutdown().await;
        }
        self.events.emit(FeedEvent::SchedulerStopped {
            cycles_run: self.stats.cycles_total(),
        });
    }

    /// Run exactly one scrape cycle: acquire → navigate → extract → publish.
    ///
    /// Also the entry point for the one-shot `fetch` command and for tests.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let cycle = self.stats.begin_cycle();
        let result = self.run_cycle(cycle).await;

        match &result {
            Ok(report) => {
                self.stats.record_success(report.total_ms);
                self.events.emit(FeedEvent::SnapshotPublished {
                    cycle,
                    records: report.records,
                    changes: report.changes,
                    engine: report.engine.as_str().to_string(),
                    elapsed_ms: report.total_ms,
                });
                info!(
                    "cycle {cycle}: {} records, {} changes, engine={}, {}ms",
                    report.records,
                    report.changes.total(),
                    report.engine.as_str(),
                    report.total_ms
                );
            }
            Err(e) => {
                // Page-bearing failures wrote their artifact in run_cycle;
                // everything else gets a stub naming the failure.
                if !e.wants_page_artifact() {
                    if let Err(artifact_err) =
                        self.artifacts.capture_failure(Utc::now(), &e.to_string())
                    {
                        warn!("debug artifact write failed: {artifact_err:#}");
                    }
                }
                self.stats.record_failure(e.to_string());
                self.events.emit(FeedEvent::CycleFailed {
                    cycle,
                    reason: e.label().to_string(),
                    detail: e.to_string(),
                });
                warn!("cycle {cycle} failed: {e}");
            }
        }

        result
    }

    async fn run_cycle(&self, cycle: u64) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let url = self.config.target_url.as_str();
        let mut last_err = CycleError::Engine(EngineError::Unavailable(
            "no acquisition attempt made".to_string(),
        ));

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            // Acquiring
            let acquired =
                match acquire_with_fallback(self.primary.as_ref(), self.fallback.as_deref()).await
                {
                    Ok(acquired) => acquired,
                    Err(e) => {
                        last_err = e.into();
                        continue;
                    }
                };
            if acquired.fell_back {
                self.events.emit(FeedEvent::EngineFallback {
                    from: self.primary.kind().as_str().to_string(),
                    to: acquired.engine.as_str().to_string(),
                });
            }

            // Navigating. A timed-out session is in an unknown state and is
            // discarded here, never reused.
            let mut session = acquired.session;
            let doc = match session.navigate(url, self.config.navigation_timeout).await {
                Ok(doc) => doc,
                Err(e) => {
                    session.close().await;
                    last_err = e.into();
                    continue;
                }
            };
            session.close().await;

            // Extracting, under its own budget and off the async threads.
            let extraction_started = Instant::now();
            let extractor = self.extractor.clone();
            let html = doc.html;
            let extracted = tokio::time::timeout(
                self.config.extraction_timeout,
                tokio::task::spawn_blocking(move || {
                    let result = extractor.extract(&html);
                    (result, html)
                }),
            )
            .await;

            let (result, html) = match extracted {
                Ok(Ok(pair)) => pair,
                Ok(Err(join_err)) => {
                    return Err(CycleError::Internal(join_err.to_string()));
                }
                Err(_) => {
                    return Err(CycleError::ExtractionTimeout(self.config.extraction_timeout));
                }
            };
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    // Layout drift or unparseable content: keep the page
                    // for offline diagnosis. Best-effort only.
                    if let Err(artifact_err) = self.artifacts.capture_page(Utc::now(), &html) {
                        warn!("debug artifact write failed: {artifact_err:#}");
                    }
                    return Err(e.into());
                }
            };
            let extraction_ms = extraction_started.elapsed().as_millis() as u64;

            // Publishing: a single atomic swap; the prior snapshot stays
            // visible to readers that already hold it.
            let snapshot = Snapshot {
                records,
                captured_at: Utc::now(),
                source_engine: acquired.engine,
                extraction_ms,
            };
            let changes = match self.cache.get_raw() {
                Some(prev) => diff_snapshots(&prev, &snapshot),
                None => OddsDelta {
                    added: snapshot.records.len(),
                    ..OddsDelta::default()
                },
            };
            let record_count = snapshot.records.len();
            self.cache.put(snapshot);
            self.maybe_persist();

            return Ok(CycleReport {
                cycle,
                records: record_count,
                changes,
                engine: acquired.engine,
                extraction_ms,
                total_ms: started.elapsed().as_millis() as u64,
            });
        }

        Err(last_err)
    }

    /// Write the snapshot to disk at most once per persist interval, so a
    /// 1-second scrape cadence does not turn into 1-second disk churn.
    fn maybe_persist(&self) {
        let mut last = self.last_persist.lock().unwrap_or_else(|e| e.into_inner());
        let due = match *last {
            Some(at) => at.elapsed() >= self.config.persist_interval,
            None => true,
        };
        if !due {
            return;
        }
        if let Err(e) = self.cache.save(&self.config.data_dir) {
            warn!("snapshot persist failed: {e:#}");
        } else {
            *last = Some(Instant::now());
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE * 2u32.saturating_pow(attempt - 1);
    let jitter = rand::thread_rng().gen_range(0..100u64);
    exp + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows() {
        for _ in 0..10 {
            let first = backoff_delay(1);
            let second = backoff_delay(2);
            assert!(first >= Duration::from_millis(250));
            assert!(first < Duration::from_millis(400));
            assert!(second >= Duration::from_millis(500));
            assert!(second < Duration::from_millis(650));
        }
    }

    #[test]
    fn test_stats_transitions() {
        let stats = SchedulerStats::default();
        assert_eq!(stats.begin_cycle(), 1);
        stats.record_failure("boom".to_string());
        stats.record_failure("boom again".to_string());
        assert_eq!(stats.cycles_failed(), 2);
        assert_eq!(stats.consecutive_failures(), 2);
        assert_eq!(stats.last_error().as_deref(), Some("boom again"));

        stats.record_success(42);
        assert_eq!(stats.consecutive_failures(), 0);
        assert_eq!(stats.last_cycle_ms(), 42);
        assert!(stats.last_error().is_none());
        // Total failures survive a success; only the streak resets.
        assert_eq!(stats.cycles_failed(), 2);
    }
}
