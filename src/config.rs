// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Built once from the environment at process start and passed by reference
//! into the scheduler and the API layer — core logic never reads the
//! environment itself.

use crate::model::EngineKind;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_TARGET_URL: &str = "https://www.betbhai.io/";
const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 5;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FRESHNESS_THRESHOLD_SECS: u64 = 30;
const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 60;
const DEFAULT_RATE_BURST: u32 = 10;
const DEFAULT_MAX_TRACKED_CLIENTS: usize = 1024;
const DEFAULT_MAX_DEBUG_ARTIFACTS: usize = 50;
const DEFAULT_PERSIST_INTERVAL_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 8000;

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream page holding the live odds.
    pub target_url: Url,
    /// CSS selector whose appearance marks the page as rendered. The
    /// browser engine polls for it after navigation.
    pub ready_selector: Option<String>,
    /// Preferred automation engine; the other one is the fallback.
    pub preferred_engine: EngineKind,
    /// Cadence of the scrape loop.
    pub scrape_interval: Duration,
    /// Deadline for a single navigation attempt.
    pub navigation_timeout: Duration,
    /// Budget for parsing a fetched document.
    pub extraction_timeout: Duration,
    /// Snapshots older than this are classified `Stale`.
    pub freshness_threshold: Duration,
    /// Sustained per-client admission rate.
    pub max_requests_per_minute: u32,
    /// Token-bucket capacity (burst size) per client.
    pub rate_burst: u32,
    /// Cap on distinct client identities tracked by the rate limiter.
    pub max_tracked_clients: usize,
    /// Directory for the persisted latest snapshot.
    pub data_dir: PathBuf,
    /// Directory for failure-cycle page captures.
    pub debug_html_dir: PathBuf,
    /// Artifact-directory size bound; oldest files evicted beyond it.
    pub max_debug_artifacts: usize,
    /// Minimum interval between snapshot writes to disk.
    pub persist_interval: Duration,
    /// HTTP listen port.
    pub port: u16,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Config {
    /// Read configuration from the environment and validate it.
    pub fn from_env() -> Result<Self> {
        let target_url = read_env_string("TARGET_URL")
            .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let target_url = Url::parse(&target_url)
            .with_context(|| format!("TARGET_URL is not a valid URL: {target_url}"))?;

        let preferred_engine = match read_env_string("ODDSFEED_ENGINE").as_deref() {
            Some("static") => EngineKind::Static,
            Some("chromium") | None => EngineKind::Chromium,
            Some(other) => bail!("ODDSFEED_ENGINE must be 'chromium' or 'static', got '{other}'"),
        };

        let cfg = Self {
            target_url,
            ready_selector: Some(
                read_env_string("READY_SELECTOR")
                    .unwrap_or_else(|| ".inplay-item-list".to_string()),
            ),
            preferred_engine,
            scrape_interval: Duration::from_secs(read_env_u64(
                "SCRAPE_INTERVAL",
                DEFAULT_SCRAPE_INTERVAL_SECS,
            )),
            navigation_timeout: Duration::from_secs(read_env_u64(
                "NAVIGATION_TIMEOUT",
                DEFAULT_NAVIGATION_TIMEOUT_SECS,
            )),
            extraction_timeout: Duration::from_secs(read_env_u64(
                "EXTRACTION_TIMEOUT",
                DEFAULT_EXTRACTION_TIMEOUT_SECS,
            )),
            freshness_threshold: Duration::from_secs(read_env_u64(
                "FRESHNESS_THRESHOLD",
                DEFAULT_FRESHNESS_THRESHOLD_SECS,
            )),
            max_requests_per_minute: read_env_u32(
                "MAX_CLIENTS_PER_MINUTE",
                DEFAULT_MAX_REQUESTS_PER_MINUTE,
            ),
            rate_burst: read_env_u32("RATE_BURST", DEFAULT_RATE_BURST),
            max_tracked_clients: read_env_usize(
                "MAX_TRACKED_CLIENTS",
                DEFAULT_MAX_TRACKED_CLIENTS,
            ),
            data_dir: PathBuf::from(
                read_env_string("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            ),
            debug_html_dir: PathBuf::from(
                read_env_string("DEBUG_HTML_DIR").unwrap_or_else(|| "debug_html".to_string()),
            ),
            max_debug_artifacts: read_env_usize(
                "MAX_DEBUG_ARTIFACTS",
                DEFAULT_MAX_DEBUG_ARTIFACTS,
            ),
            persist_interval: Duration::from_secs(read_env_u64(
                "PERSIST_INTERVAL",
                DEFAULT_PERSIST_INTERVAL_SECS,
            )),
            port: read_env_u16("PORT", DEFAULT_PORT),
            log_json: read_env_string("ODDSFEED_LOG_JSON").as_deref() == Some("1"),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field invariants. Called by `from_env`; exposed for
    /// programmatically built configs.
    pub fn validate(&self) -> Result<()> {
        if self.scrape_interval < Duration::from_secs(1) {
            bail!("SCRAPE_INTERVAL must be at least 1 second");
        }
        if self.navigation_timeout.is_zero() || self.extraction_timeout.is_zero() {
            bail!("NAVIGATION_TIMEOUT and EXTRACTION_TIMEOUT must be non-zero");
        }
        if self.max_requests_per_minute == 0 {
            bail!("MAX_CLIENTS_PER_MINUTE must be at least 1");
        }
        if self.rate_burst == 0 {
            bail!("RATE_BURST must be at least 1");
        }
        if self.max_tracked_clients == 0 {
            bail!("MAX_TRACKED_CLIENTS must be at least 1");
        }
        if self.max_debug_artifacts == 0 {
            bail!("MAX_DEBUG_ARTIFACTS must be at least 1");
        }
        match self.target_url.scheme() {
            "http" | "https" => {}
            other => bail!("TARGET_URL scheme must be http or https, got '{other}'"),
        }
        Ok(())
    }

    /// Per-client refill rate in tokens per second.
    pub fn refill_per_sec(&self) -> f64 {
        f64::from(self.max_requests_per_minute) / 60.0
    }

    /// A config with all defaults pointed at the given URL. Used by the
    /// one-shot fetch command and tests.
    pub fn with_target(target_url: Url) -> Self {
        Self {
            target_url,
            ready_selector: Some(".inplay-item-list".to_string()),
            preferred_engine: EngineKind::Chromium,
            scrape_interval: Duration::from_secs(DEFAULT_SCRAPE_INTERVAL_SECS),
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            freshness_threshold: Duration::from_secs(DEFAULT_FRESHNESS_THRESHOLD_SECS),
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            rate_burst: DEFAULT_RATE_BURST,
            max_tracked_clients: DEFAULT_MAX_TRACKED_CLIENTS,
            data_dir: PathBuf::from("data"),
            debug_html_dir: PathBuf::from("debug_html"),
            max_debug_artifacts: DEFAULT_MAX_DEBUG_ARTIFACTS,
            persist_interval: Duration::from_secs(DEFAULT_PERSIST_INTERVAL_SECS),
            port: DEFAULT_PORT,
            log_json: false,
        }
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_u16(name: &str, default_value: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default_value)
}
