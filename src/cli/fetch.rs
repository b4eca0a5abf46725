//! One-shot scrape: run a single cycle and print the snapshot as JSON.
//!
//! Useful for checking selectors against the live upstream without starting
//! the daemon. No rate limiting, no persistence loop — just one cycle.

use crate::automation::build_engines;
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::events::EventBus;
use crate::model::EngineKind;
use crate::scheduler::{Scheduler, SchedulerStats};
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use url::Url;

pub async fn run(url_override: Option<&str>, engine_override: Option<&str>) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = url_override {
        config.target_url = Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
    }
    if let Some(engine) = engine_override {
        config.preferred_engine = match engine {
            "chromium" => EngineKind::Chromium,
            "static" => EngineKind::Static,
            other => bail!("unknown engine '{other}' (expected 'chromium' or 'static')"),
        };
    }
    let config = Arc::new(config);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cache = Arc::new(SnapshotCache::new(config.freshness_threshold));
    let (primary, fallback) = build_engines(&config).context("no usable automation engine")?;
    let scheduler = Scheduler::new(
        Arc::clone(&config),
        Arc::clone(&cache),
        EventBus::new(16),
        Arc::clone(&primary),
        fallback.clone(),
        Arc::new(SchedulerStats::default()),
    );

    let result = scheduler.run_once().await;

    primary.shutdown().await;
    if let Some(fb) = &fallback {
        fb.shutdown().await;
    }

    let report = result.map_err(|e| anyhow!("scrape failed: {e}"))?;
    let cached = cache
        .get()
        .ok_or_else(|| anyhow!("cycle reported success but the cache is empty"))?;
    println!("{}", serde_json::to_string_pretty(cached.snapshot.as_ref())?);
    eprintln!(
        "  {} records via {} in {}ms",
        report.records,
        report.engine.as_str(),
        report.total_ms
    );
    Ok(())
}
