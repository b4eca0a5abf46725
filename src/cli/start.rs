//! Start the oddsfeed daemon: scrape scheduler plus HTTP API.

use crate::automation::build_engines;
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::events::EventBus;
use crate::ratelimit::RateLimiter;
use crate::rest::{self, ApiState};
use crate::scheduler::{Scheduler, SchedulerStats};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Get the PID file path.
pub fn pid_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".oddsfeed/oddsfeed.pid")
}

/// Check if oddsfeed is already running. Returns the PID if so.
///
/// Exactly one scheduler may exist per deployment — two scrapers would race
/// on the upstream target and on the debug/data directories — so startup is
/// refused while a live instance holds the PID file.
pub fn check_already_running() -> Option<i32> {
    let pid_path = pid_file_path();
    if !pid_path.exists() {
        return None;
    }
    let pid_str = std::fs::read_to_string(&pid_path).ok()?;
    let pid: i32 = pid_str.trim().parse().ok()?;

    // Check if the process is actually alive
    #[cfg(unix)]
    {
        let output = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output();
        if matches!(output, Ok(o) if o.status.success()) {
            return Some(pid);
        }
    }

    // Stale PID file — clean up
    let _ = std::fs::remove_file(&pid_path);
    None
}

/// Start the daemon: write PID, spawn the scheduler, serve the API.
pub async fn run(port_override: Option<u16>) -> Result<()> {
    if let Some(pid) = check_already_running() {
        bail!("oddsfeed is already running (PID {pid}); use 'oddsfeed stop' first");
    }

    let mut config = Config::from_env()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    let config = Arc::new(config);

    init_tracing(config.log_json);
    info!("starting oddsfeed v{}", env!("CARGO_PKG_VERSION"));

    // Write PID file
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::write(&pid_path, std::process::id().to_string())
        .context("failed to write PID file")?;

    // Restore the persisted snapshot so a restart serves stale-but-available
    // data before its first scrape completes.
    let cache = Arc::new(SnapshotCache::new(config.freshness_threshold));
    if let Err(e) = cache.restore(&config.data_dir) {
        warn!("could not restore persisted snapshot: {e:#}");
    }

    let events = EventBus::new(64);
    let stats = Arc::new(SchedulerStats::default());

    let (primary, fallback) =
        build_engines(&config).context("no usable automation engine")?;

    let scheduler = Scheduler::new(
        Arc::clone(&config),
        Arc::clone(&cache),
        events.clone(),
        primary,
        fallback,
        Arc::clone(&stats),
    );

    let state = Arc::new(ApiState {
        cache: Arc::clone(&cache),
        limiter: RateLimiter::new(
            config.rate_burst,
            config.refill_per_sec(),
            config.max_tracked_clients,
        ),
        events: events.clone(),
        stats: Arc::clone(&stats),
        started_at: Instant::now(),
        preferred_engine: config.preferred_engine,
    });

    // Separate shutdown handles so neither consumer can miss the signal.
    let scheduler_shutdown = Arc::new(Notify::new());
    let api_shutdown = Arc::new(Notify::new());
    {
        let scheduler_shutdown = Arc::clone(&scheduler_shutdown);
        let api_shutdown = Arc::clone(&api_shutdown);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            scheduler_shutdown.notify_one();
            api_shutdown.notify_one();
        });
    }

    let scheduler_task = {
        let shutdown = Arc::clone(&scheduler_shutdown);
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    let serve_result = rest::start(config.port, state, api_shutdown).await;

    // Stop the scheduler as well when the server quits early (bind failure),
    // then let it finish its cleanup (persist + browser release) before the
    // process exits. The notify permit makes this a no-op after ctrl-c.
    scheduler_shutdown.notify_one();
    if let Err(e) = scheduler_task.await {
        warn!("scheduler task ended abnormally: {e}");
    }
    let _ = std::fs::remove_file(&pid_path);
    info!("oddsfeed stopped");

    serve_result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("oddsfeed=info".parse().unwrap());
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
