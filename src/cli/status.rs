//! Show status of the running oddsfeed daemon.

use crate::cli::start::check_already_running;
use anyhow::{Context, Result};
use std::time::Duration;

/// Report whether the daemon is alive and, if reachable, its runtime status.
pub async fn run(port: u16) -> Result<()> {
    let Some(pid) = check_already_running() else {
        println!("oddsfeed is not running.");
        return Ok(());
    };
    println!("oddsfeed is running (PID {pid}).");

    let url = format!("http://127.0.0.1:{port}/api/v1/status");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .context("failed to build HTTP client")?;

    match client.get(&url).send().await {
        Ok(response) => {
            let body: serde_json::Value = response
                .json()
                .await
                .context("status endpoint returned invalid JSON")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(e) => {
            println!("Could not reach the API on port {port}: {e}");
        }
    }
    Ok(())
}
