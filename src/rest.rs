// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API.
//!
//! Read-only view over the snapshot cache. Requests never trigger a scrape;
//! the scheduler runs on its own cadence and the API only reads whatever
//! snapshot is current. Data endpoints sit behind per-client token-bucket
//! admission.

use crate::cache::SnapshotCache;
use crate::events::EventBus;
use crate::model::EngineKind;
use crate::ratelimit::{Decision, RateLimiter};
use crate::scheduler::SchedulerStats;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for all handlers.
pub struct ApiState {
    pub cache: Arc<SnapshotCache>,
    pub limiter: RateLimiter,
    pub events: EventBus,
    pub stats: Arc<SchedulerStats>,
    pub started_at: Instant,
    pub preferred_engine: EngineKind,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/odds", get(handle_odds))
        .route("/api/v1/odds/:match_id", get(handle_match))
        .route("/api/v1/events", get(events_sse))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is notified.
pub async fn start(port: u16, state: Arc<ApiState>, shutdown: Arc<Notify>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.notified().await })
    .await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

/// Resolve the client identity for rate limiting: explicit client header,
/// then forwarded-for (first hop), then the peer address.
fn client_identity(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(client) = headers
        .get("x-api-client")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return client.to_string();
    }
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limited_response(retry_after: Duration) -> axum::response::Response {
    let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, secs.to_string())],
        Json(json!({
            "error": "rate limited",
            "retry_after_seconds": secs,
        })),
    )
        .into_response()
}

fn no_data_response() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "no data yet",
            "detail": "no successful scrape has completed since startup",
        })),
    )
        .into_response()
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Operator status endpoint — deliberately outside the rate limit.
async fn handle_status(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let cached = state.cache.get();
    Json(json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "preferred_engine": state.preferred_engine.as_str(),
        "last_captured_at": cached.as_ref().map(|c| c.snapshot.captured_at.to_rfc3339()),
        "staleness": cached.as_ref().map(|c| c.staleness.as_str()),
        "records": cached.as_ref().map(|c| c.snapshot.records.len()).unwrap_or(0),
        "cycles_total": state.stats.cycles_total(),
        "cycles_failed": state.stats.cycles_failed(),
        "consecutive_failures": state.stats.consecutive_failures(),
        "last_cycle_ms": state.stats.last_cycle_ms(),
        "last_error": state.stats.last_error(),
        "tracked_clients": state.limiter.tracked_clients(),
    }))
}

async fn handle_odds(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> axum::response::Response {
    let client = client_identity(&headers, Some(addr));
    match state.limiter.check(&client) {
        Decision::Limited { retry_after } => rate_limited_response(retry_after),
        Decision::Admitted => match state.cache.get() {
            None => no_data_response(),
            Some(cached) => Json(json!({
                "records": cached.snapshot.records,
                "count": cached.snapshot.records.len(),
                "captured_at": cached.snapshot.captured_at.to_rfc3339(),
                "staleness": cached.staleness.as_str(),
                "source_engine": cached.snapshot.source_engine.as_str(),
                "extraction_ms": cached.snapshot.extraction_ms,
            }))
            .into_response(),
        },
    }
}

async fn handle_match(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(match_id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let client = client_identity(&headers, Some(addr));
    match state.limiter.check(&client) {
        Decision::Limited { retry_after } => rate_limited_response(retry_after),
        Decision::Admitted => match state.cache.get() {
            None => no_data_response(),
            Some(cached) => match cached.snapshot.record(&match_id) {
                Some(record) => Json(json!({
                    "record": record,
                    "captured_at": cached.snapshot.captured_at.to_rfc3339(),
                    "staleness": cached.staleness.as_str(),
                }))
                .into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "match not found", "match_id": match_id })),
                )
                    .into_response(),
            },
        },
    }
}

/// Server-Sent Events stream of scheduler events.
async fn events_sse(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some events due to slow consumer — continue
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "10.1.2.3:4567".parse().unwrap()
    }

    #[test]
    fn test_identity_prefers_client_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-client", "dashboard-7".parse().unwrap());
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        assert_eq!(client_identity(&headers, Some(addr())), "dashboard-7");
    }

    #[test]
    fn test_identity_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 198.51.100.2".parse().unwrap(),
        );
        assert_eq!(client_identity(&headers, Some(addr())), "203.0.113.9");
    }

    #[test]
    fn test_identity_falls_back_to_peer_ip() {
        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(addr())), "10.1.2.3");
    }
}
