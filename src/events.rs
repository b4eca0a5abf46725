// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Feed event bus — typed events from the scrape scheduler.
//!
//! The bus is a `tokio::sync::broadcast` channel carrying [`FeedEvent`]
//! values. Any consumer — the SSE endpoint, log sinks, tests — subscribes
//! independently. With no subscribers, events are silently dropped.

use crate::diff::OddsDelta;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the scheduler emits. Serialized to JSON for SSE streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedEvent {
    /// The scrape loop has started ticking.
    SchedulerStarted { interval_secs: u64 },

    /// A cycle completed and a new snapshot replaced the cached one.
    SnapshotPublished {
        cycle: u64,
        records: usize,
        changes: OddsDelta,
        engine: String,
        elapsed_ms: u64,
    },

    /// A cycle failed; the previous snapshot (if any) remains cached.
    CycleFailed {
        cycle: u64,
        reason: String,
        detail: String,
    },

    /// The primary engine was unavailable and a session was acquired
    /// through the fallback instead.
    EngineFallback { from: String, to: String },

    /// The scheduler is shutting down and has released its resources.
    SchedulerStopped { cycles_run: u64 },
}

/// The central event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: FeedEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}
