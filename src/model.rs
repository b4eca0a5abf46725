// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data types for odds snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which automation engine produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Headless Chromium over CDP.
    Chromium,
    /// Plain HTTP fetch without JavaScript execution.
    Static,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Chromium => "chromium",
            EngineKind::Static => "static",
        }
    }
}

/// One priced position on a match (a single back or lay cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsPrice {
    /// Column position within its side, left to right.
    pub position: usize,
    pub price: f64,
    /// Matched volume as displayed (e.g. "1.2K"), when shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

/// Back and lay prices for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    pub back: Vec<OddsPrice>,
    pub lay: Vec<OddsPrice>,
}

/// One odds line as extracted from the upstream page.
///
/// The field set is extraction-defined; the scheduler and cache treat
/// records as opaque values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Stable identifier derived from the team names, so the same fixture
    /// keeps its id across scrape cycles.
    pub id: String,
    pub team1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team2: Option<String>,
    /// Kick-off date as displayed on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub in_play: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Vec<String>>,
    pub odds: MatchOdds,
}

/// One complete, timestamped extraction result.
///
/// Immutable once built; superseded, never edited, by the next successful
/// scrape cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<MatchRecord>,
    pub captured_at: DateTime<Utc>,
    pub source_engine: EngineKind,
    /// Wall-clock time the extraction step took.
    pub extraction_ms: u64,
}

impl Snapshot {
    /// Look up a record by its stable id.
    pub fn record(&self, id: &str) -> Option<&MatchRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Age classification of cached data relative to the freshness threshold.
///
/// Staleness is metadata, not an error — callers decide whether stale data
/// is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staleness {
    Fresh,
    Stale,
}

impl Staleness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Staleness::Fresh => "fresh",
            Staleness::Stale => "stale",
        }
    }
}

/// Build a stable record id from team names.
///
/// Team names are sorted so home/away swaps map to the same id, lowercased,
/// and non-alphanumeric runs collapse to a single underscore.
pub fn stable_match_id(team1: &str, team2: Option<&str>) -> String {
    if team1.is_empty() {
        return "match_unknown".to_string();
    }

    let mut teams: Vec<&str> = match team2 {
        Some(t2) if !t2.is_empty() && t2 != team1 => vec![team1, t2],
        _ => vec![team1],
    };
    teams.sort_unstable();

    let normalized: Vec<String> = teams.iter().map(|t| normalize_team(t)).collect();
    format!("match_{}", normalized.join("__vs__"))
}

fn normalize_team(team: &str) -> String {
    let mut out = String::with_capacity(team.len());
    let mut last_underscore = false;
    for c in team.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_order_independent() {
        let a = stable_match_id("India", Some("Australia"));
        let b = stable_match_id("Australia", Some("India"));
        assert_eq!(a, b);
        assert_eq!(a, "match_australia__vs__india");
    }

    #[test]
    fn test_stable_id_normalizes_punctuation() {
        let id = stable_match_id("Delhi Capitals (W)", Some("Mumbai Indians (W)"));
        assert_eq!(id, "match_delhi_capitals_w__vs__mumbai_indians_w");
    }

    #[test]
    fn test_stable_id_single_team() {
        assert_eq!(stable_match_id("England", None), "match_england");
        assert_eq!(
            stable_match_id("England", Some("England")),
            "match_england"
        );
    }

    #[test]
    fn test_stable_id_empty() {
        assert_eq!(stable_match_id("", Some("x")), "match_unknown");
    }

    #[test]
    fn test_snapshot_record_lookup() {
        let snap = Snapshot {
            records: vec![MatchRecord {
                id: "match_a__vs__b".to_string(),
                team1: "a".to_string(),
                team2: Some("b".to_string()),
                date: None,
                time: None,
                in_play: false,
                score: None,
                odds: MatchOdds::default(),
            }],
            captured_at: Utc::now(),
            source_engine: EngineKind::Chromium,
            extraction_ms: 3,
        };
        assert!(snap.record("match_a__vs__b").is_some());
        assert!(snap.record("match_x__vs__y").is_none());
    }

    #[test]
    fn test_engine_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EngineKind::Chromium).unwrap();
        assert_eq!(json, "\"chromium\"");
    }
}
