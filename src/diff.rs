//! Change detection between consecutive snapshots.
//!
//! Records are matched by their stable id, so a fixture keeps its identity
//! across cycles even while prices, scores, and in-play status move.

use crate::model::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-cycle change summary, attached to the publish event and logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OddsDelta {
    /// Matches whose back or lay prices moved.
    pub odds_changed: usize,
    /// Matches whose score text changed.
    pub score_changed: usize,
    /// Matches that entered or left play.
    pub status_changed: usize,
    /// Matches present now but not in the previous snapshot.
    pub added: usize,
    /// Matches present previously but gone now.
    pub removed: usize,
}

impl OddsDelta {
    pub fn total(&self) -> usize {
        self.odds_changed + self.score_changed + self.status_changed + self.added + self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Compare two snapshots record-by-record.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> OddsDelta {
    let old_by_id: HashMap<&str, &crate::model::MatchRecord> =
        old.records.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut delta = OddsDelta::default();
    let mut matched: HashSet<&str> = HashSet::new();

    for record in &new.records {
        match old_by_id.get(record.id.as_str()) {
            Some(prev) => {
                matched.insert(record.id.as_str());
                if prev.odds != record.odds {
                    delta.odds_changed += 1;
                }
                if prev.score != record.score {
                    delta.score_changed += 1;
                }
                if prev.in_play != record.in_play {
                    delta.status_changed += 1;
                }
            }
            None => delta.added += 1,
        }
    }
    delta.removed = old
        .records
        .iter()
        .filter(|r| !matched.contains(r.id.as_str()))
        .count();
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineKind, MatchOdds, MatchRecord, OddsPrice};
    use chrono::Utc;

    fn record(id: &str, price: f64, in_play: bool, score: Option<Vec<String>>) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            team1: "a".to_string(),
            team2: Some("b".to_string()),
            date: None,
            time: None,
            in_play,
            score,
            odds: MatchOdds {
                back: vec![OddsPrice {
                    position: 0,
                    price,
                    volume: None,
                }],
                lay: Vec::new(),
            },
        }
    }

    fn snapshot(records: Vec<MatchRecord>) -> Snapshot {
        Snapshot {
            records,
            captured_at: Utc::now(),
            source_engine: EngineKind::Chromium,
            extraction_ms: 1,
        }
    }

    #[test]
    fn test_no_changes() {
        let old = snapshot(vec![record("m1", 1.85, true, None)]);
        let new = snapshot(vec![record("m1", 1.85, true, None)]);
        assert!(diff_snapshots(&old, &new).is_empty());
    }

    #[test]
    fn test_price_move() {
        let old = snapshot(vec![record("m1", 1.85, true, None)]);
        let new = snapshot(vec![record("m1", 1.90, true, None)]);
        let delta = diff_snapshots(&old, &new);
        assert_eq!(delta.odds_changed, 1);
        assert_eq!(delta.total(), 1);
    }

    #[test]
    fn test_status_and_score_changes() {
        let old = snapshot(vec![record("m1", 1.85, false, None)]);
        let new = snapshot(vec![record(
            "m1",
            1.85,
            true,
            Some(vec!["10/0".to_string()]),
        )]);
        let delta = diff_snapshots(&old, &new);
        assert_eq!(delta.status_changed, 1);
        assert_eq!(delta.score_changed, 1);
        assert_eq!(delta.odds_changed, 0);
    }

    #[test]
    fn test_added_and_removed() {
        let old = snapshot(vec![record("m1", 1.85, true, None)]);
        let new = snapshot(vec![record("m2", 2.00, false, None)]);
        let delta = diff_snapshots(&old, &new);
        assert_eq!(delta.added, 1);
        assert_eq!(delta.removed, 1);
    }
}
