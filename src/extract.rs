// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parse odds records out of a fetched page.
//!
//! Works on raw HTML with the `scraper` crate — no live DOM access, so the
//! same extractor runs against browser-rendered and statically fetched
//! documents alike.

use crate::error::ExtractError;
use crate::model::{stable_match_id, MatchOdds, MatchRecord, OddsPrice};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Accepts plain decimal prices after thousands separators are stripped.
fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("valid price regex"))
}

struct Selectors {
    list: Selector,
    item: Selector,
    player: Selector,
    date: Selector,
    time: Selector,
    score: Selector,
    score_span: Selector,
    back: Selector,
    lay: Selector,
    price: Selector,
    volume: Selector,
}

impl Selectors {
    fn new() -> Self {
        fn sel(s: &str) -> Selector {
            Selector::parse(s).expect("static selector")
        }
        Self {
            list: sel(".inplay-item-list"),
            item: sel(".inplay-item"),
            player: sel(".inplay-item__player span"),
            date: sel(".date-content .inPlayDate-content__date"),
            time: sel(".date-content .inPlayDate-content__time"),
            score: sel(".score-content"),
            score_span: sel("span"),
            back: sel(".odd-button.back-color"),
            lay: sel(".odd-button.lay-color"),
            price: sel(".odd-button__price"),
            volume: sel(".odd-button__volume"),
        }
    }
}

/// Structural extractor for the upstream odds page.
///
/// Cheap to clone; the compiled selector set is shared.
#[derive(Clone)]
pub struct Extractor {
    sel: Arc<Selectors>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            sel: Arc::new(Selectors::new()),
        }
    }

    /// Extract all odds records from a page.
    ///
    /// - No match-list container at all → `SchemaMismatch` (layout drift).
    /// - Containers present but no rows → `Ok(vec![])`; a page with no live
    ///   events is expected steady state, not a failure.
    /// - Rows present but none parseable → `ParseFailure`.
    pub fn extract(&self, html: &str) -> Result<Vec<MatchRecord>, ExtractError> {
        let document = Html::parse_document(html);

        let lists: Vec<ElementRef> = document.select(&self.sel.list).collect();
        if lists.is_empty() {
            return Err(ExtractError::SchemaMismatch);
        }

        let mut records = Vec::new();
        let mut row_count = 0usize;
        for list in &lists {
            for row in list.select(&self.sel.item) {
                row_count += 1;
                match self.parse_row(&row) {
                    Some(record) => records.push(record),
                    None => debug!("skipping unparseable match row {row_count}"),
                }
            }
        }

        if records.is_empty() && row_count > 0 {
            return Err(ExtractError::ParseFailure { matched: row_count });
        }
        Ok(records)
    }

    fn parse_row(&self, row: &ElementRef) -> Option<MatchRecord> {
        let mut players = row
            .select(&self.sel.player)
            .map(|el| text_of(&el))
            .filter(|t| !t.is_empty());
        let team1 = players.next()?;
        let team2 = players.next();

        let date = row.select(&self.sel.date).next().map(|el| text_of(&el));
        let time = row.select(&self.sel.time).next().map(|el| text_of(&el));

        // A populated score block marks the match as in play; the block is
        // rendered with an `empty` class otherwise.
        let score = row
            .select(&self.sel.score)
            .find(|el| !el.value().classes().any(|c| c == "empty"))
            .map(|el| {
                el.select(&self.sel.score_span)
                    .map(|s| text_of(&s))
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|spans| !spans.is_empty());
        let in_play = score.is_some();

        let odds = MatchOdds {
            back: self.parse_side(row, &self.sel.back),
            lay: self.parse_side(row, &self.sel.lay),
        };

        let id = stable_match_id(&team1, team2.as_deref());
        Some(MatchRecord {
            id,
            team1,
            team2,
            date,
            time,
            in_play,
            score,
            odds,
        })
    }

    fn parse_side(&self, row: &ElementRef, side: &Selector) -> Vec<OddsPrice> {
        let mut prices = Vec::new();
        for (position, button) in row.select(side).enumerate() {
            let Some(price_el) = button.select(&self.sel.price).next() else {
                continue;
            };
            let Some(price) = parse_price(&text_of(&price_el)) else {
                continue;
            };
            let volume = button
                .select(&self.sel.volume)
                .next()
                .map(|el| text_of(&el))
                .filter(|v| !v.is_empty());
            prices.push(OddsPrice {
                position,
                price,
                volume,
            });
        }
        prices
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse a displayed price cell. Placeholder cells (`-`, empty) yield None,
/// as does anything that is not a positive decimal.
fn parse_price(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "-" || !price_re().is_match(&cleaned) {
        return None;
    }
    let price: f64 = cleaned.parse().ok()?;
    (price > 0.0).then_some(price)
}
