use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::player::PlayerId;

/// Outcome of one recorded head-to-head between two players in a gameweek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AWins,
    BWins,
    Draw,
}

/// A single pairwise record. Immutable once recorded; the rating engine is
/// the only consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub gameweek: u32,
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    pub outcome: Outcome,
}

/// Sliding gameweek window over the comparison feed. Records are appended and
/// never deleted; the window only controls which records the rating engine
/// sees on the next refresh.
#[derive(Debug, Clone, Default)]
pub struct ComparisonWindow {
    records: Vec<Comparison>,
    /// Number of trailing gameweeks exposed by [`ComparisonWindow::in_window`].
    /// 0 means no limit.
    pub window_gameweeks: u32,
}

impl ComparisonWindow {
    pub fn new(window_gameweeks: u32) -> Self {
        Self {
            records: Vec::new(),
            window_gameweeks,
        }
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = Comparison>) {
        self.records.extend(batch);
    }

    pub fn records(&self) -> &[Comparison] {
        &self.records
    }

    pub fn latest_gameweek(&self) -> Option<u32> {
        self.records.iter().map(|record| record.gameweek).max()
    }

    /// Records inside the trailing window, in feed order.
    pub fn in_window(&self) -> Vec<Comparison> {
        let Some(latest) = self.latest_gameweek() else {
            return Vec::new();
        };
        if self.window_gameweeks == 0 {
            return self.records.clone();
        }
        let cutoff = latest.saturating_sub(self.window_gameweeks.saturating_sub(1));
        self.records
            .iter()
            .copied()
            .filter(|record| record.gameweek >= cutoff)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FeedFile {
    comparisons: Vec<Comparison>,
}

pub fn load_comparisons_json(path: impl AsRef<Path>) -> Result<Vec<Comparison>, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    let parsed: FeedFile = serde_json::from_str(&raw).map_err(std::io::Error::other)?;
    Ok(parsed.comparisons)
}

/// CSV feed import. Header: `gameweek,player_a,player_b,outcome` with outcome
/// one of `a_wins`, `b_wins`, `draw`.
pub fn load_comparisons_csv(path: impl AsRef<Path>) -> Result<Vec<Comparison>, std::io::Error> {
    let mut reader = csv::Reader::from_path(path).map_err(std::io::Error::other)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: Comparison = row.map_err(std::io::Error::other)?;
        records.push(record);
    }
    Ok(records)
}
