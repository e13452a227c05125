use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

/// One candidate in the selection pool. Prices are in millions, as exported
/// by the upstream feed. `points_history` is per-gameweek, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: String,
    pub club: String,
    pub price: f64,
    #[serde(default)]
    pub points_history: Vec<f64>,
    /// Upcoming fixture difficulty multiplier. 1.0 is neutral, above 1.0 is a
    /// harder run of fixtures.
    #[serde(default = "default_fixture_difficulty")]
    pub fixture_difficulty: f64,
}

fn default_fixture_difficulty() -> f64 {
    1.0
}

/// Read-only candidate pool with lookup indexes. Built once per run; the
/// optimizer never mutates it.
#[derive(Debug, Clone)]
pub struct PlayerPool {
    players: Vec<Player>,
    by_id: HashMap<PlayerId, usize>,
    by_position: BTreeMap<String, Vec<usize>>,
}

impl PlayerPool {
    pub fn new(mut players: Vec<Player>) -> Self {
        // Stable order so that index-based sampling is reproducible.
        players.sort_by_key(|player| player.id);
        players.dedup_by_key(|player| player.id);

        let by_id = players
            .iter()
            .enumerate()
            .map(|(index, player)| (player.id, index))
            .collect();
        let mut by_position: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, player) in players.iter().enumerate() {
            by_position
                .entry(player.position.clone())
                .or_default()
                .push(index);
        }

        Self {
            players,
            by_id,
            by_position,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.by_id.get(&id).map(|&index| &self.players[index])
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().map(|player| player.id)
    }

    /// Players of one position, in stable id order. Empty slice for unknown
    /// positions.
    pub fn position_members(&self, position: &str) -> Vec<&Player> {
        self.by_position
            .get(position)
            .map(|indexes| indexes.iter().map(|&index| &self.players[index]).collect())
            .unwrap_or_default()
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.by_position.keys().map(String::as_str)
    }

    /// Sum of the `count` cheapest prices for a position, or None when the
    /// position cannot supply `count` players.
    pub fn cheapest_fill(&self, position: &str, count: usize) -> Option<f64> {
        if count == 0 {
            return Some(0.0);
        }
        let mut prices: Vec<f64> = self
            .position_members(position)
            .iter()
            .map(|player| player.price)
            .collect();
        if prices.len() < count {
            return None;
        }
        prices.sort_by(f64::total_cmp);
        Some(prices[..count].iter().sum())
    }

    pub fn distinct_clubs(&self) -> usize {
        let mut clubs: Vec<&str> = self.players.iter().map(|p| p.club.as_str()).collect();
        clubs.sort_unstable();
        clubs.dedup();
        clubs.len()
    }
}

#[derive(Debug, Deserialize)]
struct PoolFile {
    players: Vec<Player>,
}

pub fn load_players_json(path: impl AsRef<Path>) -> Result<PlayerPool, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    let parsed: PoolFile = serde_json::from_str(&raw).map_err(std::io::Error::other)?;
    Ok(PlayerPool::new(parsed.players))
}

/// CSV pool import. Expected header:
/// `id,name,position,club,price[,fixture_difficulty]`. Points history comes
/// from the JSON feed only; CSV pools start with an empty history.
pub fn load_players_csv(path: impl AsRef<Path>) -> Result<PlayerPool, std::io::Error> {
    #[derive(Debug, Deserialize)]
    struct Row {
        id: PlayerId,
        name: String,
        position: String,
        club: String,
        price: f64,
        #[serde(default = "default_fixture_difficulty")]
        fixture_difficulty: f64,
    }

    let mut reader = csv::Reader::from_path(path).map_err(std::io::Error::other)?;
    let mut players = Vec::new();
    for row in reader.deserialize() {
        let row: Row = row.map_err(std::io::Error::other)?;
        players.push(Player {
            id: row.id,
            name: row.name,
            position: row.position,
            club: row.club,
            price: row.price,
            points_history: Vec::new(),
            fixture_difficulty: row.fixture_difficulty,
        });
    }
    Ok(PlayerPool::new(players))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId, position: &str, club: &str, price: f64) -> Player {
        Player {
            id,
            name: format!("player-{id}"),
            position: position.to_string(),
            club: club.to_string(),
            price,
            points_history: Vec::new(),
            fixture_difficulty: 1.0,
        }
    }

    #[test]
    fn pool_indexes_by_position_in_id_order() {
        let pool = PlayerPool::new(vec![
            player(3, "MID", "ARS", 5.0),
            player(1, "MID", "CHE", 7.5),
            player(2, "FWD", "ARS", 9.0),
        ]);

        let mids: Vec<PlayerId> = pool
            .position_members("MID")
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(mids, vec![1, 3]);
        assert!(pool.position_members("GK").is_empty());
    }

    #[test]
    fn cheapest_fill_sums_lowest_prices() {
        let pool = PlayerPool::new(vec![
            player(1, "DEF", "ARS", 4.0),
            player(2, "DEF", "CHE", 5.5),
            player(3, "DEF", "LIV", 4.5),
        ]);

        assert_eq!(pool.cheapest_fill("DEF", 2), Some(8.5));
        assert_eq!(pool.cheapest_fill("DEF", 4), None);
        assert_eq!(pool.cheapest_fill("FWD", 0), Some(0.0));
    }

    #[test]
    fn duplicate_ids_are_dropped() {
        let pool = PlayerPool::new(vec![
            player(1, "GK", "ARS", 4.0),
            player(1, "GK", "ARS", 4.0),
        ]);
        assert_eq!(pool.len(), 1);
    }
}
