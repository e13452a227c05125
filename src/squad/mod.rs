pub mod constraints;

pub use constraints::{repair, violations, RepairError, Violation};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::config::SquadRules;
use crate::data::player::{PlayerId, PlayerPool};

/// A fixed-size selection of players, stored as a sorted id set. Two squads
/// are equal exactly when they hold the same players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Squad {
    ids: Vec<PlayerId>,
}

impl Squad {
    pub fn new(mut ids: Vec<PlayerId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn ids(&self) -> &[PlayerId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Replace `out` with `in_`, keeping the set sorted. No-op when `out` is
    /// absent or `in_` already present.
    pub fn swap(&self, out: PlayerId, in_: PlayerId) -> Squad {
        if !self.contains(out) || self.contains(in_) {
            return self.clone();
        }
        let mut ids: Vec<PlayerId> = self
            .ids
            .iter()
            .copied()
            .filter(|&id| id != out)
            .collect();
        ids.push(in_);
        Squad::new(ids)
    }

    pub fn total_price(&self, pool: &PlayerPool) -> f64 {
        self.ids
            .iter()
            .filter_map(|&id| pool.get(id))
            .map(|player| player.price)
            .sum()
    }

    pub fn position_counts(&self, pool: &PlayerPool) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for &id in &self.ids {
            if let Some(player) = pool.get(id) {
                *counts.entry(player.position.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn club_counts(&self, pool: &PlayerPool) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for &id in &self.ids {
            if let Some(player) = pool.get(id) {
                *counts.entry(player.club.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Fraction of this squad's players shared with `other`, relative to the
    /// larger of the two sizes.
    pub fn overlap(&self, other: &Squad) -> f64 {
        let larger = self.len().max(other.len());
        if larger == 0 {
            return 0.0;
        }
        let shared = self.ids.iter().filter(|&&id| other.contains(id)).count();
        shared as f64 / larger as f64
    }
}

/// Whether at least one starting lineup within the formation ranges can be
/// fielded from `counts` (players held per position). Trivially true when the
/// rules carry no starting lineup.
pub fn has_valid_formation(counts: &BTreeMap<String, usize>, rules: &SquadRules) -> bool {
    if rules.starting_size == 0 {
        return true;
    }
    let positions: Vec<(&str, usize, usize)> = rules
        .formation_ranges
        .iter()
        .map(|(position, &(min, max))| {
            let held = counts.get(position).copied().unwrap_or(0);
            (position.as_str(), min, max.min(held))
        })
        .collect();
    fill_lineup(&positions, rules.starting_size)
}

/// Depth-first search over per-position counts; prunes on remaining min/max.
fn fill_lineup(positions: &[(&str, usize, usize)], remaining: usize) -> bool {
    let Some(&(_, min, max)) = positions.first() else {
        return remaining == 0;
    };
    if min > max {
        return false;
    }
    let rest = &positions[1..];
    let rest_min: usize = rest.iter().map(|&(_, min, _)| min).sum();
    let rest_max: usize = rest.iter().map(|&(_, _, max)| max).sum();
    for take in min..=max.min(remaining) {
        let left = remaining - take;
        if left >= rest_min && left <= rest_max && fill_lineup(rest, left) {
            return true;
        }
    }
    false
}

/// Enumerate the best starting lineup (by summed `score`) over all valid
/// formations. Returns the lineup ids and its score, or None when no
/// formation fits. `score` must be total for ranking within a position.
pub fn best_lineup<F>(
    squad: &Squad,
    pool: &PlayerPool,
    rules: &SquadRules,
    score: F,
) -> Option<(Vec<PlayerId>, f64)>
where
    F: Fn(PlayerId) -> f64,
{
    if rules.starting_size == 0 {
        let total = squad.ids().iter().map(|&id| score(id)).sum();
        return Some((squad.ids().to_vec(), total));
    }

    // Per position: squad members sorted by score descending, with prefix
    // sums so a formation's value is a straight lookup.
    let mut per_position: Vec<(&str, usize, usize, Vec<PlayerId>, Vec<f64>)> = Vec::new();
    for (position, &(min, max)) in &rules.formation_ranges {
        let mut members: Vec<PlayerId> = squad
            .ids()
            .iter()
            .copied()
            .filter(|&id| {
                pool.get(id)
                    .is_some_and(|player| player.position == *position)
            })
            .collect();
        members.sort_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)));
        let mut prefix = vec![0.0];
        for &id in &members {
            prefix.push(prefix.last().unwrap() + score(id));
        }
        per_position.push((position.as_str(), min, max.min(members.len()), members, prefix));
    }

    let mut best: Option<(Vec<PlayerId>, f64)> = None;
    let mut takes = vec![0usize; per_position.len()];
    search_lineup(
        &per_position,
        rules.starting_size,
        0,
        0.0,
        &mut takes,
        &mut best,
    );
    best
}

fn search_lineup(
    per_position: &[(&str, usize, usize, Vec<PlayerId>, Vec<f64>)],
    remaining: usize,
    index: usize,
    value: f64,
    takes: &mut Vec<usize>,
    best: &mut Option<(Vec<PlayerId>, f64)>,
) {
    if index == per_position.len() {
        if remaining == 0 && best.as_ref().is_none_or(|(_, b)| value > *b) {
            let lineup = per_position
                .iter()
                .zip(takes.iter())
                .flat_map(|((_, _, _, members, _), &take)| members[..take].iter().copied())
                .collect();
            *best = Some((lineup, value));
        }
        return;
    }
    let (_, min, max, _, prefix) = &per_position[index];
    for take in *min..=(*max).min(remaining) {
        takes[index] = take;
        search_lineup(
            per_position,
            remaining - take,
            index + 1,
            value + prefix[take],
            takes,
            best,
        );
    }
    takes[index] = 0;
}
