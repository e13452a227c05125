//! Multi-objective fitness for squads.
//!
//! Four objectives: expected points of the best starting lineup (maximize),
//! summed projection variance (minimize), club-spread entropy (maximize) and
//! same-club lineup pairings (maximize). Evaluation reads only the immutable
//! projection table, so the population sweep runs on all cores via Rayon.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::data::config::SquadRules;
use crate::data::player::{PlayerId, PlayerPool};
use crate::score::ProjectionTable;
use crate::squad::{best_lineup, Squad};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitnessVector {
    pub expected_points: f64,
    /// Summed propagated variance across the squad. Lower is better.
    pub risk: f64,
    pub diversity: f64,
    pub synergy: f64,
}

impl FitnessVector {
    /// Objectives oriented so that larger is always better.
    pub fn objectives(&self) -> [f64; 4] {
        [
            self.expected_points,
            -self.risk,
            self.diversity,
            self.synergy,
        ]
    }

    /// Pareto dominance: at least as good everywhere, strictly better
    /// somewhere.
    pub fn dominates(&self, other: &FitnessVector) -> bool {
        let ours = self.objectives();
        let theirs = other.objectives();
        let mut strictly_better = false;
        for (a, b) in ours.iter().zip(theirs.iter()) {
            if a < b {
                return false;
            }
            if a > b {
                strictly_better = true;
            }
        }
        strictly_better
    }
}

pub fn evaluate(
    squad: &Squad,
    pool: &PlayerPool,
    projections: &ProjectionTable,
    rules: &SquadRules,
) -> FitnessVector {
    let score = |id| {
        projections
            .get(id)
            .map(|projection| projection.expected)
            .unwrap_or(0.0)
    };
    let (lineup, expected_points) = match best_lineup(squad, pool, rules, score) {
        Some((lineup, value)) => (lineup, value),
        None => (Vec::new(), 0.0),
    };

    FitnessVector {
        expected_points,
        risk: projections.variance_sum(squad.ids()),
        diversity: club_entropy(squad, pool),
        synergy: club_pairings(&lineup, pool),
    }
}

/// Evaluate the whole population in parallel. Output order matches input
/// order, so ranking stays deterministic.
pub fn evaluate_population(
    squads: &[Squad],
    pool: &PlayerPool,
    projections: &ProjectionTable,
    rules: &SquadRules,
) -> Vec<FitnessVector> {
    squads
        .par_iter()
        .map(|squad| evaluate(squad, pool, projections, rules))
        .collect()
}

/// Shannon entropy of the club distribution. A squad spread across many
/// clubs scores higher than one stacked on few.
fn club_entropy(squad: &Squad, pool: &PlayerPool) -> f64 {
    let counts = squad.club_counts(pool);
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// Same-club pairings across the starting lineup (the whole squad when no
/// lineup is configured). Teammates on the pitch together tend to share
/// attacking returns, so stacking a club in the lineup earns a bonus while a
/// benched teammate does not.
fn club_pairings(lineup: &[PlayerId], pool: &PlayerPool) -> f64 {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &id in lineup {
        if let Some(player) = pool.get(id) {
            *counts.entry(player.club.as_str()).or_insert(0) += 1;
        }
    }
    counts
        .values()
        .map(|&count| (count * count.saturating_sub(1) / 2) as f64)
        .sum()
}
