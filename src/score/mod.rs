//! Expected-points synthesis: ability, form trend, fixture difficulty and the
//! per-position weight profile folded into one projection with a confidence
//! interval.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::data::config::WeightProfile;
use crate::data::player::{PlayerId, PlayerPool};
use crate::rating::RatingSnapshot;

/// Synthesized expectation for one player. The interval is
/// `expected ± 2·sqrt(propagated_variance)` with
/// `propagated_variance = rating_variance × fixture_difficulty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
    /// In (0, 1]; shrinks as propagated variance grows.
    pub confidence: f64,
    /// Rating variance scaled by fixture difficulty; the interval half-width
    /// is twice its square root.
    pub propagated_variance: f64,
    /// Carried through from the rating: no comparisons backed this estimate.
    pub low_confidence: bool,
}

/// Immutable per-player projection table for one run. Fitness evaluation
/// reads this concurrently, so it is built once and never mutated.
#[derive(Debug, Clone)]
pub struct ProjectionTable {
    projections: BTreeMap<PlayerId, Projection>,
}

impl ProjectionTable {
    pub fn get(&self, id: PlayerId) -> Option<&Projection> {
        self.projections.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &Projection)> {
        self.projections.iter()
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Sum of expected points over a set of ids; ids missing from the table
    /// contribute nothing.
    pub fn expected_sum(&self, ids: &[PlayerId]) -> f64 {
        ids.iter()
            .filter_map(|id| self.projections.get(id))
            .map(|projection| projection.expected)
            .sum()
    }

    /// Sum of propagated variance over a set of ids.
    pub fn variance_sum(&self, ids: &[PlayerId]) -> f64 {
        ids.iter()
            .filter_map(|id| self.projections.get(id))
            .map(|projection| projection.propagated_variance)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSynthesizer {
    /// Exponential decay applied per gameweek when folding the points
    /// history into the form trend. 1.0 weighs all gameweeks equally.
    pub form_decay: f64,
}

impl Default for ScoreSynthesizer {
    fn default() -> Self {
        Self { form_decay: 0.8 }
    }
}

impl ScoreSynthesizer {
    /// Build the projection table for the whole pool. Every position in the
    /// pool must have a weight profile; profiles are configuration, never
    /// inferred here.
    pub fn synthesize(
        &self,
        pool: &PlayerPool,
        snapshot: &RatingSnapshot,
        weights: &BTreeMap<String, WeightProfile>,
    ) -> Result<ProjectionTable, ScoreError> {
        let mut projections = BTreeMap::new();
        for player in pool.players() {
            let profile =
                weights
                    .get(&player.position)
                    .ok_or_else(|| ScoreError::MissingWeightProfile {
                        position: player.position.clone(),
                    })?;
            let rating = snapshot.get_or_prior(player.id);

            let form = self.form_trend(&player.points_history);
            // Harder fixtures drag the expectation below the weighted base;
            // easier ones lift it.
            let expected = profile.ability * rating.theta + profile.form * form
                - profile.difficulty * (player.fixture_difficulty - 1.0);

            let propagated_variance = rating.variance * player.fixture_difficulty.max(0.0);
            let half_width = 2.0 * propagated_variance.sqrt();
            projections.insert(
                player.id,
                Projection {
                    expected,
                    lower: expected - half_width,
                    upper: expected + half_width,
                    confidence: 1.0 / (1.0 + propagated_variance),
                    propagated_variance,
                    low_confidence: rating.low_confidence,
                },
            );
        }
        Ok(ProjectionTable { projections })
    }

    /// Recency-weighted mean of the points history; recent gameweeks weigh
    /// more. Empty histories contribute zero form.
    fn form_trend(&self, points_history: &[f64]) -> f64 {
        if points_history.is_empty() {
            return 0.0;
        }
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut weight = 1.0;
        for points in points_history.iter().rev() {
            weighted += weight * points;
            total_weight += weight;
            weight *= self.form_decay;
        }
        weighted / total_weight
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    MissingWeightProfile { position: String },
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWeightProfile { position } => {
                write!(f, "no weight profile for position {position}")
            }
        }
    }
}

impl std::error::Error for ScoreError {}
