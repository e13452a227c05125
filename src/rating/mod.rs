//! Latent ability estimation from pairwise gameweek outcomes.
//!
//! A logistic (Bradley-Terry style) model refined by fixed-rate gradient
//! passes over the comparison window. Uncertainty comes from accumulated
//! Fisher information, so variance shrinks monotonically as a player picks
//! up comparisons. The refinement is fully deterministic: no RNG is involved.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::data::comparison::{Comparison, Outcome};
use crate::data::player::PlayerId;

/// Posterior state for one player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRating {
    pub theta: f64,
    pub variance: f64,
    pub observations: usize,
    /// Set when the player had no comparisons in the window and keeps the
    /// prior untouched.
    pub low_confidence: bool,
}

/// How the refinement loop terminated. Hitting the pass cap is a warning
/// carried in the snapshot, never an error: the best-so-far estimate is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Refinement {
    Converged { passes: usize },
    MaxPassesReached { passes: usize, residual: f64 },
}

impl Refinement {
    pub fn converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Immutable per-player rating table for one refinement run. Downstream
/// consumers hold a shared reference for the duration of an optimization,
/// so concurrent fitness evaluations never race on rating state.
#[derive(Debug, Clone)]
pub struct RatingSnapshot {
    ratings: BTreeMap<PlayerId, PlayerRating>,
    pub refinement: Refinement,
    pub prior_variance: f64,
}

impl RatingSnapshot {
    pub fn get(&self, id: PlayerId) -> Option<&PlayerRating> {
        self.ratings.get(&id)
    }

    /// Rating for a player, falling back to the low-confidence prior for ids
    /// the window never mentioned.
    pub fn get_or_prior(&self, id: PlayerId) -> PlayerRating {
        self.ratings.get(&id).copied().unwrap_or(PlayerRating {
            theta: 0.0,
            variance: self.prior_variance,
            observations: 0,
            low_confidence: true,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &PlayerRating)> {
        self.ratings.iter()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingEngine {
    pub learning_rate: f64,
    pub prior_variance: f64,
    pub max_passes: usize,
    /// Refinement stops once the largest per-player mean shift in a pass
    /// drops below this.
    pub tolerance: f64,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            prior_variance: 1.0,
            max_passes: 200,
            tolerance: 1e-4,
        }
    }
}

impl RatingEngine {
    /// Refine ratings for `players` from the comparison window.
    ///
    /// Players without a single comparison keep the prior (theta 0, prior
    /// variance) and are flagged low-confidence rather than erroring.
    pub fn refine(&self, players: &[PlayerId], window: &[Comparison]) -> RatingSnapshot {
        let mut thetas: BTreeMap<PlayerId, f64> = players.iter().map(|&id| (id, 0.0)).collect();
        // Comparisons may mention players outside the requested set; rate
        // them too so their opponents' gradients are well-defined.
        for record in window {
            thetas.entry(record.player_a).or_insert(0.0);
            thetas.entry(record.player_b).or_insert(0.0);
        }

        let mut refinement = Refinement::MaxPassesReached {
            passes: 0,
            residual: 0.0,
        };

        if window.is_empty() {
            refinement = Refinement::Converged { passes: 0 };
        } else {
            for pass in 0..self.max_passes {
                let mut residual = 0.0_f64;
                for record in window {
                    let theta_a = thetas[&record.player_a];
                    let theta_b = thetas[&record.player_b];
                    let p_a = sigmoid(theta_a - theta_b);
                    let observed_a = match record.outcome {
                        Outcome::AWins => 1.0,
                        Outcome::BWins => 0.0,
                        // A draw counts half a win to each side, matching the
                        // win-matrix convention of the data feed.
                        Outcome::Draw => 0.5,
                    };
                    let step = self.learning_rate * (observed_a - p_a);
                    *thetas.get_mut(&record.player_a).unwrap() += step;
                    *thetas.get_mut(&record.player_b).unwrap() -= step;
                    residual = residual.max(step.abs());
                }
                if residual < self.tolerance {
                    refinement = Refinement::Converged { passes: pass + 1 };
                    break;
                }
                refinement = Refinement::MaxPassesReached {
                    passes: pass + 1,
                    residual,
                };
            }
        }

        // Fisher information at the final estimates. Information only ever
        // accumulates, so more comparisons mean smaller variance.
        let mut information: BTreeMap<PlayerId, f64> = thetas
            .keys()
            .map(|&id| (id, 1.0 / self.prior_variance))
            .collect();
        let mut observation_counts: BTreeMap<PlayerId, usize> =
            thetas.keys().map(|&id| (id, 0)).collect();
        for record in window {
            let p = sigmoid(thetas[&record.player_a] - thetas[&record.player_b]);
            let fisher = p * (1.0 - p);
            *information.get_mut(&record.player_a).unwrap() += fisher;
            *information.get_mut(&record.player_b).unwrap() += fisher;
            *observation_counts.get_mut(&record.player_a).unwrap() += 1;
            *observation_counts.get_mut(&record.player_b).unwrap() += 1;
        }

        let ratings = thetas
            .into_iter()
            .map(|(id, theta)| {
                let observations = observation_counts[&id];
                (
                    id,
                    PlayerRating {
                        theta,
                        variance: 1.0 / information[&id],
                        observations,
                        low_confidence: observations == 0,
                    },
                )
            })
            .collect();

        RatingSnapshot {
            ratings,
            refinement,
            prior_variance: self.prior_variance,
        }
    }

    /// Refine several independent windows (e.g. seasons or gameweek eras)
    /// concurrently. Each window is sequential internally; windows share no
    /// state, so they parallelize cleanly.
    pub fn refine_eras(
        &self,
        players: &[PlayerId],
        eras: &[Vec<Comparison>],
    ) -> Vec<RatingSnapshot> {
        eras.par_iter()
            .map(|window| self.refine(players, window))
            .collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let ex = x.exp();
        ex / (1.0 + ex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wins(pairs: &[(PlayerId, PlayerId)]) -> Vec<Comparison> {
        pairs
            .iter()
            .map(|&(a, b)| Comparison {
                gameweek: 1,
                player_a: a,
                player_b: b,
                outcome: Outcome::AWins,
            })
            .collect()
    }

    #[test]
    fn repeated_wins_order_the_ratings() {
        let window = wins(&[(1, 2), (1, 2), (2, 3), (2, 3), (1, 3)]);
        let snapshot = RatingEngine::default().refine(&[1, 2, 3], &window);

        let a = snapshot.get(1).unwrap().theta;
        let b = snapshot.get(2).unwrap().theta;
        let c = snapshot.get(3).unwrap().theta;
        assert!(a > b, "expected {a} > {b}");
        assert!(b > c, "expected {b} > {c}");
    }

    #[test]
    fn refinement_is_deterministic() {
        let window = wins(&[(1, 2), (2, 3), (3, 1), (1, 2)]);
        let engine = RatingEngine::default();
        let first = engine.refine(&[1, 2, 3], &window);
        let second = engine.refine(&[1, 2, 3], &window);

        for id in [1, 2, 3] {
            assert_eq!(first.get(id).unwrap().theta, second.get(id).unwrap().theta);
            assert_eq!(
                first.get(id).unwrap().variance,
                second.get(id).unwrap().variance
            );
        }
    }

    #[test]
    fn unobserved_player_keeps_prior_and_is_low_confidence() {
        let window = wins(&[(1, 2)]);
        let engine = RatingEngine::default();
        let snapshot = engine.refine(&[1, 2, 9], &window);

        let idle = snapshot.get(9).unwrap();
        assert_eq!(idle.theta, 0.0);
        assert_eq!(idle.variance, engine.prior_variance);
        assert!(idle.low_confidence);
        assert!(!snapshot.get(1).unwrap().low_confidence);
    }

    #[test]
    fn variance_shrinks_with_more_observations() {
        let engine = RatingEngine::default();
        let few = engine.refine(&[1, 2], &wins(&[(1, 2)]));
        let many = engine.refine(&[1, 2], &wins(&[(1, 2), (1, 2), (1, 2), (2, 1)]));

        assert!(
            many.get(1).unwrap().variance < few.get(1).unwrap().variance,
            "variance must shrink as information accumulates"
        );
        assert!(few.get(1).unwrap().variance < engine.prior_variance);
    }

    #[test]
    fn draws_pull_ratings_together() {
        let window = vec![
            Comparison {
                gameweek: 1,
                player_a: 1,
                player_b: 2,
                outcome: Outcome::Draw,
            };
            6
        ];
        let snapshot = RatingEngine::default().refine(&[1, 2], &window);
        let a = snapshot.get(1).unwrap().theta;
        let b = snapshot.get(2).unwrap().theta;
        assert!((a - b).abs() < 1e-9, "drawn pair should stay level");
    }

    #[test]
    fn pass_cap_returns_best_so_far_with_warning() {
        let engine = RatingEngine {
            max_passes: 1,
            tolerance: 1e-12,
            ..RatingEngine::default()
        };
        let snapshot = engine.refine(&[1, 2], &wins(&[(1, 2), (1, 2)]));
        assert!(!snapshot.refinement.converged());
        assert!(snapshot.get(1).unwrap().theta > 0.0);
    }

    #[test]
    fn era_refinement_matches_sequential() {
        let engine = RatingEngine::default();
        let eras = vec![wins(&[(1, 2), (2, 3)]), wins(&[(3, 1)])];
        let parallel = engine.refine_eras(&[1, 2, 3], &eras);
        for (snapshot, window) in parallel.iter().zip(&eras) {
            let sequential = engine.refine(&[1, 2, 3], window);
            assert_eq!(
                snapshot.get(1).unwrap().theta,
                sequential.get(1).unwrap().theta
            );
        }
    }
}
