//! Shortlist extraction from the final Pareto front.
//!
//! Front members are sorted by a fixed hierarchy (expected points desc, risk
//! asc, price asc) and near-duplicates are collapsed: a squad sharing more
//! than the overlap threshold with an already-kept squad is dropped in favor
//! of the better-ranked representative.

use crate::optimizer::evolve::Individual;

/// Indices into `front`, best first, near-duplicates removed, truncated to
/// `shortlist_size` (0 means no truncation).
pub fn select_shortlist(
    front: &[Individual],
    shortlist_size: usize,
    overlap_threshold: f64,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..front.len()).collect();
    order.sort_by(|&a, &b| {
        front[b]
            .fitness
            .expected_points
            .total_cmp(&front[a].fitness.expected_points)
            .then_with(|| front[a].fitness.risk.total_cmp(&front[b].fitness.risk))
            .then_with(|| front[a].price.total_cmp(&front[b].price))
            .then_with(|| front[a].birth.cmp(&front[b].birth))
    });

    let mut kept: Vec<usize> = Vec::new();
    for index in order {
        let near_duplicate = kept.iter().any(|&kept_index| {
            front[index].squad.overlap(&front[kept_index].squad) > overlap_threshold
        });
        if near_duplicate {
            continue;
        }
        kept.push(index);
        if shortlist_size > 0 && kept.len() == shortlist_size {
            break;
        }
    }
    kept
}
