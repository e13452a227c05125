//! Pareto-dominance ranking with crowding distance, NSGA-II style.
//!
//! Ranking is fully deterministic: dominance fronts, then crowding distance,
//! then lower total price, then insertion order.

use std::cmp::Ordering;

use crate::optimizer::fitness::FitnessVector;

/// Ranking record for one population member, by index into the population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMember {
    pub index: usize,
    /// 0 is the non-dominated front.
    pub front: usize,
    pub crowding: f64,
}

/// Fast non-dominated sort over the fitness vectors.
pub fn rank(fitness: &[FitnessVector]) -> Vec<RankedMember> {
    let n = fitness.len();
    let mut dominated_by: Vec<usize> = vec![0; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if fitness[i].dominates(&fitness[j]) {
                dominates[i].push(j);
                dominated_by[j] += 1;
            } else if fitness[j].dominates(&fitness[i]) {
                dominates[j].push(i);
                dominated_by[i] += 1;
            }
        }
    }

    let mut front_of = vec![0usize; n];
    let mut current: Vec<usize> = (0..n).filter(|&i| dominated_by[i] == 0).collect();
    let mut front = 0;
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            front_of[i] = front;
            for &j in &dominates[i] {
                dominated_by[j] -= 1;
                if dominated_by[j] == 0 {
                    next.push(j);
                }
            }
        }
        front += 1;
        current = next;
    }

    let mut ranked: Vec<RankedMember> = (0..n)
        .map(|index| RankedMember {
            index,
            front: front_of[index],
            crowding: 0.0,
        })
        .collect();

    for front_index in 0..front {
        let members: Vec<usize> = (0..n).filter(|&i| front_of[i] == front_index).collect();
        for (index, crowding) in crowding_distances(&members, fitness) {
            ranked[index].crowding = crowding;
        }
    }

    ranked
}

/// Crowding distance of each member within one front. Boundary members get
/// infinite distance so the extremes of every objective survive selection.
fn crowding_distances(members: &[usize], fitness: &[FitnessVector]) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = members.iter().map(|&i| (i, 0.0)).collect();
    if members.len() <= 2 {
        for entry in &mut distances {
            entry.1 = f64::INFINITY;
        }
        return distances;
    }

    for objective in 0..4 {
        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|&a, &b| {
            fitness[members[a]].objectives()[objective]
                .total_cmp(&fitness[members[b]].objectives()[objective])
        });

        let low = fitness[members[order[0]]].objectives()[objective];
        let high = fitness[members[*order.last().unwrap()]].objectives()[objective];
        let span = high - low;

        distances[order[0]].1 = f64::INFINITY;
        distances[*order.last().unwrap()].1 = f64::INFINITY;
        if span <= 0.0 {
            continue;
        }
        for window in 1..order.len() - 1 {
            let previous = fitness[members[order[window - 1]]].objectives()[objective];
            let next = fitness[members[order[window + 1]]].objectives()[objective];
            distances[order[window]].1 += (next - previous) / span;
        }
    }

    distances
}

/// Selection order: earlier front, then larger crowding, then lower price,
/// then insertion order (stable deterministic tie-break).
pub fn compare_ranked(
    a: &RankedMember,
    b: &RankedMember,
    price_of: impl Fn(usize) -> f64,
    birth_of: impl Fn(usize) -> u64,
) -> Ordering {
    a.front
        .cmp(&b.front)
        .then_with(|| b.crowding.total_cmp(&a.crowding))
        .then_with(|| price_of(a.index).total_cmp(&price_of(b.index)))
        .then_with(|| birth_of(a.index).cmp(&birth_of(b.index)))
}

/// Indexes of the non-dominated front.
pub fn pareto_front(fitness: &[FitnessVector]) -> Vec<usize> {
    rank(fitness)
        .into_iter()
        .filter(|member| member.front == 0)
        .map(|member| member.index)
        .collect()
}
