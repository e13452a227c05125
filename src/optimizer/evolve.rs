//! One generation of the population search.
//!
//! Reproduction is rank-driven: elites (the leading ranks plus each
//! objective's champion) carry forward unconditionally, every non-elite rank
//! reproduces in order (crossover partner picked by binary tournament), and
//! every offspring is repaired or replaced before it enters the next
//! generation. Champion retention makes the population best of every
//! objective non-decreasing across generations. With both operator rates at
//! zero a generation reproduces the previous population exactly, re-ranked.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::config::{GeneticSettings, SquadRules};
use crate::data::player::{PlayerId, PlayerPool};
use crate::optimizer::fitness::{evaluate_population, FitnessVector};
use crate::optimizer::pareto::{compare_ranked, rank};
use crate::optimizer::population::sample_feasible;
use crate::score::ProjectionTable;
use crate::squad::constraints::repair;
use crate::squad::Squad;

/// One population member with its cached evaluation.
#[derive(Debug, Clone)]
pub struct Individual {
    pub squad: Squad,
    pub fitness: FitnessVector,
    pub price: f64,
    /// Insertion counter, the final deterministic tie-break.
    pub birth: u64,
}

pub struct Evolver<'a> {
    pub pool: &'a PlayerPool,
    pub projections: &'a ProjectionTable,
    pub rules: &'a SquadRules,
    pub settings: &'a GeneticSettings,
}

impl Evolver<'_> {
    pub fn evaluate(&self, squads: Vec<Squad>, next_birth: &mut u64) -> Vec<Individual> {
        let fitness = evaluate_population(&squads, self.pool, self.projections, self.rules);
        squads
            .into_iter()
            .zip(fitness)
            .map(|(squad, fitness)| {
                let price = squad.total_price(self.pool);
                let birth = *next_birth;
                *next_birth += 1;
                Individual {
                    squad,
                    fitness,
                    price,
                    birth,
                }
            })
            .collect()
    }

    /// Population indices in selection order (best first).
    pub fn ranked_order(&self, population: &[Individual]) -> Vec<usize> {
        let fitness: Vec<FitnessVector> =
            population.iter().map(|member| member.fitness).collect();
        let ranked = rank(&fitness);
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| {
            compare_ranked(
                &ranked[a],
                &ranked[b],
                |i| population[i].price,
                |i| population[i].birth,
            )
        });
        order
    }

    pub fn step<R: Rng>(
        &self,
        population: &[Individual],
        rng: &mut R,
        next_birth: &mut u64,
    ) -> Vec<Individual> {
        let order = self.ranked_order(population);
        let elite_count = self.settings.elite_count.min(population.len());
        let mut elite_indexes: Vec<usize> = order[..elite_count].to_vec();
        // Each objective's champion survives alongside the ranked elites, so
        // the population best of every objective cannot regress.
        for champion in self.objective_champions(population, &order) {
            if !elite_indexes.contains(&champion) {
                elite_indexes.push(champion);
            }
        }

        let mut next: Vec<Individual> = elite_indexes
            .iter()
            .map(|&index| population[index].clone())
            .collect();

        let parent_order: Vec<usize> = order
            .iter()
            .copied()
            .filter(|index| !elite_indexes.contains(index))
            .collect();

        let mut offspring: Vec<Squad> = Vec::with_capacity(parent_order.len());
        for &parent_index in &parent_order {
            let parent = &population[parent_index];
            let mut child = parent.squad.clone();
            let mut touched = false;

            if rng.random::<f64>() < self.settings.crossover_rate {
                let partner_index = self.tournament(population, &order, rng);
                child = self.crossover(&child, &population[partner_index].squad, rng);
                touched = true;
            }
            if rng.random::<f64>() < self.settings.mutation_rate {
                child = self.mutate(&child, rng);
                touched = true;
            }

            let child = if touched {
                match repair(&child, self.pool, self.rules, self.settings.max_repair_swaps) {
                    Ok(repaired) => repaired,
                    // Unrepairable offspring are discarded; re-seed to keep
                    // the population size constant.
                    Err(_) => sample_feasible(
                        self.pool,
                        self.rules,
                        rng,
                        self.settings.max_init_attempts,
                    )
                    .unwrap_or_else(|| parent.squad.clone()),
                }
            } else {
                child
            };
            offspring.push(child);
        }

        next.extend(self.evaluate(offspring, next_birth));
        next
    }

    /// First-ranked holder of each objective's population maximum. May repeat
    /// an index when one member tops several objectives.
    fn objective_champions(&self, population: &[Individual], order: &[usize]) -> Vec<usize> {
        let mut champions = Vec::with_capacity(4);
        for objective in 0..4 {
            let mut best = order[0];
            for &index in &order[1..] {
                if population[index].fitness.objectives()[objective]
                    > population[best].fitness.objectives()[objective]
                {
                    best = index;
                }
            }
            champions.push(best);
        }
        champions
    }

    /// Binary tournament on the ranked order: of two uniform picks, the one
    /// ranked earlier wins.
    fn tournament<R: Rng>(
        &self,
        population: &[Individual],
        order: &[usize],
        rng: &mut R,
    ) -> usize {
        let a = rng.random_range(0..population.len());
        let b = rng.random_range(0..population.len());
        let rank_of = |index: usize| order.iter().position(|&i| i == index).unwrap_or(usize::MAX);
        if rank_of(a) <= rank_of(b) {
            a
        } else {
            b
        }
    }

    /// Exchange same-position subsets between two parents: for each quota
    /// position the child draws its members from the union of both parents'
    /// players of that position.
    fn crossover<R: Rng>(&self, a: &Squad, b: &Squad, rng: &mut R) -> Squad {
        let mut ids: Vec<PlayerId> = Vec::with_capacity(self.rules.squad_size());
        for (position, &count) in &self.rules.quotas {
            let mut union: Vec<PlayerId> = a
                .ids()
                .iter()
                .chain(b.ids())
                .copied()
                .filter(|&id| {
                    self.pool
                        .get(id)
                        .is_some_and(|player| player.position == *position)
                })
                .collect();
            union.sort_unstable();
            union.dedup();
            union.shuffle(rng);
            ids.extend(union.into_iter().take(count));
        }
        Squad::new(ids)
    }

    /// Swap a bounded fraction of the squad for same-position alternates.
    /// Constraint fallout is the repair step's job.
    fn mutate<R: Rng>(&self, squad: &Squad, rng: &mut R) -> Squad {
        let cap = ((self.rules.squad_size() as f64 * self.settings.mutation_fraction).ceil()
            as usize)
            .max(1);
        let swaps = rng.random_range(1..=cap);
        let mut current = squad.clone();
        for _ in 0..swaps {
            let ids = current.ids();
            if ids.is_empty() {
                break;
            }
            let out = ids[rng.random_range(0..ids.len())];
            let Some(player) = self.pool.get(out) else { continue };
            let alternates: Vec<PlayerId> = self
                .pool
                .position_members(&player.position)
                .iter()
                .map(|alternate| alternate.id)
                .filter(|&id| !current.contains(id))
                .collect();
            if alternates.is_empty() {
                continue;
            }
            let in_ = alternates[rng.random_range(0..alternates.len())];
            current = current.swap(out, in_);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::config::SquadRules;
    use crate::data::player::Player;
    use crate::rating::RatingEngine;
    use crate::score::ScoreSynthesizer;
    use crate::squad::constraints::is_feasible;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;
    use std::collections::BTreeMap;

    fn player(id: PlayerId, position: &str, club: &str, price: f64) -> Player {
        Player {
            id,
            name: format!("player-{id}"),
            position: position.to_string(),
            club: club.to_string(),
            price,
            points_history: vec![f64::from(id)],
            fixture_difficulty: 1.0,
        }
    }

    fn pool() -> PlayerPool {
        let mut players = Vec::new();
        for id in 0..8u32 {
            players.push(player(id, "X", &format!("club-{}", id % 4), 3.0 + f64::from(id % 3)));
        }
        for id in 8..16u32 {
            players.push(player(id, "Y", &format!("club-{}", id % 4), 2.0 + f64::from(id % 4)));
        }
        PlayerPool::new(players)
    }

    fn rules() -> SquadRules {
        SquadRules {
            budget: 40.0,
            quotas: [("X".to_string(), 3), ("Y".to_string(), 3)]
                .into_iter()
                .collect(),
            club_cap: 3,
            starting_size: 0,
            formation_ranges: BTreeMap::new(),
        }
    }

    fn projections(pool: &PlayerPool) -> crate::score::ProjectionTable {
        let ids: Vec<PlayerId> = pool.ids().collect();
        let snapshot = RatingEngine::default().refine(&ids, &[]);
        let weights = [("X", 1.0), ("Y", 1.0)]
            .into_iter()
            .map(|(position, _)| {
                (
                    position.to_string(),
                    crate::data::config::WeightProfile {
                        ability: 1.0,
                        form: 1.0,
                        difficulty: 1.0,
                    },
                )
            })
            .collect();
        ScoreSynthesizer::default()
            .synthesize(pool, &snapshot, &weights)
            .unwrap()
    }

    #[test]
    fn offspring_are_always_feasible() {
        let pool = pool();
        let rules = rules();
        let projections = projections(&pool);
        let settings = GeneticSettings {
            population_size: 12,
            crossover_rate: 0.9,
            mutation_rate: 0.9,
            ..GeneticSettings::default()
        };
        let evolver = Evolver {
            pool: &pool,
            projections: &projections,
            rules: &rules,
            settings: &settings,
        };

        let mut rng = Pcg64Mcg::seed_from_u64(17);
        let mut next_birth = 0;
        let squads = crate::optimizer::population::initialize(
            &pool, &rules, 12, &mut rng, 500,
        )
        .unwrap();
        let mut population = evolver.evaluate(squads, &mut next_birth);

        for _ in 0..5 {
            population = evolver.step(&population, &mut rng, &mut next_birth);
            assert_eq!(population.len(), 12);
            for member in &population {
                assert!(is_feasible(&member.squad, &pool, &rules));
            }
        }
    }

    #[test]
    fn zero_rates_reproduce_the_population() {
        let pool = pool();
        let rules = rules();
        let projections = projections(&pool);
        let settings = GeneticSettings {
            population_size: 10,
            crossover_rate: 0.0,
            mutation_rate: 0.0,
            elite_count: 2,
            ..GeneticSettings::default()
        };
        let evolver = Evolver {
            pool: &pool,
            projections: &projections,
            rules: &rules,
            settings: &settings,
        };

        let mut rng = Pcg64Mcg::seed_from_u64(23);
        let mut next_birth = 0;
        let squads =
            crate::optimizer::population::initialize(&pool, &rules, 10, &mut rng, 500).unwrap();
        let population = evolver.evaluate(squads, &mut next_birth);
        let next = evolver.step(&population, &mut rng, &mut next_birth);

        let mut before: Vec<&Squad> = population.iter().map(|m| &m.squad).collect();
        let mut after: Vec<&Squad> = next.iter().map(|m| &m.squad).collect();
        before.sort_by_key(|squad| squad.ids().to_vec());
        after.sort_by_key(|squad| squad.ids().to_vec());
        assert_eq!(before, after);
    }

    #[test]
    fn elites_survive_unconditionally() {
        let pool = pool();
        let rules = rules();
        let projections = projections(&pool);
        let settings = GeneticSettings {
            population_size: 10,
            crossover_rate: 1.0,
            mutation_rate: 1.0,
            elite_count: 3,
            ..GeneticSettings::default()
        };
        let evolver = Evolver {
            pool: &pool,
            projections: &projections,
            rules: &rules,
            settings: &settings,
        };

        let mut rng = Pcg64Mcg::seed_from_u64(31);
        let mut next_birth = 0;
        let squads =
            crate::optimizer::population::initialize(&pool, &rules, 10, &mut rng, 500).unwrap();
        let population = evolver.evaluate(squads, &mut next_birth);
        let order = evolver.ranked_order(&population);
        let elites: Vec<Squad> = order[..3]
            .iter()
            .map(|&index| population[index].squad.clone())
            .collect();

        let next = evolver.step(&population, &mut rng, &mut next_birth);
        for elite in &elites {
            assert!(
                next.iter().any(|member| member.squad == *elite),
                "elite member must carry forward"
            );
        }
    }

    #[test]
    fn objective_bests_never_regress_across_generations() {
        // Two squads on one front: {1, 2} stacks a club (synergy champion),
        // {3, 4} carries the form (expected-points champion). Even with room
        // for a single ranked elite, both champions must survive each step.
        let pool = PlayerPool::new(vec![
            player(1, "X", "red", 3.0),
            player(2, "Y", "red", 3.0),
            player(3, "X", "blue", 3.0),
            player(4, "Y", "green", 3.0),
        ]);
        let rules = SquadRules {
            budget: 20.0,
            quotas: [("X".to_string(), 1), ("Y".to_string(), 1)]
                .into_iter()
                .collect(),
            club_cap: 2,
            starting_size: 0,
            formation_ranges: BTreeMap::new(),
        };
        let projections = projections(&pool);
        let settings = GeneticSettings {
            crossover_rate: 1.0,
            mutation_rate: 1.0,
            elite_count: 1,
            ..GeneticSettings::default()
        };
        let evolver = Evolver {
            pool: &pool,
            projections: &projections,
            rules: &rules,
            settings: &settings,
        };

        let bests = |population: &[Individual]| {
            let mut best = [f64::NEG_INFINITY; 4];
            for member in population {
                for (slot, value) in best.iter_mut().zip(member.fitness.objectives().iter()) {
                    *slot = slot.max(*value);
                }
            }
            best
        };

        for seed in 0..4u64 {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let mut next_birth = 0;
            let squads = vec![Squad::new(vec![1, 2]), Squad::new(vec![3, 4])];
            let mut population = evolver.evaluate(squads, &mut next_birth);
            for _ in 0..6 {
                let before = bests(&population);
                population = evolver.step(&population, &mut rng, &mut next_birth);
                let after = bests(&population);
                for (b, a) in before.iter().zip(after.iter()) {
                    assert!(a >= b, "seed {seed}: objective best regressed {b} -> {a}");
                }
            }
        }
    }

    #[test]
    fn crossover_respects_quotas() {
        let pool = pool();
        let rules = rules();
        let projections = projections(&pool);
        let settings = GeneticSettings::default();
        let evolver = Evolver {
            pool: &pool,
            projections: &projections,
            rules: &rules,
            settings: &settings,
        };

        let mut rng = Pcg64Mcg::seed_from_u64(41);
        let a = sample_feasible(&pool, &rules, &mut rng, 500).unwrap();
        let b = sample_feasible(&pool, &rules, &mut rng, 500).unwrap();
        for _ in 0..20 {
            let child = evolver.crossover(&a, &b, &mut rng);
            let counts = child.position_counts(&pool);
            assert_eq!(counts.get("X"), Some(&3));
            assert_eq!(counts.get("Y"), Some(&3));
        }
    }
}
