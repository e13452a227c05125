use std::collections::BTreeMap;

use gaffer::data::config::{
    ConfigError, GeneticSettings, OptimizerConfig, SquadRules, WeightProfile,
};
use gaffer::data::player::{Player, PlayerId, PlayerPool};
use gaffer::optimizer::selector::select_shortlist;
use gaffer::optimizer::{run_optimizer, OptimizeError};
use gaffer::squad::constraints::is_feasible;

fn player(id: PlayerId, position: &str, club: &str, price: f64, form: f64) -> Player {
    Player {
        id,
        name: format!("player-{id}"),
        position: position.to_string(),
        club: club.to_string(),
        price,
        points_history: vec![form, form],
        fixture_difficulty: 1.0,
    }
}

fn uniform_weights(positions: &[&str]) -> BTreeMap<String, WeightProfile> {
    positions
        .iter()
        .map(|position| {
            (
                position.to_string(),
                WeightProfile {
                    ability: 1.0,
                    form: 1.0,
                    difficulty: 1.0,
                },
            )
        })
        .collect()
}

/// Four-player pool: one X and one Y must be picked under a budget of 9.
/// Picking both X players breaks the quota; the most expensive legal pair
/// {B, D} costs exactly 9.
fn tiny_pool() -> PlayerPool {
    PlayerPool::new(vec![
        player(1, "X", "red", 3.0, 2.0),  // A
        player(2, "X", "blue", 4.0, 5.0), // B
        player(3, "Y", "red", 2.0, 1.0),  // C
        player(4, "Y", "blue", 5.0, 6.0), // D
    ])
}

fn tiny_config(seed: u64) -> OptimizerConfig {
    OptimizerConfig {
        rules: SquadRules {
            budget: 9.0,
            quotas: [("X".to_string(), 1), ("Y".to_string(), 1)]
                .into_iter()
                .collect(),
            club_cap: 3,
            starting_size: 0,
            formation_ranges: BTreeMap::new(),
        },
        weights: uniform_weights(&["X", "Y"]),
        genetic: GeneticSettings {
            population_size: 16,
            generations: 20,
            ..GeneticSettings::default()
        },
        shortlist_size: 3,
        overlap_threshold: 0.8,
        seed,
    }
}

fn wide_pool() -> PlayerPool {
    let mut players = Vec::new();
    for id in 0..12u32 {
        players.push(player(
            id,
            "X",
            &format!("club-{}", id % 6),
            4.0 + f64::from(id % 4),
            f64::from(id % 7),
        ));
    }
    for id in 12..24u32 {
        players.push(player(
            id,
            "Y",
            &format!("club-{}", id % 6),
            3.0 + f64::from(id % 3),
            f64::from(id % 5),
        ));
    }
    PlayerPool::new(players)
}

fn wide_config(seed: u64) -> OptimizerConfig {
    OptimizerConfig {
        rules: SquadRules {
            budget: 45.0,
            quotas: [("X".to_string(), 3), ("Y".to_string(), 3)]
                .into_iter()
                .collect(),
            club_cap: 2,
            starting_size: 0,
            formation_ranges: BTreeMap::new(),
        },
        weights: uniform_weights(&["X", "Y"]),
        genetic: GeneticSettings {
            population_size: 40,
            generations: 30,
            ..GeneticSettings::default()
        },
        shortlist_size: 4,
        overlap_threshold: 0.6,
        seed,
    }
}

#[test]
fn tiny_scenario_never_yields_an_illegal_pair() {
    for seed in [1, 2, 3, 4, 5] {
        let outcome = run_optimizer(&tiny_pool(), &[], &tiny_config(seed)).unwrap();
        assert!(!outcome.front.is_empty());
        for member in &outcome.front {
            let ids = member.squad.ids();
            assert_ne!(ids, &[1, 2], "two X players break the quota");
            assert!(member.price <= 9.0, "front squad over budget at {}", member.price);
        }
    }
}

#[test]
fn front_squads_satisfy_every_constraint() {
    let pool = wide_pool();
    let config = wide_config(13);
    let outcome = run_optimizer(&pool, &[], &config).unwrap();

    assert!(!outcome.front.is_empty());
    for member in &outcome.front {
        assert!(is_feasible(&member.squad, &pool, &config.rules));
        assert_eq!(member.squad.len(), 6);
    }
}

#[test]
fn front_is_mutually_non_dominated() {
    let outcome = run_optimizer(&wide_pool(), &[], &wide_config(21)).unwrap();
    for a in &outcome.front {
        for b in &outcome.front {
            assert!(
                !a.fitness.dominates(&b.fitness),
                "front member dominated by another"
            );
        }
    }
}

#[test]
fn whole_pipeline_is_deterministic_per_seed() {
    let pool = wide_pool();
    let config = wide_config(77);
    let first = run_optimizer(&pool, &[], &config).unwrap();
    let second = run_optimizer(&pool, &[], &config).unwrap();

    assert_eq!(first.generations_run, second.generations_run);
    assert_eq!(first.front.len(), second.front.len());
    for (a, b) in first.front.iter().zip(second.front.iter()) {
        assert_eq!(a.squad, b.squad);
        assert_eq!(a.fitness.expected_points, b.fitness.expected_points);
    }
    assert_eq!(first.best_objectives, second.best_objectives);
}

#[test]
fn shortlist_members_stay_under_the_overlap_threshold() {
    let pool = wide_pool();
    let config = wide_config(5);
    let outcome = run_optimizer(&pool, &[], &config).unwrap();
    let shortlist = select_shortlist(
        &outcome.front,
        config.shortlist_size,
        config.overlap_threshold,
    );

    assert!(shortlist.len() <= config.shortlist_size);
    for (slot, &a) in shortlist.iter().enumerate() {
        for &b in &shortlist[slot + 1..] {
            let overlap = outcome.front[a].squad.overlap(&outcome.front[b].squad);
            assert!(
                overlap <= config.overlap_threshold,
                "shortlisted squads overlap at {overlap}"
            );
        }
    }
}

#[test]
fn best_objectives_cover_the_final_front() {
    // The running per-objective best can only improve, so it is at least as
    // good as anything still standing in the front.
    let outcome = run_optimizer(&wide_pool(), &[], &wide_config(9)).unwrap();
    for member in &outcome.front {
        for (best, value) in outcome
            .best_objectives
            .iter()
            .zip(member.fitness.objectives().iter())
        {
            assert!(best + 1e-9 >= *value);
        }
    }
}

#[test]
fn infeasible_club_cap_is_rejected_up_front() {
    let mut config = tiny_config(1);
    config.rules.club_cap = 0;
    let err = run_optimizer(&tiny_pool(), &[], &config).unwrap_err();
    assert!(matches!(err, OptimizeError::Config(_)));
}

#[test]
fn missing_weight_profile_is_rejected_up_front() {
    // The screen runs before any rating or synthesis work, so the gap
    // surfaces as a configuration error rather than a synthesis one.
    let mut config = tiny_config(1);
    config.weights.remove("Y");
    let err = run_optimizer(&tiny_pool(), &[], &config).unwrap_err();
    assert!(matches!(
        err,
        OptimizeError::Config(ConfigError::MissingWeightProfile { .. })
    ));
}

#[test]
fn patience_stops_a_stagnant_run_early() {
    let mut config = tiny_config(3);
    // Four players admit only three legal squads; progress stalls fast.
    config.genetic.generations = 100;
    config.genetic.patience = 5;
    let outcome = run_optimizer(&tiny_pool(), &[], &config).unwrap();
    assert!(outcome.stopped_early);
    assert!(outcome.generations_run < 100);
}
