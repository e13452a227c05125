pub mod evolve;
pub mod fitness;
pub mod pareto;
pub mod population;
pub mod selector;

use std::fmt;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::data::comparison::Comparison;
use crate::data::config::{ConfigError, OptimizerConfig};
use crate::data::player::{PlayerId, PlayerPool};
use crate::optimizer::evolve::{Evolver, Individual};
use crate::optimizer::population::InitError;
use crate::rating::{RatingEngine, RatingSnapshot};
use crate::score::{ProjectionTable, ScoreError, ScoreSynthesizer};

/// Result of one optimization run. A front cut short by the generation or
/// wall-clock budget is a normal outcome, never a failure.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Final Pareto front, deduplicated by squad-set equality, in selection
    /// order.
    pub front: Vec<Individual>,
    pub generations_run: usize,
    /// Early stop triggered by the patience setting.
    pub stopped_early: bool,
    /// Wall-clock budget ran out before the generation budget.
    pub deadline_hit: bool,
    /// Per-objective best (orientation: larger is better) at the end of the
    /// run; monotonically non-decreasing across generations.
    pub best_objectives: [f64; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    Config(ConfigError),
    Init(InitError),
    Score(ScoreError),
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration: {err}"),
            Self::Init(err) => write!(f, "initialization: {err}"),
            Self::Score(err) => write!(f, "score synthesis: {err}"),
        }
    }
}

impl std::error::Error for OptimizeError {}

impl From<ConfigError> for OptimizeError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<InitError> for OptimizeError {
    fn from(err: InitError) -> Self {
        Self::Init(err)
    }
}

impl From<ScoreError> for OptimizeError {
    fn from(err: ScoreError) -> Self {
        Self::Score(err)
    }
}

/// Full pipeline: ratings from the comparison window, projections, then the
/// population search. The snapshot and projection table are built once and
/// shared read-only for the whole run.
pub fn run_optimizer(
    pool: &PlayerPool,
    window: &[Comparison],
    config: &OptimizerConfig,
) -> Result<OptimizationOutcome, OptimizeError> {
    let (_, projections) = build_projections(pool, window, config)?;
    optimize(pool, &projections, config, |_, _| {})
}

/// Rating + synthesis stage, exposed separately so callers can inspect the
/// snapshot (convergence warning, per-player ratings) before optimizing.
/// Validates the configuration first: an infeasible setup is a fatal
/// configuration error, never a synthesis error.
pub fn build_projections(
    pool: &PlayerPool,
    window: &[Comparison],
    config: &OptimizerConfig,
) -> Result<(RatingSnapshot, ProjectionTable), OptimizeError> {
    config.validate(pool)?;
    let ids: Vec<PlayerId> = pool.ids().collect();
    let snapshot = RatingEngine::default().refine(&ids, window);
    let projections = ScoreSynthesizer::default().synthesize(pool, &snapshot, &config.weights)?;
    Ok((snapshot, projections))
}

/// The population search proper. `on_progress(done, total)` fires after
/// every generation, in the manner of the long-running sweep entry points.
pub fn optimize<F>(
    pool: &PlayerPool,
    projections: &ProjectionTable,
    config: &OptimizerConfig,
    mut on_progress: F,
) -> Result<OptimizationOutcome, OptimizeError>
where
    F: FnMut(usize, usize),
{
    config.validate(pool)?;

    let settings = &config.genetic;
    let evolver = Evolver {
        pool,
        projections,
        rules: &config.rules,
        settings,
    };
    let mut rng = Pcg64Mcg::seed_from_u64(config.seed);
    let mut next_birth = 0u64;

    let squads = population::initialize(
        pool,
        &config.rules,
        settings.population_size,
        &mut rng,
        settings.max_init_attempts,
    )?;
    let mut current = evolver.evaluate(squads, &mut next_birth);

    let deadline = (settings.time_budget_ms > 0)
        .then(|| Instant::now() + Duration::from_millis(settings.time_budget_ms));

    let mut best_objectives = population_best(&current);
    let mut stale_generations = 0;
    let mut generations_run = 0;
    let mut stopped_early = false;
    let mut deadline_hit = false;

    for generation in 0..settings.generations {
        if deadline.is_some_and(|limit| Instant::now() >= limit) {
            deadline_hit = true;
            break;
        }

        current = evolver.step(&current, &mut rng, &mut next_birth);
        generations_run = generation + 1;
        on_progress(generations_run, settings.generations);

        let best = population_best(&current);
        let improved = best
            .iter()
            .zip(best_objectives.iter())
            .any(|(new, old)| *new > *old + 1e-9);
        for (slot, value) in best_objectives.iter_mut().zip(best.iter()) {
            *slot = slot.max(*value);
        }
        if improved {
            stale_generations = 0;
        } else {
            stale_generations += 1;
            if settings.patience > 0 && stale_generations >= settings.patience {
                stopped_early = true;
                break;
            }
        }
    }

    Ok(OptimizationOutcome {
        front: final_front(&evolver, &current),
        generations_run,
        stopped_early,
        deadline_hit,
        best_objectives,
    })
}

/// Best in-population value of each objective (larger-is-better
/// orientation).
fn population_best(population: &[Individual]) -> [f64; 4] {
    let mut best = [f64::NEG_INFINITY; 4];
    for member in population {
        for (slot, value) in best.iter_mut().zip(member.fitness.objectives().iter()) {
            *slot = slot.max(*value);
        }
    }
    best
}

/// Non-dominated members in selection order, deduplicated by squad-set
/// equality (first occurrence wins).
fn final_front(evolver: &Evolver<'_>, population: &[Individual]) -> Vec<Individual> {
    let fitness: Vec<_> = population.iter().map(|member| member.fitness).collect();
    let front_indexes = pareto::pareto_front(&fitness);
    let order = evolver.ranked_order(population);

    let mut front: Vec<Individual> = Vec::new();
    for &index in &order {
        if !front_indexes.contains(&index) {
            continue;
        }
        let member = &population[index];
        if front.iter().any(|kept| kept.squad == member.squad) {
            continue;
        }
        front.push(member.clone());
    }
    front
}
