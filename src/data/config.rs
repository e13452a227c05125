use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::player::PlayerPool;

/// Per-position score weighting. Profiles are supplied by configuration and
/// validated at load; the synthesizer never infers weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub ability: f64,
    pub form: f64,
    pub difficulty: f64,
}

/// Hard structural constraints every squad must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadRules {
    pub budget: f64,
    /// Exact per-position counts. Squad size is the sum of these.
    pub quotas: BTreeMap<String, usize>,
    /// Maximum players from any single club.
    pub club_cap: usize,
    /// Starting lineup size. 0 disables the formation constraint entirely.
    #[serde(default)]
    pub starting_size: usize,
    /// Per-position (min, max) counts for the starting lineup. A squad is
    /// formation-valid when at least one assignment within these ranges sums
    /// to `starting_size` using only players the squad holds.
    #[serde(default)]
    pub formation_ranges: BTreeMap<String, (usize, usize)>,
}

impl SquadRules {
    pub fn squad_size(&self) -> usize {
        self.quotas.values().sum()
    }

    /// Classic FPL ruleset: 15-man squad, 100.0 budget, max 3 per club,
    /// starting XI of 1 GK / 3-5 DEF / 2-5 MID / 1-3 FWD.
    pub fn fpl_default() -> Self {
        let quotas = [("GK", 2), ("DEF", 5), ("MID", 5), ("FWD", 3)]
            .into_iter()
            .map(|(position, count)| (position.to_string(), count))
            .collect();
        let formation_ranges = [
            ("GK", (1, 1)),
            ("DEF", (3, 5)),
            ("MID", (2, 5)),
            ("FWD", (1, 3)),
        ]
        .into_iter()
        .map(|(position, range)| (position.to_string(), range))
        .collect();
        Self {
            budget: 100.0,
            quotas,
            club_cap: 3,
            starting_size: 11,
            formation_ranges,
        }
    }
}

/// Knobs for the population search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneticSettings {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// Upper bound on the fraction of squad slots touched by one mutation.
    pub mutation_fraction: f64,
    pub elite_count: usize,
    /// Generations without any objective-best improving before early stop.
    /// 0 disables early stopping.
    pub patience: usize,
    /// Rejection-sampling attempts per member at initialization/re-seeding.
    pub max_init_attempts: usize,
    /// Swap budget for one repair invocation.
    pub max_repair_swaps: usize,
    /// Optional wall-clock budget in milliseconds, checked between
    /// generations. 0 means unlimited.
    #[serde(default)]
    pub time_budget_ms: u64,
}

impl Default for GeneticSettings {
    fn default() -> Self {
        Self {
            population_size: 120,
            generations: 200,
            crossover_rate: 0.8,
            mutation_rate: 0.25,
            mutation_fraction: 0.2,
            elite_count: 4,
            patience: 30,
            max_init_attempts: 2000,
            max_repair_swaps: 24,
            time_budget_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub rules: SquadRules,
    /// One profile per position appearing in the quotas.
    pub weights: BTreeMap<String, WeightProfile>,
    #[serde(default)]
    pub genetic: GeneticSettings,
    /// Shortlist length produced by the selector.
    pub shortlist_size: usize,
    /// Squads sharing more than this fraction of players collapse to the
    /// better representative in the shortlist.
    pub overlap_threshold: f64,
    pub seed: u64,
}

impl OptimizerConfig {
    pub fn fpl_default(seed: u64) -> Self {
        let rules = SquadRules::fpl_default();
        let weights = rules
            .quotas
            .keys()
            .map(|position| {
                (
                    position.clone(),
                    WeightProfile {
                        ability: 1.0,
                        form: 1.0,
                        difficulty: 1.0,
                    },
                )
            })
            .collect();
        Self {
            rules,
            weights,
            genetic: GeneticSettings::default(),
            shortlist_size: 5,
            overlap_threshold: 0.8,
            seed,
        }
    }

    /// Fatal feasibility screen, run before any optimization starts.
    pub fn validate(&self, pool: &PlayerPool) -> Result<(), ConfigError> {
        let rules = &self.rules;
        if rules.quotas.is_empty() {
            return Err(ConfigError::EmptyQuotas);
        }
        if self.genetic.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.genetic.elite_count > self.genetic.population_size {
            return Err(ConfigError::EliteExceedsPopulation {
                elite: self.genetic.elite_count,
                population: self.genetic.population_size,
            });
        }

        for position in rules.quotas.keys() {
            if !self.weights.contains_key(position) {
                return Err(ConfigError::MissingWeightProfile {
                    position: position.clone(),
                });
            }
        }

        let mut cheapest_total = 0.0;
        for (position, &count) in &rules.quotas {
            match pool.cheapest_fill(position, count) {
                Some(cost) => cheapest_total += cost,
                None => {
                    return Err(ConfigError::QuotaUnfillable {
                        position: position.clone(),
                        required: count,
                        available: pool.position_members(position).len(),
                    })
                }
            }
        }
        if cheapest_total > rules.budget {
            return Err(ConfigError::BudgetInfeasible {
                cheapest: cheapest_total,
                budget: rules.budget,
            });
        }

        if rules.club_cap == 0 || rules.squad_size() > rules.club_cap * pool.distinct_clubs() {
            return Err(ConfigError::ClubCapInfeasible {
                squad_size: rules.squad_size(),
                club_cap: rules.club_cap,
                clubs: pool.distinct_clubs(),
            });
        }

        if rules.starting_size > 0 {
            if rules.starting_size > rules.squad_size() {
                return Err(ConfigError::FormationUnsatisfiable);
            }
            let min_sum: usize = rules.formation_ranges.values().map(|&(min, _)| min).sum();
            let max_sum: usize = rules
                .formation_ranges
                .iter()
                .map(|(position, &(_, max))| {
                    max.min(rules.quotas.get(position).copied().unwrap_or(0))
                })
                .sum();
            if min_sum > rules.starting_size || max_sum < rules.starting_size {
                return Err(ConfigError::FormationUnsatisfiable);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyQuotas,
    EmptyPopulation,
    EliteExceedsPopulation { elite: usize, population: usize },
    MissingWeightProfile { position: String },
    QuotaUnfillable { position: String, required: usize, available: usize },
    BudgetInfeasible { cheapest: f64, budget: f64 },
    ClubCapInfeasible { squad_size: usize, club_cap: usize, clubs: usize },
    FormationUnsatisfiable,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuotas => write!(f, "no position quotas configured"),
            Self::EmptyPopulation => write!(f, "population size must be at least 1"),
            Self::EliteExceedsPopulation { elite, population } => write!(
                f,
                "elite count {elite} exceeds population size {population}"
            ),
            Self::MissingWeightProfile { position } => {
                write!(f, "no weight profile for position {position}")
            }
            Self::QuotaUnfillable {
                position,
                required,
                available,
            } => write!(
                f,
                "quota for {position} needs {required} players, pool has {available}"
            ),
            Self::BudgetInfeasible { cheapest, budget } => write!(
                f,
                "cheapest quota-satisfying squad costs {cheapest:.1}, budget is {budget:.1}"
            ),
            Self::ClubCapInfeasible {
                squad_size,
                club_cap,
                clubs,
            } => write!(
                f,
                "squad of {squad_size} cannot fit under club cap {club_cap} with {clubs} clubs"
            ),
            Self::FormationUnsatisfiable => {
                write!(f, "formation ranges cannot sum to the starting lineup size")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_config_json(path: impl AsRef<Path>) -> Result<OptimizerConfig, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(std::io::Error::other)
}
