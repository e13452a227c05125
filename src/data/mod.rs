pub mod comparison;
pub mod config;
pub mod player;

pub use comparison::{Comparison, ComparisonWindow, Outcome};
pub use config::{GeneticSettings, OptimizerConfig, SquadRules, WeightProfile};
pub use player::{Player, PlayerId, PlayerPool};
