//! Population initialization by rejection sampling.
//!
//! Initial members are drawn uniformly over quota-respecting combinations and
//! rejected wholesale on any violation; no repair happens at this stage. The
//! same sampler re-seeds the population when an individual is discarded as
//! unrepairable mid-run.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::config::SquadRules;
use crate::data::player::{PlayerId, PlayerPool};
use crate::squad::constraints::is_feasible;
use crate::squad::Squad;

/// Draw one feasible squad, or None when `max_attempts` rejections run out.
pub fn sample_feasible<R: Rng>(
    pool: &PlayerPool,
    rules: &SquadRules,
    rng: &mut R,
    max_attempts: usize,
) -> Option<Squad> {
    for _ in 0..max_attempts {
        let mut ids: Vec<PlayerId> = Vec::with_capacity(rules.squad_size());
        let mut short = false;
        for (position, &count) in &rules.quotas {
            let members = pool.position_members(position);
            if members.len() < count {
                short = true;
                break;
            }
            let mut indexes: Vec<usize> = (0..members.len()).collect();
            indexes.shuffle(rng);
            ids.extend(indexes[..count].iter().map(|&index| members[index].id));
        }
        if short {
            return None;
        }
        let squad = Squad::new(ids);
        if is_feasible(&squad, pool, rules) {
            return Some(squad);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// Rejection sampling could not fill the population.
    PoolExhausted { filled: usize, target: usize },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolExhausted { filled, target } => write!(
                f,
                "could only sample {filled} of {target} feasible squads"
            ),
        }
    }
}

impl std::error::Error for InitError {}

/// Fill a population of `size` feasible squads. Duplicates are allowed;
/// diversity pressure comes later from crowding.
pub fn initialize<R: Rng>(
    pool: &PlayerPool,
    rules: &SquadRules,
    size: usize,
    rng: &mut R,
    attempts_per_member: usize,
) -> Result<Vec<Squad>, InitError> {
    let mut members = Vec::with_capacity(size);
    for _ in 0..size {
        match sample_feasible(pool, rules, rng, attempts_per_member) {
            Some(squad) => members.push(squad),
            None => {
                return Err(InitError::PoolExhausted {
                    filled: members.len(),
                    target: size,
                })
            }
        }
    }
    Ok(members)
}
