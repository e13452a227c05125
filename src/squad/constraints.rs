//! Stateless constraint checking and minimal-change repair.
//!
//! Repair priority is fixed: club cap first, then position quotas, then
//! budget. Each step swaps in the alternative with the smallest price delta
//! that does not break an already-satisfied higher-priority constraint, and
//! gives up explicitly after a bounded number of swaps.

use std::fmt;

use crate::data::config::SquadRules;
use crate::data::player::{Player, PlayerId, PlayerPool};
use crate::squad::{has_valid_formation, Squad};

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    QuotaMismatch {
        position: String,
        expected: usize,
        actual: usize,
    },
    ClubCapExceeded {
        club: String,
        count: usize,
        cap: usize,
    },
    OverBudget {
        total: f64,
        budget: f64,
    },
    NoValidFormation,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaMismatch {
                position,
                expected,
                actual,
            } => write!(f, "{position}: expected {expected}, holding {actual}"),
            Self::ClubCapExceeded { club, count, cap } => {
                write!(f, "{club}: {count} players over cap {cap}")
            }
            Self::OverBudget { total, budget } => {
                write!(f, "total price {total:.1} over budget {budget:.1}")
            }
            Self::NoValidFormation => write!(f, "no valid starting lineup"),
        }
    }
}

/// All constraint violations of a squad, in repair-priority order.
pub fn violations(squad: &Squad, pool: &PlayerPool, rules: &SquadRules) -> Vec<Violation> {
    let mut found = Vec::new();

    for (club, count) in squad.club_counts(pool) {
        if count > rules.club_cap {
            found.push(Violation::ClubCapExceeded {
                club,
                count,
                cap: rules.club_cap,
            });
        }
    }

    let counts = squad.position_counts(pool);
    for (position, &expected) in &rules.quotas {
        let actual = counts.get(position).copied().unwrap_or(0);
        if actual != expected {
            found.push(Violation::QuotaMismatch {
                position: position.clone(),
                expected,
                actual,
            });
        }
    }
    // Positions outside the quotas are a mismatch too (expected zero).
    for (position, &actual) in &counts {
        if !rules.quotas.contains_key(position) && actual > 0 {
            found.push(Violation::QuotaMismatch {
                position: position.clone(),
                expected: 0,
                actual,
            });
        }
    }

    let total = squad.total_price(pool);
    if total > rules.budget {
        found.push(Violation::OverBudget {
            total,
            budget: rules.budget,
        });
    }

    if !has_valid_formation(&counts, rules) {
        found.push(Violation::NoValidFormation);
    }

    found
}

pub fn is_feasible(squad: &Squad, pool: &PlayerPool, rules: &SquadRules) -> bool {
    violations(squad, pool, rules).is_empty()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairError {
    /// No feasible swap sequence was found within the swap budget.
    Unrepairable { swaps_tried: usize },
}

impl fmt::Display for RepairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrepairable { swaps_tried } => {
                write!(f, "squad unrepairable after {swaps_tried} swaps")
            }
        }
    }
}

impl std::error::Error for RepairError {}

/// Repair a squad back to feasibility with at most `max_swaps` single-player
/// swaps. Feasible squads are returned unchanged (repair is idempotent).
pub fn repair(
    squad: &Squad,
    pool: &PlayerPool,
    rules: &SquadRules,
    max_swaps: usize,
) -> Result<Squad, RepairError> {
    let mut current = squad.clone();
    for swaps_tried in 0..=max_swaps {
        let found = violations(&current, pool, rules);
        if found.is_empty() {
            return Ok(current);
        }
        if swaps_tried == max_swaps {
            break;
        }

        let next = match &found[0] {
            Violation::ClubCapExceeded { club, .. } => fix_club_cap(&current, pool, rules, club),
            Violation::QuotaMismatch { .. } => fix_quota(&current, pool, rules),
            Violation::OverBudget { .. } => fix_budget(&current, pool, rules),
            // A formation-only violation means the position mix is legal for
            // the quotas but not startable, which the quota repair path also
            // resolves; with quota == mix this cannot be improved by swapping
            // within quotas, so give up.
            Violation::NoValidFormation => None,
        };
        match next {
            Some(repaired) => current = repaired,
            None => return Err(RepairError::Unrepairable { swaps_tried }),
        }
    }
    Err(RepairError::Unrepairable {
        swaps_tried: max_swaps,
    })
}

/// Candidate swap: replace `out` by `in_`. Ordered by absolute price delta,
/// then ids, for deterministic repair.
fn best_swap<F>(
    squad: &Squad,
    pool: &PlayerPool,
    accept: F,
) -> Option<(PlayerId, PlayerId)>
where
    F: Fn(&Player, &Player) -> bool,
{
    let mut best: Option<(f64, PlayerId, PlayerId)> = None;
    for &out_id in squad.ids() {
        let Some(out) = pool.get(out_id) else { continue };
        for in_ in pool.position_members(&out.position) {
            if squad.contains(in_.id) || !accept(out, in_) {
                continue;
            }
            let delta = (in_.price - out.price).abs();
            let candidate = (delta, out_id, in_.id);
            if best.is_none_or(|b| candidate.0 < b.0
                || (candidate.0 == b.0 && (candidate.1, candidate.2) < (b.1, b.2)))
            {
                best = Some(candidate);
            }
        }
    }
    best.map(|(_, out, in_)| (out, in_))
}

fn fix_club_cap(
    squad: &Squad,
    pool: &PlayerPool,
    rules: &SquadRules,
    club: &str,
) -> Option<Squad> {
    let club_counts = squad.club_counts(pool);
    let swap = best_swap(squad, pool, |out, in_| {
        if out.club != club || in_.club == club {
            return false;
        }
        // The incoming player's club must stay under the cap after the swap.
        club_counts.get(&in_.club).copied().unwrap_or(0) < rules.club_cap
    })?;
    Some(squad.swap(swap.0, swap.1))
}

fn fix_quota(squad: &Squad, pool: &PlayerPool, rules: &SquadRules) -> Option<Squad> {
    let counts = squad.position_counts(pool);
    let surplus = counts
        .iter()
        .find(|(position, &actual)| {
            actual > rules.quotas.get(*position).copied().unwrap_or(0)
        })
        .map(|(position, _)| position.clone())?;
    let deficit = rules
        .quotas
        .iter()
        .find(|(position, &expected)| counts.get(*position).copied().unwrap_or(0) < expected)
        .map(|(position, _)| position.clone())?;

    let club_counts = squad.club_counts(pool);
    // Cross-position swap: drop one surplus-position player, add one
    // deficit-position player. Scan manually since best_swap is same-position.
    let mut best: Option<(f64, PlayerId, PlayerId)> = None;
    for &out_id in squad.ids() {
        let Some(out) = pool.get(out_id) else { continue };
        if out.position != surplus {
            continue;
        }
        for in_ in pool.position_members(&deficit) {
            if squad.contains(in_.id) {
                continue;
            }
            // Do not trade a quota fix for a club-cap break.
            let incoming_club = club_counts.get(&in_.club).copied().unwrap_or(0)
                + usize::from(in_.club != out.club);
            if in_.club != out.club && incoming_club > rules.club_cap {
                continue;
            }
            let delta = (in_.price - out.price).abs();
            let candidate = (delta, out_id, in_.id);
            if best.is_none_or(|b| candidate.0 < b.0
                || (candidate.0 == b.0 && (candidate.1, candidate.2) < (b.1, b.2)))
            {
                best = Some(candidate);
            }
        }
    }
    best.map(|(_, out, in_)| squad.swap(out, in_))
}

fn fix_budget(squad: &Squad, pool: &PlayerPool, rules: &SquadRules) -> Option<Squad> {
    let club_counts = squad.club_counts(pool);
    let total = squad.total_price(pool);
    let excess = total - rules.budget;

    // Prefer the cheapest swap that clears the whole excess in one move;
    // otherwise take the biggest available saving and loop.
    let mut clearing: Option<(f64, PlayerId, PlayerId)> = None;
    let mut deepest: Option<(f64, PlayerId, PlayerId)> = None;
    for &out_id in squad.ids() {
        let Some(out) = pool.get(out_id) else { continue };
        for in_ in pool.position_members(&out.position) {
            if squad.contains(in_.id) {
                continue;
            }
            let saving = out.price - in_.price;
            if saving <= 0.0 {
                continue;
            }
            if in_.club != out.club
                && club_counts.get(&in_.club).copied().unwrap_or(0) >= rules.club_cap
            {
                continue;
            }
            if saving >= excess {
                let candidate = (saving, out_id, in_.id);
                if clearing.is_none_or(|b| candidate.0 < b.0
                    || (candidate.0 == b.0 && (candidate.1, candidate.2) < (b.1, b.2)))
                {
                    clearing = Some(candidate);
                }
            }
            let candidate = (saving, out_id, in_.id);
            if deepest.is_none_or(|b| candidate.0 > b.0
                || (candidate.0 == b.0 && (candidate.1, candidate.2) < (b.1, b.2)))
            {
                deepest = Some(candidate);
            }
        }
    }
    clearing
        .or(deepest)
        .map(|(_, out, in_)| squad.swap(out, in_))
}
