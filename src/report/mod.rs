//! Shortlist reporting: the selected front members flattened into
//! serializable rows for JSON output and CSV export.

use serde::Serialize;

use crate::data::config::SquadRules;
use crate::data::player::{PlayerId, PlayerPool};
use crate::optimizer::evolve::Individual;
use crate::score::ProjectionTable;
use crate::squad::best_lineup;

/// One player row inside a squad report.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerLine {
    pub id: PlayerId,
    pub name: String,
    pub position: String,
    pub club: String,
    pub price: f64,
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
    pub low_confidence: bool,
    /// Member of the best starting lineup, not the bench.
    pub starting: bool,
}

/// One shortlisted squad with its fitness breakdown and best lineup.
#[derive(Debug, Clone, Serialize)]
pub struct SquadReport {
    /// 1-based shortlist position.
    pub rank: usize,
    pub expected_points: f64,
    pub risk: f64,
    pub diversity: f64,
    pub synergy: f64,
    pub total_price: f64,
    /// Starting lineup ids in position order; empty when the rules carry no
    /// starting lineup.
    pub starting: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
    pub players: Vec<PlayerLine>,
}

/// Build one report per shortlist entry, in shortlist order.
pub fn build_reports(
    front: &[Individual],
    shortlist: &[usize],
    pool: &PlayerPool,
    projections: &ProjectionTable,
    rules: &SquadRules,
) -> Vec<SquadReport> {
    shortlist
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let member = &front[index];
            let starting = best_lineup(&member.squad, pool, rules, |id| {
                projections.get(id).map_or(0.0, |projection| projection.expected)
            })
            .map(|(lineup, _)| lineup)
            .unwrap_or_default();

            let bench: Vec<PlayerId> = member
                .squad
                .ids()
                .iter()
                .copied()
                .filter(|id| !starting.contains(id))
                .collect();

            let players = member
                .squad
                .ids()
                .iter()
                .filter_map(|&id| {
                    let player = pool.get(id)?;
                    let projection = projections.get(id)?;
                    Some(PlayerLine {
                        id,
                        name: player.name.clone(),
                        position: player.position.clone(),
                        club: player.club.clone(),
                        price: player.price,
                        expected: projection.expected,
                        lower: projection.lower,
                        upper: projection.upper,
                        confidence: projection.confidence,
                        low_confidence: projection.low_confidence,
                        starting: starting.contains(&id),
                    })
                })
                .collect();

            SquadReport {
                rank: position + 1,
                expected_points: member.fitness.expected_points,
                risk: member.fitness.risk,
                diversity: member.fitness.diversity,
                synergy: member.fitness.synergy,
                total_price: member.price,
                starting,
                bench,
                players,
            }
        })
        .collect()
}

/// Write the reports as flat CSV, one row per player, squad rank first.
pub fn write_csv<W: std::io::Write>(
    reports: &[SquadReport],
    writer: W,
) -> Result<(), std::io::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "squad_rank",
            "id",
            "name",
            "position",
            "club",
            "price",
            "expected",
            "lower",
            "upper",
            "confidence",
            "low_confidence",
            "starting",
        ])
        .map_err(std::io::Error::other)?;
    for report in reports {
        for line in &report.players {
            csv_writer
                .write_record([
                    report.rank.to_string(),
                    line.id.to_string(),
                    line.name.clone(),
                    line.position.clone(),
                    line.club.clone(),
                    format!("{:.1}", line.price),
                    format!("{:.4}", line.expected),
                    format!("{:.4}", line.lower),
                    format!("{:.4}", line.upper),
                    format!("{:.4}", line.confidence),
                    line.low_confidence.to_string(),
                    line.starting.to_string(),
                ])
                .map_err(std::io::Error::other)?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}
