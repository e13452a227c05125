use serde::Serialize;

use crate::data::comparison::{
    load_comparisons_csv, load_comparisons_json, Comparison, ComparisonWindow,
};
use crate::data::config::{load_config_json, OptimizerConfig};
use crate::data::player::{load_players_csv, load_players_json, PlayerId, PlayerPool};
use crate::optimizer::{build_projections, selector::select_shortlist};
use crate::parallel::{run_optimization_batches, WorkerPool};
use crate::rating::RatingEngine;
use crate::report::{build_reports, write_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Optimize,
    Rate,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("optimize") => Some(Command::Optimize),
        Some("rate") => Some(Command::Rate),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Optimize) => handle_optimize(args),
        Some(Command::Rate) => handle_rate(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("usage: gaffer <optimize|rate|validate>");
            2
        }
    }
}

fn handle_optimize(args: &[String]) -> i32 {
    let Some(players_path) = args.get(2) else {
        eprintln!("usage: gaffer optimize <players.json|csv> [comparisons] [config] [seed] [--csv]");
        return 2;
    };

    let pool = match load_pool(players_path) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("failed to load players from '{players_path}': {err}");
            return 1;
        }
    };

    let comparisons = match args.get(3).map(String::as_str).filter(|path| *path != "-") {
        Some(path) => match load_feed(path) {
            Ok(records) => records,
            Err(err) => {
                eprintln!("failed to load comparisons from '{path}': {err}");
                return 1;
            }
        },
        None => Vec::new(),
    };

    let mut config = match args.get(4).filter(|path| !path.starts_with("--")) {
        Some(path) => match load_config_json(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config from '{path}': {err}");
                return 1;
            }
        },
        None => OptimizerConfig::fpl_default(7),
    };
    config.seed = parse_u64_arg(
        args.get(5).filter(|value| !value.starts_with("--")),
        "seed",
        config.seed,
    );
    let as_csv = args.iter().any(|arg| arg == "--csv");

    let mut feed = ComparisonWindow::new(0);
    feed.extend(comparisons);
    let window = feed.in_window();

    let (snapshot, projections) = match build_projections(&pool, &window, &config) {
        Ok(built) => built,
        Err(err) => {
            eprintln!("projection failed: {err}");
            return 1;
        }
    };
    if !snapshot.refinement.converged() {
        eprintln!("warning: rating refinement hit the pass cap before converging");
    }

    let workers = WorkerPool::from_env("GAFFER_WORKERS");
    let outcome = match run_optimization_batches(&pool, &projections, &config, &workers, |done, total| {
        if done % 50 == 0 || done == total {
            eprintln!("generation {done}/{total}");
        }
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("optimization failed: {err}");
            return 1;
        }
    };
    if outcome.deadline_hit {
        eprintln!(
            "time budget reached after {} generation(s)",
            outcome.generations_run
        );
    }

    let shortlist = select_shortlist(
        &outcome.front,
        config.shortlist_size,
        config.overlap_threshold,
    );
    let reports = build_reports(&outcome.front, &shortlist, &pool, &projections, &config.rules);

    if as_csv {
        if let Err(err) = write_csv(&reports, std::io::stdout().lock()) {
            eprintln!("failed to write csv: {err}");
            return 1;
        }
        0
    } else {
        match serde_json::to_string_pretty(&reports) {
            Ok(payload) => {
                println!("{payload}");
                0
            }
            Err(err) => {
                eprintln!("failed to serialize shortlist: {err}");
                1
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RatingLine {
    id: PlayerId,
    name: String,
    theta: f64,
    variance: f64,
    observations: usize,
    low_confidence: bool,
}

fn handle_rate(args: &[String]) -> i32 {
    let (Some(players_path), Some(feed_path)) = (args.get(2), args.get(3)) else {
        eprintln!("usage: gaffer rate <players.json|csv> <comparisons.json|csv> [window_gameweeks]");
        return 2;
    };
    let window_gameweeks = parse_u32_arg(args.get(4), "window_gameweeks", 0);

    let pool = match load_pool(players_path) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("failed to load players from '{players_path}': {err}");
            return 1;
        }
    };
    let records = match load_feed(feed_path) {
        Ok(records) => records,
        Err(err) => {
            eprintln!("failed to load comparisons from '{feed_path}': {err}");
            return 1;
        }
    };

    let mut feed = ComparisonWindow::new(window_gameweeks);
    feed.extend(records);
    let window = feed.in_window();

    let ids: Vec<PlayerId> = pool.ids().collect();
    let snapshot = RatingEngine::default().refine(&ids, &window);
    if !snapshot.refinement.converged() {
        eprintln!("warning: rating refinement hit the pass cap before converging");
    }

    let mut lines: Vec<RatingLine> = snapshot
        .iter()
        .map(|(&id, rating)| RatingLine {
            id,
            name: pool
                .get(id)
                .map(|player| player.name.clone())
                .unwrap_or_default(),
            theta: rating.theta,
            variance: rating.variance,
            observations: rating.observations,
            low_confidence: rating.low_confidence,
        })
        .collect();
    lines.sort_by(|left, right| right.theta.total_cmp(&left.theta).then(left.id.cmp(&right.id)));

    match serde_json::to_string_pretty(&lines) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize ratings: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(players_path) = args.get(2) else {
        eprintln!("usage: gaffer validate <players.json|csv> [config.json]");
        return 2;
    };

    let pool = match load_pool(players_path) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("failed to load players from '{players_path}': {err}");
            return 1;
        }
    };
    let config = match args.get(3) {
        Some(path) => match load_config_json(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config from '{path}': {err}");
                return 1;
            }
        },
        None => OptimizerConfig::fpl_default(0),
    };

    match config.validate(&pool) {
        Ok(()) => {
            println!(
                "validation passed: {} player(s), budget {:.1}",
                pool.len(),
                config.rules.budget
            );
            0
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            1
        }
    }
}

fn load_pool(path: &str) -> Result<PlayerPool, std::io::Error> {
    if path.ends_with(".csv") {
        load_players_csv(path)
    } else {
        load_players_json(path)
    }
}

fn load_feed(path: &str) -> Result<Vec<Comparison>, std::io::Error> {
    if path.ends_with(".csv") {
        load_comparisons_csv(path)
    } else {
        load_comparisons_json(path)
    }
}

fn parse_u32_arg(raw: Option<&String>, name: &str, default: u32) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
