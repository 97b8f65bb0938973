use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use threes_ai::config::HeuristicWeights;
use threes_ai::engine::Tables;
use threes_ai::expectimax::{Expectimax, ExpectimaxConfig};
use threes_ai::game::{play_from, Game};
use threes_ai::trace::{self, GameRecord, Meta, FORMAT_VERSION};

#[derive(Debug, Parser)]
#[command(name = "threes-ai", version, about = "Play Threes! with an expectimax policy")]
struct Args {
    /// Number of games to play (run in parallel)
    #[arg(short = 'n', long, default_value_t = 1)]
    games: u32,

    /// Seed for the first game; game i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// Seven comma-separated heuristic weights: mono power, mono weight,
    /// sum power, sum weight, merges, 1-2 merges, empty
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        conflicts_with = "weights_file"
    )]
    weights: Option<Vec<f32>>,

    /// JSON file with heuristic weights (missing fields take defaults)
    #[arg(long, value_name = "PATH")]
    weights_file: Option<PathBuf>,

    /// Move plies searched below each top-level move
    #[arg(long, default_value_t = 4)]
    depth: u32,

    /// Stop each game after this many moves
    #[arg(long)]
    steps: Option<u32>,

    /// Write one JSON record per game into this directory
    #[arg(long, value_name = "DIR")]
    record: Option<PathBuf>,

    /// No progress bar and no board printing
    #[arg(short, long)]
    quiet: bool,
}

fn load_weights(args: &Args) -> Result<HeuristicWeights> {
    if let Some(values) = &args.weights {
        return Ok(HeuristicWeights::from_slice(values)?);
    }
    if let Some(path) = &args.weights_file {
        return HeuristicWeights::from_json_path(path)
            .with_context(|| format!("loading weights from {}", path.display()));
    }
    Ok(HeuristicWeights::default())
}

fn run_game(
    tables: &Tables,
    cfg: &ExpectimaxConfig,
    seed: u64,
    steps: Option<u32>,
    verbose: bool,
) -> GameRecord {
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ex = Expectimax::with_config(tables, cfg.clone());
    let game = Game::new(&mut rng);
    let meta = Meta {
        version: FORMAT_VERSION,
        seed,
        steps: 0,
        start_unix_s: trace::now_unix_seconds(),
        elapsed_s: 0.0,
        score: 0.0,
        max_rank: 0,
        depth_limit: cfg.depth_limit,
        weights: tables.weights().clone(),
    };
    let mut record = GameRecord::new(meta, game.board());
    if verbose {
        println!("{}", game.board());
    }

    let summary = play_from(
        tables,
        &mut rng,
        game,
        |g, turn| {
            if steps.is_some_and(|limit| g.moves() >= limit) {
                return None;
            }
            ex.best_move(g.board(), turn.deck, turn.tileset)
        },
        |turn, dir, board| {
            record.push(turn.deck, turn.tileset, dir, board);
            if verbose {
                println!("Move #{}: {:?}, next tile {:?}", record.meta.steps, dir, turn.tileset);
                println!("{}", board);
            }
        },
    );

    record.meta.elapsed_s = start.elapsed().as_secs_f32();
    record.meta.score = summary.score;
    record.meta.max_rank = summary.max_rank;
    debug!("seed {} finished in {:.1}s", seed, record.meta.elapsed_s);
    record
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let weights = load_weights(&args)?;
    debug!("heuristic weights: {:?}", weights);
    let tables = Tables::new(&weights);
    let cfg = ExpectimaxConfig { depth_limit: args.depth, ..ExpectimaxConfig::default() };
    let base_seed = args.seed.unwrap_or_else(rand::random);

    if let Some(dir) = &args.record {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let verbose = args.games == 1 && !args.quiet;
    let pb = if args.quiet || verbose {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games as u64);
        pb.set_style(ProgressStyle::with_template(
            "{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} games ({eta})",
        )?);
        pb
    };

    let records: Vec<GameRecord> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            let record = run_game(&tables, &cfg, seed, args.steps, verbose);
            pb.inc(1);
            record
        })
        .collect();
    pb.finish_and_clear();

    for record in &records {
        let m = &record.meta;
        println!(
            "seed {}: moves {} | score {:.0} | max rank {}",
            m.seed, m.steps, m.score, m.max_rank
        );
        if let Some(dir) = &args.record {
            let path = dir.join(format!("game-{}.json", m.seed));
            trace::write_record_to_path(&path, record)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    if records.len() > 1 {
        let mean = records.iter().map(|r| r.meta.score as f64).sum::<f64>() / records.len() as f64;
        let best = records.iter().map(|r| r.meta.max_rank).max().unwrap_or(0);
        println!("games: {} | mean score: {:.1} | best max rank: {}", records.len(), mean, best);
    }
    Ok(())
}
