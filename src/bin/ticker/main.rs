// Flowgame Ticker v0.2.0: headless game driver
// Builds a game, seeds players with random pledges, runs N ticks, prints the
// league table and optionally writes a JSON report.
//
// Usage:
//   cargo run --release --bin ticker                             # Demo network, 4 players, 100 ticks
//   cargo run --release --bin ticker -- --network data/sample_network.json
//   cargo run --release --bin ticker -- --players 10 --ticks 500 --seed 42
//   cargo run --release --bin ticker -- --config game.json --report run.json
//
// Logging goes through RUST_LOG (default: info).

mod demo;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use flowgame_engine::{EngineError, EngineResult, Game, GameConfig, NetworkData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use report::{Summary, TickerReport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    config: Option<PathBuf>,
    network: Option<PathBuf>,
    players: usize,
    ticks: u64,
    seed: Option<u64>,
    report: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        config: None,
        network: None,
        players: 4,
        ticks: 100,
        seed: None,
        report: None,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" => {
                cli.config = value.map(PathBuf::from);
                i += 1;
            }
            "--network" => {
                cli.network = value.map(PathBuf::from);
                i += 1;
            }
            "--players" => {
                cli.players = value.and_then(|v| v.parse().ok()).unwrap_or(4);
                i += 1;
            }
            "--ticks" => {
                cli.ticks = value.and_then(|v| v.parse().ok()).unwrap_or(100);
                i += 1;
            }
            "--seed" => {
                cli.seed = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--report" => {
                cli.report = value.map(PathBuf::from);
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {other}");
            }
        }
        i += 1;
    }

    cli
}

// ─── Setup ──────────────────────────────────────────────────────────────────

fn load_network(path: &Path) -> EngineResult<NetworkData> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
}

/// Spread each player's outflow budget at random over the policies it was
/// handed on creation.
fn seed_pledges(game: &mut Game, rng: &mut ChaCha8Rng) -> EngineResult<()> {
    let players: Vec<_> = game.players().iter().map(|p| p.id).collect();
    for player in players {
        let max_outflow = game
            .get_player(&player)?
            .player()
            .map_or(0.0, |p| p.max_outflow);
        let mut funding = game.get_funding(&player)?;
        if funding.is_empty() {
            continue;
        }

        let weights: Vec<f64> = funding.iter().map(|_| rng.gen_range(0.0..1.0)).collect();
        let sum: f64 = weights.iter().sum();
        let budget = max_outflow * rng.gen_range(0.5..1.0);
        for (entry, weight) in funding.iter_mut().zip(&weights) {
            entry.amount = if sum > 0.0 { budget * weight / sum } else { 0.0 };
        }
        game.set_funding(&player, &funding)?;
    }
    Ok(())
}

// ─── Run ────────────────────────────────────────────────────────────────────

fn run(cli: &CliArgs) -> EngineResult<()> {
    let mut config = match &cli.config {
        Some(path) => GameConfig::from_path(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let mut game = Game::new(config.clone());

    match &cli.network {
        Some(path) => game.create_network(&load_network(path)?)?,
        None => demo::build(&mut game)?,
    }
    for i in 0..cli.players {
        game.create_player(&format!("Player {}", i + 1))?;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
    seed_pledges(&mut game, &mut rng)?;

    println!("\n  Flowgame Ticker v0.2.0");
    println!(
        "  PRNG: ChaCha8Rng | Seed: {} | Players: {} | Ticks: {}\n",
        config.seed, cli.players, cli.ticks
    );

    let start = Instant::now();
    let mut ticks = Vec::with_capacity(cli.ticks as usize);
    for _ in 0..cli.ticks {
        ticks.push(game.tick()?);
    }
    let elapsed = start.elapsed();

    let summary = Summary::from_ticks(&ticks, cli.players);
    let league = game.league_table();

    println!("  {:<4} {:<16} {:<24} {:>14} {:>14}", "#", "Player", "Goal", "Contribution", "Goal total");
    println!("  {}", "-".repeat(76));
    for (rank, row) in league.iter().enumerate() {
        println!(
            "  {:<4} {:<16} {:<24} {:>14.2} {:>14.2}",
            rank + 1,
            row.name,
            row.goal,
            row.goal_contribution,
            row.goal_total
        );
    }
    println!("  {}", "-".repeat(76));
    println!(
        "  Leaked: {:.2}  Injected: {:.2}  Burned: {:.2}  Max conservation error: {:.2e}",
        summary.total_leaked, summary.total_injected, summary.total_burned, summary.max_conservation_error
    );
    println!("  Run time: {:.1}ms\n", elapsed.as_secs_f64() * 1000.0);

    if let Some(path) = &cli.report {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().to_string())
            .unwrap_or_default();
        let report = TickerReport {
            timestamp,
            version: "0.2.0",
            prng: "ChaCha8Rng",
            config,
            summary,
            league_table: league,
            network: game.get_network(None)?,
            ticks,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| EngineError::Config(format!("report: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = parse_args();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "ticker failed");
            ExitCode::FAILURE
        }
    }
}
