//! Memorabilia - CLI
//!
//! Plays local sessions and inspects the leaderboard.

#![warn(missing_docs)]

mod cli;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use memorabilia::{
    Clock, DeckGenerator, Difficulty, EngineConfig, FlipOutcome, LeaderboardSync, LocalSimulator,
    Page, RecordStore, ScoringEngine, SessionController, SqliteStore, SystemClock, TierTable,
    ToriiClient, WsPushTransport,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Play {
            difficulty,
            games,
            misses,
            seed,
        } => run_play(&config, difficulty, games, misses, seed).await,
        Command::Leaderboard {
            limit,
            offset,
            remote,
        } => run_leaderboard(&config, limit, offset, remote).await,
        Command::Profile { player, all } => run_profile(&config, player, all),
        Command::Watch => run_watch(&config).await,
        Command::Clear => run_clear(&config),
    }
}

/// Loads the config file (if any), then applies environment overrides.
#[instrument(skip(cli))]
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = config.apply_env()?;
    if let Some(path) = &cli.store_path {
        config = config.with_store_path(path.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Opens the local leaderboard, wiring the indexer and push channel when configured.
fn open_leaderboard(config: &EngineConfig) -> Result<LeaderboardSync> {
    let store = SqliteStore::open(config.store_path().clone())
        .with_context(|| format!("opening store at {}", config.store_path()))?;
    let mut sync = LeaderboardSync::new(RecordStore::new(Arc::new(store)))
        .with_capacity(*config.leaderboard_capacity());
    if let Some(url) = config.torii_url() {
        sync = sync
            .with_indexer(Arc::new(ToriiClient::new(url.clone())))
            .with_push(
                Arc::new(WsPushTransport::from_indexer_url(url)),
                config.backoff_policy(),
            );
    }
    Ok(sync)
}

/// Plays sessions against the local simulator with a perfect-recall strategy.
#[instrument(skip(config))]
async fn run_play(
    config: &EngineConfig,
    difficulty: Difficulty,
    games: u32,
    misses: u32,
    seed: Option<u64>,
) -> Result<()> {
    if *config.mode() != memorabilia::ExecutionMode::Local {
        bail!("the play command drives the local simulator; set mode = \"local\"");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tiers = TierTable::standard();
    let scoring = ScoringEngine::new(tiers.clone());
    let deck = match seed {
        Some(seed) => DeckGenerator::seeded(tiers, seed),
        None => DeckGenerator::new(tiers),
    };
    let identity = config.identity();
    let simulator = LocalSimulator::new(
        identity.player_id().clone(),
        deck,
        scoring.clone(),
        clock.clone(),
    );
    let leaderboard = Arc::new(open_leaderboard(config)?);
    let controller = SessionController::new(
        Arc::new(simulator),
        scoring,
        identity,
        config.timing(),
        clock,
    )
    .with_leaderboard(leaderboard);

    for game in 1..=games {
        let session = controller.start_session(difficulty).await?;
        println!(
            "Game {game}: session {} ({}, {} tiles)",
            session.id(),
            difficulty.era_name(),
            session.tiles().len()
        );
        controller.wait_for_preview().await;

        let mut pairs: BTreeMap<_, Vec<usize>> = BTreeMap::new();
        for tile in session.tiles() {
            pairs.entry(tile.value()).or_default().push(tile.index());
        }
        let pairs: Vec<Vec<usize>> = pairs.into_values().collect();

        for miss in 0..misses as usize {
            let (Some(a), Some(b)) = (pairs.get(miss % pairs.len()), pairs.get((miss + 1) % pairs.len()))
            else {
                break;
            };
            if a[0] == b[0] {
                break;
            }
            controller.flip(a[0]).await?;
            let outcome = controller.flip(b[0]).await?;
            info!(?outcome, "Deliberate miss");
        }

        for pair in &pairs {
            controller.flip(pair[0]).await?;
            match controller.flip(pair[1]).await? {
                FlipOutcome::Completed(summary) => {
                    println!(
                        "  completed: score {} | {} stars | grade {} | {} moves | {:.1}s | rank {}",
                        summary.score(),
                        summary.stars().count(),
                        summary.grade(),
                        summary.moves(),
                        summary.elapsed_seconds(),
                        summary
                            .rank()
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
                FlipOutcome::Matched { .. } => {}
                other => warn!(?other, "Unexpected flip outcome"),
            }
        }
    }
    Ok(())
}

/// Prints the leaderboard and local stats.
#[instrument(skip(config))]
async fn run_leaderboard(
    config: &EngineConfig,
    limit: usize,
    offset: usize,
    remote: bool,
) -> Result<()> {
    let sync = open_leaderboard(config)?;
    let entries = if remote {
        sync.fetch_top(limit).await?
    } else {
        sync.page(Page::new(limit, offset))?
    };

    if entries.is_empty() {
        println!("No scores yet.");
    }
    for entry in &entries {
        let record = entry.record();
        println!(
            "{:>3}. {:<20} {:>6}  {:<15} {:>3} moves {:>6.1}s  [{}]",
            entry.rank(),
            record.player_name(),
            record.score(),
            record.era_name(),
            record.moves(),
            record.elapsed_seconds(),
            entry.source(),
        );
    }

    let stats = sync.stats()?;
    println!(
        "\n{} players, {} games, average {:.0}, best {}",
        stats.total_players(),
        stats.total_games(),
        stats.average_score(),
        stats.highest_score()
    );
    Ok(())
}

/// Prints one player profile, or a line per stored profile with `all`.
#[instrument(skip(config))]
fn run_profile(config: &EngineConfig, player: Option<String>, all: bool) -> Result<()> {
    let sync = open_leaderboard(config)?;
    if all {
        let profiles = sync.profiles()?;
        if profiles.is_empty() {
            println!("No profiles stored.");
        }
        for profile in profiles {
            println!(
                "{:<24} {:<16} games {:>4} | best {:>6}",
                profile.player_id(),
                profile.display_name(),
                profile.total_games(),
                profile.best_score()
            );
        }
        return Ok(());
    }

    let player = player.unwrap_or_else(|| config.player_id().clone());
    match sync.profile(&player)? {
        Some(profile) => {
            println!("{} ({})", profile.display_name(), profile.player_id());
            println!("  games:   {}", profile.total_games());
            println!("  wins:    {}", profile.wins());
            println!("  best:    {}", profile.best_score());
            println!("  average: {:.1}", profile.average_score());
            if let Some(last) = profile.last_played() {
                println!("  last:    {}", last.to_rfc3339());
            }
        }
        None => println!("No profile for {player}."),
    }
    Ok(())
}

/// Streams account updates until interrupted.
#[instrument(skip(config))]
async fn run_watch(config: &EngineConfig) -> Result<()> {
    if config.torii_url().is_none() {
        bail!("watch needs torii_url or MEMORABILIA_TORII_URL");
    }
    let sync = open_leaderboard(config)?;
    sync.subscribe(|account| {
        println!(
            "{} | games {} | last active {}",
            account.telegram_id(),
            account.total_games(),
            account
                .last_active()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        );
    })?;
    info!("Watching for account updates; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    sync.unsubscribe();
    Ok(())
}

/// Deletes local data.
#[instrument(skip(config))]
fn run_clear(config: &EngineConfig) -> Result<()> {
    open_leaderboard(config)?.clear()?;
    println!("Local leaderboard and profiles cleared.");
    Ok(())
}
