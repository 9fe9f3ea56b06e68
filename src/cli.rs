//! Command-line interface for memorabilia.

use clap::{Parser, Subcommand};
use memorabilia::Difficulty;

/// Memorabilia - ledger-backed memory game engine
#[derive(Parser, Debug)]
#[command(name = "memorabilia")]
#[command(about = "Session engine and leaderboard for a tile-matching memory game", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Override the SQLite store path
    #[arg(long, global = true)]
    pub store_path: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play sessions against the local simulator and commit the scores
    Play {
        /// Difficulty tier (easy, medium, hard)
        #[arg(short, long, default_value = "easy")]
        difficulty: Difficulty,

        /// Number of sessions to play
        #[arg(short, long, default_value = "1")]
        games: u32,

        /// Deliberate mismatches before playing perfectly
        #[arg(long, default_value = "0")]
        misses: u32,

        /// Seed for reproducible boards
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the leaderboard
    Leaderboard {
        /// Number of entries
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Entries to skip (local board only)
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Merge with the remote indexer
        #[arg(long)]
        remote: bool,
    },

    /// Show a player profile
    Profile {
        /// Player id; defaults to the configured player
        #[arg(long, conflicts_with = "all")]
        player: Option<String>,

        /// List every stored profile instead
        #[arg(long)]
        all: bool,
    },

    /// Print live account updates from the indexer push channel
    Watch,

    /// Delete all local profiles and leaderboard entries
    Clear,
}
