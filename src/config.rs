//! Engine configuration loaded from TOML with environment overrides.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::leaderboard::{BackoffPolicy, DEFAULT_CAPACITY};
use crate::ledger::{ConfirmationPolicy, ExecutionMode, ReceiptSchema};
use crate::session::{PlayerIdentity, SessionTiming};

/// Environment variable overriding [`EngineConfig::rpc_url`].
pub const ENV_RPC_URL: &str = "MEMORABILIA_RPC_URL";
/// Environment variable overriding [`EngineConfig::torii_url`].
pub const ENV_TORII_URL: &str = "MEMORABILIA_TORII_URL";
/// Environment variable overriding [`EngineConfig::world_address`].
pub const ENV_WORLD_ADDRESS: &str = "MEMORABILIA_WORLD_ADDRESS";
/// Environment variable overriding [`EngineConfig::mode`].
pub const ENV_MODE: &str = "MEMORABILIA_MODE";

/// Runtime settings of the session engine.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Local simulation or remote contract.
    #[serde(default)]
    mode: ExecutionMode,

    /// Player id used for sessions and the leaderboard.
    #[serde(default = "default_player_id")]
    player_id: String,

    /// Leaderboard display name.
    #[serde(default = "default_display_name")]
    display_name: String,

    /// JSON-RPC endpoint of the ledger provider.
    #[serde(default)]
    rpc_url: Option<String>,

    /// Indexer base URL.
    #[serde(default)]
    torii_url: Option<String>,

    /// Address of the game contract.
    #[serde(default)]
    world_address: Option<String>,

    /// Receipt layout of the provider.
    #[serde(default)]
    receipt_schema: ReceiptSchema,

    /// Board preview before play, in milliseconds.
    #[serde(default = "default_preview_ms")]
    preview_ms: u64,

    /// Time a mismatched pair stays face-up, in milliseconds.
    #[serde(default = "default_mismatch_settle_ms")]
    mismatch_settle_ms: u64,

    /// Upper bound on waiting for a transaction receipt, in milliseconds.
    #[serde(default = "default_confirmation_timeout_ms")]
    confirmation_timeout_ms: u64,

    /// Delay between receipt polls, in milliseconds.
    #[serde(default = "default_confirmation_poll_ms")]
    confirmation_poll_ms: u64,

    /// First push reconnect delay, in milliseconds.
    #[serde(default = "default_push_backoff_initial_ms")]
    push_backoff_initial_ms: u64,

    /// Largest push reconnect delay, in milliseconds.
    #[serde(default = "default_push_backoff_max_ms")]
    push_backoff_max_ms: u64,

    /// Entries kept on the local leaderboard.
    #[serde(default = "default_leaderboard_capacity")]
    leaderboard_capacity: usize,

    /// SQLite database path, or `:memory:`.
    #[serde(default = "default_store_path")]
    store_path: String,
}

fn default_player_id() -> String {
    "local-player".to_string()
}

fn default_display_name() -> String {
    "Player".to_string()
}

fn default_preview_ms() -> u64 {
    3000
}

fn default_mismatch_settle_ms() -> u64 {
    1000
}

fn default_confirmation_timeout_ms() -> u64 {
    60_000
}

fn default_confirmation_poll_ms() -> u64 {
    1000
}

fn default_push_backoff_initial_ms() -> u64 {
    500
}

fn default_push_backoff_max_ms() -> u64 {
    30_000
}

fn default_leaderboard_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_store_path() -> String {
    "memorabilia.db".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            player_id: default_player_id(),
            display_name: default_display_name(),
            rpc_url: None,
            torii_url: None,
            world_address: None,
            receipt_schema: ReceiptSchema::default(),
            preview_ms: default_preview_ms(),
            mismatch_settle_ms: default_mismatch_settle_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
            push_backoff_initial_ms: default_push_backoff_initial_ms(),
            push_backoff_max_ms: default_push_backoff_max_ms(),
            leaderboard_capacity: default_leaderboard_capacity(),
            store_path: default_store_path(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(mode = %config.mode, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid configuration.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Applies `MEMORABILIA_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `MEMORABILIA_MODE` is not a known mode.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the mode override is not a known mode.
    #[instrument(skip(self, lookup))]
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_RPC_URL) {
            debug!(key = ENV_RPC_URL, "Override applied");
            self.rpc_url = Some(url);
        }
        if let Some(url) = lookup(ENV_TORII_URL) {
            debug!(key = ENV_TORII_URL, "Override applied");
            self.torii_url = Some(url);
        }
        if let Some(address) = lookup(ENV_WORLD_ADDRESS) {
            debug!(key = ENV_WORLD_ADDRESS, "Override applied");
            self.world_address = Some(address);
        }
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = ExecutionMode::from_str(mode.trim()).map_err(|_| {
                ConfigError::new(format!("{ENV_MODE} must be 'local' or 'remote', got '{mode}'"))
            })?;
            debug!(key = ENV_MODE, mode = %self.mode, "Override applied");
        }
        Ok(self)
    }

    /// Checks that remote mode has its endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == ExecutionMode::Remote {
            if self.rpc_url.is_none() {
                return Err(ConfigError::new(format!(
                    "remote mode requires rpc_url or {ENV_RPC_URL}"
                )));
            }
            if self.world_address.is_none() {
                return Err(ConfigError::new(format!(
                    "remote mode requires world_address or {ENV_WORLD_ADDRESS}"
                )));
            }
        }
        if self.leaderboard_capacity == 0 {
            return Err(ConfigError::new("leaderboard_capacity must be positive"));
        }
        Ok(())
    }

    /// Switches the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the store path.
    pub fn with_store_path(mut self, store_path: impl Into<String>) -> Self {
        self.store_path = store_path.into();
        self
    }

    /// Player identity for session controllers.
    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity::new(self.player_id.clone(), self.display_name.clone())
    }

    /// Preview and settle delays.
    pub fn timing(&self) -> SessionTiming {
        SessionTiming::new(
            Duration::from_millis(self.preview_ms),
            Duration::from_millis(self.mismatch_settle_ms),
        )
    }

    /// Receipt wait bounds.
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy::new(
            Duration::from_millis(self.confirmation_timeout_ms),
            Duration::from_millis(self.confirmation_poll_ms),
        )
    }

    /// Push reconnect delays.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.push_backoff_initial_ms),
            Duration::from_millis(self.push_backoff_max_ms),
        )
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
