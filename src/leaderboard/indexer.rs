//! Read access to the remote indexer.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::game::Difficulty;
use crate::leaderboard::{AccountOrder, Page, PlayerStats, ScoreRecord, SyncError, UserAccount};
use crate::ledger::parse_scalar;

/// Queries against the indexed ledger state.
#[async_trait]
pub trait IndexerClient: Send + Sync + Debug {
    /// Leaderboard records in ascending rank order.
    async fn top_scores(&self, page: Page) -> Result<Vec<ScoreRecord>, SyncError>;

    /// Paginated account listing.
    async fn accounts(&self, order: AccountOrder, page: Page)
    -> Result<Vec<UserAccount>, SyncError>;

    /// Single account by messaging-platform id.
    async fn account(&self, telegram_id: &str) -> Result<Option<UserAccount>, SyncError>;

    /// Aggregates for one player address.
    async fn player_stats(&self, address: &str) -> Result<Option<PlayerStats>, SyncError>;

    /// Active accounts seen after `since`, most recent first.
    async fn active_since(&self, since: DateTime<Utc>) -> Result<Vec<UserAccount>, SyncError>;
}

/// GraphQL-over-HTTP client for a Torii indexer.
#[derive(Debug, Clone)]
pub struct ToriiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ToriiClient {
    /// Creates a client for the indexer at `base_url`.
    #[instrument(skip_all, fields(base_url = %base_url))]
    pub fn new(base_url: String) -> Self {
        info!("Creating indexer client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Indexer root URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, query))]
    async fn query<T: DeserializeOwned>(&self, query: String) -> Result<T, SyncError> {
        let response = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Indexer returned error status");
            return Err(SyncError::unreachable(format!("indexer returned {status}")));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| SyncError::response(format!("invalid GraphQL body: {e}")))?;
        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            return Err(SyncError::response(serde_json::Value::Array(errors).to_string()));
        }
        body.data
            .ok_or_else(|| SyncError::response("GraphQL response without data"))
    }
}

#[async_trait]
impl IndexerClient for ToriiClient {
    #[instrument(skip(self))]
    async fn top_scores(&self, page: Page) -> Result<Vec<ScoreRecord>, SyncError> {
        let query = format!(
            r#"query {{
  leaderboardEntryConnection(first: {limit}, skip: {offset}, orderBy: rank_ASC) {{
    edges {{ node {{ rank player telegram_id score difficulty moves time game_id achieved_at }} }}
  }}
}}"#,
            limit = page.limit(),
            offset = page.offset(),
        );
        let data: LeaderboardData = self.query(query).await?;
        let records = data
            .leaderboard_entry_connection
            .edges
            .into_iter()
            .map(|edge| edge.node.into_record())
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = records.len(), "Leaderboard fetched");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn accounts(
        &self,
        order: AccountOrder,
        page: Page,
    ) -> Result<Vec<UserAccount>, SyncError> {
        let query = format!(
            r#"query {{
  userAccountConnection(first: {limit}, skip: {offset}, orderBy: {order}) {{
    edges {{ node {{ {ACCOUNT_FIELDS} }} }}
  }}
}}"#,
            limit = page.limit(),
            offset = page.offset(),
        );
        let data: AccountsData = self.query(query).await?;
        data.user_account_connection.into_accounts()
    }

    #[instrument(skip(self))]
    async fn account(&self, telegram_id: &str) -> Result<Option<UserAccount>, SyncError> {
        let query = format!(
            r#"query {{ userAccount(telegram_id: {id}) {{ {ACCOUNT_FIELDS} }} }}"#,
            id = graphql_string(telegram_id),
        );
        let data: AccountData = self.query(query).await?;
        data.user_account.map(AccountNode::into_account).transpose()
    }

    #[instrument(skip(self))]
    async fn player_stats(&self, address: &str) -> Result<Option<PlayerStats>, SyncError> {
        let query = format!(
            r#"query {{
  playerStats(id: {id}) {{
    player total_games total_wins best_score best_time total_moves average_score
  }}
}}"#,
            id = graphql_string(address),
        );
        let data: PlayerStatsData = self.query(query).await?;
        data.player_stats.map(StatsNode::into_stats).transpose()
    }

    #[instrument(skip(self))]
    async fn active_since(&self, since: DateTime<Utc>) -> Result<Vec<UserAccount>, SyncError> {
        let query = format!(
            r#"query {{
  userAccountConnection(where: {{ last_active_gt: {since}, is_active: true }}, orderBy: last_active_DESC) {{
    edges {{ node {{ {ACCOUNT_FIELDS} }} }}
  }}
}}"#,
            since = since.timestamp().max(0),
        );
        let data: AccountsData = self.query(query).await?;
        data.user_account_connection.into_accounts()
    }
}

const ACCOUNT_FIELDS: &str =
    "telegram_id account_address created_at last_active total_games is_active";

/// Quotes and escapes `value` as a GraphQL string literal.
fn graphql_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

/// Numeric field that may arrive as a JSON number or a hex/decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_u64(&self, field: &str) -> Result<u64, SyncError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Float(v) if *v >= 0.0 && v.is_finite() => Ok(*v as u64),
            Self::Float(v) => Err(SyncError::response(format!("{field} out of range: {v}"))),
            Self::Text(raw) => parse_scalar(raw)
                .ok_or_else(|| SyncError::response(format!("{field} is not a scalar: {raw}"))),
        }
    }

    fn as_f64(&self, field: &str) -> Result<f64, SyncError> {
        match self {
            Self::Float(v) => Ok(*v),
            other => other.as_u64(field).map(|v| v as f64),
        }
    }

    fn as_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>, SyncError> {
        match self.as_u64(field)? {
            0 => Ok(None),
            secs => DateTime::from_timestamp(secs as i64, 0)
                .map(Some)
                .ok_or_else(|| SyncError::response(format!("{field} out of range"))),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardData {
    leaderboard_entry_connection: Connection<LeaderboardNode>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardNode {
    player: String,
    #[serde(default)]
    telegram_id: Option<Scalar>,
    score: Scalar,
    difficulty: Scalar,
    moves: Scalar,
    time: Scalar,
    achieved_at: Scalar,
}

impl LeaderboardNode {
    fn into_record(self) -> Result<ScoreRecord, SyncError> {
        let difficulty = Difficulty::from_code(self.difficulty.as_u64("difficulty")?)
            .map_err(|e| SyncError::response(e.kind.to_string()))?;
        let moves = u32::try_from(self.moves.as_u64("moves")?)
            .map_err(|_| SyncError::response("moves out of range"))?;
        let recorded_at = self
            .achieved_at
            .as_timestamp("achieved_at")?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let player_name = self
            .telegram_id
            .as_ref()
            .map(Scalar::as_text)
            .unwrap_or_else(|| self.player.clone());
        Ok(ScoreRecord::new(
            self.player,
            player_name,
            self.score.as_u64("score")?,
            moves,
            self.time.as_f64("time")?,
            difficulty,
            recorded_at,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountsData {
    user_account_connection: Connection<AccountNode>,
}

impl Connection<AccountNode> {
    fn into_accounts(self) -> Result<Vec<UserAccount>, SyncError> {
        self.edges
            .into_iter()
            .map(|edge| edge.node.into_account())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountData {
    user_account: Option<AccountNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountNode {
    telegram_id: Scalar,
    #[serde(default)]
    account_address: Option<String>,
    #[serde(default)]
    created_at: Option<Scalar>,
    #[serde(default)]
    last_active: Option<Scalar>,
    #[serde(default)]
    total_games: Option<Scalar>,
    #[serde(default)]
    is_active: Option<bool>,
}

impl AccountNode {
    pub(crate) fn into_account(self) -> Result<UserAccount, SyncError> {
        let created_at = match &self.created_at {
            Some(s) => s.as_timestamp("created_at")?,
            None => None,
        };
        let last_active = match &self.last_active {
            Some(s) => s.as_timestamp("last_active")?,
            None => None,
        };
        let total_games = match &self.total_games {
            Some(s) => s.as_u64("total_games")?,
            None => 0,
        };
        Ok(UserAccount::new(
            self.telegram_id.as_text(),
            self.account_address,
            created_at,
            last_active,
            total_games,
            self.is_active.unwrap_or(true),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerStatsData {
    player_stats: Option<StatsNode>,
}

#[derive(Debug, Deserialize)]
struct StatsNode {
    player: String,
    total_games: Scalar,
    total_wins: Scalar,
    best_score: Scalar,
    best_time: Scalar,
    total_moves: Scalar,
    average_score: Scalar,
}

impl StatsNode {
    fn into_stats(self) -> Result<PlayerStats, SyncError> {
        Ok(PlayerStats::new(
            self.player,
            self.total_games.as_u64("total_games")?,
            self.total_wins.as_u64("total_wins")?,
            self.best_score.as_u64("best_score")?,
            self.best_time.as_u64("best_time")?,
            self.total_moves.as_u64("total_moves")?,
            self.average_score.as_f64("average_score")?,
        ))
    }
}
