//! Local-first leaderboard with remote convergence.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use derive_getters::Getters;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::leaderboard::ranking::{merge_entries, rank_entries};
use crate::leaderboard::{
    AccountOrder, BackoffPolicy, EntrySource, IndexerClient, LeaderboardEntry, LeaderboardStats,
    Page, PlayerProfile, PlayerStats, PushTransport, ScoreRecord, SyncError, UserAccount,
};
use crate::store::{LEADERBOARD_KEY, PLAYER_DATA_KEY, RecordStore};

/// Default number of entries kept on the local leaderboard.
pub const DEFAULT_CAPACITY: usize = 100;

/// Window for "recently active" accounts.
pub const ACTIVE_WINDOW_HOURS: i64 = 24;

/// Accepts finished scores for the remote leaderboard.
#[async_trait]
pub trait ScoreSink: Send + Sync + Debug {
    /// Submits one record.
    async fn submit_score(&self, record: &ScoreRecord) -> Result<(), SyncError>;
}

/// What happened to the remote copy of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// The sink accepted the record.
    Submitted,
    /// No sink is configured.
    Skipped,
    /// The sink failed; the local commit stands.
    Failed(String),
}

/// Result of [`LeaderboardSync::commit`].
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct CommitReceipt {
    /// Ranked local entry, `None` if the score fell outside capacity.
    entry: Option<LeaderboardEntry>,
    /// Profile after the commit.
    profile: PlayerProfile,
    /// Remote submission outcome.
    remote: RemoteStatus,
}

/// Owns the local leaderboard and profiles and keeps them in step with the
/// remote indexer.
pub struct LeaderboardSync {
    records: RecordStore,
    indexer: Option<Arc<dyn IndexerClient>>,
    sink: Option<Arc<dyn ScoreSink>>,
    push: Option<Arc<dyn PushTransport>>,
    backoff: BackoffPolicy,
    capacity: usize,
    clock: Arc<dyn Clock>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl Debug for LeaderboardSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderboardSync")
            .field("indexer", &self.indexer.is_some())
            .field("sink", &self.sink.is_some())
            .field("push", &self.push.is_some())
            .field("capacity", &self.capacity)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl LeaderboardSync {
    /// Creates a local-only leaderboard over `records`.
    #[instrument(skip(records))]
    pub fn new(records: RecordStore) -> Self {
        info!("Creating leaderboard sync");
        Self {
            records,
            indexer: None,
            sink: None,
            push: None,
            backoff: BackoffPolicy::default(),
            capacity: DEFAULT_CAPACITY,
            clock: Arc::new(SystemClock),
            subscription: Mutex::new(None),
        }
    }

    /// Adds an indexer for remote reads.
    pub fn with_indexer(mut self, indexer: Arc<dyn IndexerClient>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Adds a sink for remote score submission.
    pub fn with_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Adds a push transport with its reconnect policy.
    pub fn with_push(mut self, push: Arc<dyn PushTransport>, backoff: BackoffPolicy) -> Self {
        self.push = Some(push);
        self.backoff = backoff;
        self
    }

    /// Caps the local leaderboard at `capacity` entries.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Replaces the clock used for profile timestamps and activity windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Commits a finished session locally, then submits it remotely.
    ///
    /// Remote failure is logged and reported in the receipt; it never undoes
    /// the local commit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] only if local persistence fails.
    #[instrument(skip(self, record), fields(player = %record.player_id(), score = record.score()))]
    pub async fn commit(&self, record: ScoreRecord) -> Result<CommitReceipt, SyncError> {
        let profile = self.records.update(PLAYER_DATA_KEY, |profiles: &mut Vec<PlayerProfile>| {
            let pos = match profiles
                .iter()
                .position(|p| p.player_id() == record.player_id())
            {
                Some(pos) => pos,
                None => {
                    profiles.push(PlayerProfile::new(
                        record.player_id().clone(),
                        record.player_name().clone(),
                        *record.recorded_at(),
                    ));
                    profiles.len() - 1
                }
            };
            profiles[pos].record(*record.score(), *record.recorded_at());
            profiles[pos].clone()
        })?;

        let capacity = self.capacity;
        let entry = self
            .records
            .update(LEADERBOARD_KEY, |entries: &mut Vec<LeaderboardEntry>| {
                entries.push(LeaderboardEntry::new(0, record.clone(), EntrySource::Local));
                rank_entries(entries);
                entries.truncate(capacity);
                entries.iter().find(|e| e.record() == &record).cloned()
            })?;

        match &entry {
            Some(e) => info!(rank = e.rank(), "Score committed"),
            None => info!(capacity, "Score committed below leaderboard capacity"),
        }

        let remote = match &self.sink {
            None => RemoteStatus::Skipped,
            Some(sink) => match sink.submit_score(&record).await {
                Ok(()) => {
                    debug!("Remote score submitted");
                    RemoteStatus::Submitted
                }
                Err(e) => {
                    warn!(error = %e, "Remote score submission failed; local commit kept");
                    RemoteStatus::Failed(e.to_string())
                }
            },
        };

        Ok(CommitReceipt {
            entry,
            profile,
            remote,
        })
    }

    /// Top `limit` entries, merged with the indexer when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails or the indexer cannot
    /// be queried.
    #[instrument(skip(self))]
    pub async fn fetch_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, SyncError> {
        let local: Vec<LeaderboardEntry> = self.records.load(LEADERBOARD_KEY)?;
        let Some(indexer) = &self.indexer else {
            debug!("No indexer configured; serving local leaderboard");
            return Ok(local.into_iter().take(limit).collect());
        };

        let remote = indexer.top_scores(Page::first(limit)).await?;
        let merged = merge_entries(remote, local, limit);
        debug!(count = merged.len(), "Merged leaderboard");
        Ok(merged)
    }

    /// Top `limit` local entries.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    pub fn local_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, SyncError> {
        self.page(Page::first(limit))
    }

    /// A slice of the local leaderboard.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    #[instrument(skip(self))]
    pub fn page(&self, page: Page) -> Result<Vec<LeaderboardEntry>, SyncError> {
        let entries: Vec<LeaderboardEntry> = self.records.load(LEADERBOARD_KEY)?;
        Ok(entries
            .into_iter()
            .skip(*page.offset())
            .take(*page.limit())
            .collect())
    }

    /// Summary over local profiles and leaderboard.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    #[instrument(skip(self))]
    pub fn stats(&self) -> Result<LeaderboardStats, SyncError> {
        let profiles: Vec<PlayerProfile> = self.records.load(PLAYER_DATA_KEY)?;
        let entries: Vec<LeaderboardEntry> = self.records.load(LEADERBOARD_KEY)?;

        let total_games: u64 = profiles.iter().map(|p| u64::from(*p.total_games())).sum();
        let (average_score, highest_score) = if entries.is_empty() {
            (0.0, 0)
        } else {
            let sum: u64 = entries.iter().map(|e| *e.record().score()).sum();
            let highest = entries
                .iter()
                .map(|e| *e.record().score())
                .max()
                .unwrap_or(0);
            (sum as f64 / entries.len() as f64, highest)
        };
        Ok(LeaderboardStats::new(
            profiles.len(),
            total_games,
            average_score,
            highest_score,
        ))
    }

    /// Profile of `player_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    #[instrument(skip(self))]
    pub fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>, SyncError> {
        let profiles: Vec<PlayerProfile> = self.records.load(PLAYER_DATA_KEY)?;
        Ok(profiles.into_iter().find(|p| p.player_id() == player_id))
    }

    /// All local profiles.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    pub fn profiles(&self) -> Result<Vec<PlayerProfile>, SyncError> {
        Ok(self.records.load(PLAYER_DATA_KEY)?)
    }

    /// Profile of `player_id`, created empty under `display_name` if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    #[instrument(skip(self))]
    pub fn get_or_create_profile(
        &self,
        player_id: &str,
        display_name: &str,
    ) -> Result<PlayerProfile, SyncError> {
        let now = self.clock.now();
        let profile = self.records.update(PLAYER_DATA_KEY, |profiles: &mut Vec<PlayerProfile>| {
            if let Some(existing) = profiles.iter().find(|p| p.player_id() == player_id) {
                return existing.clone();
            }
            info!("Creating player profile");
            let created = PlayerProfile::new(player_id.to_string(), display_name.to_string(), now);
            profiles.push(created.clone());
            created
        })?;
        Ok(profile)
    }

    /// Removes all local profiles and leaderboard entries.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local persistence fails.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<(), SyncError> {
        self.records.clear(PLAYER_DATA_KEY)?;
        self.records.clear(LEADERBOARD_KEY)?;
        info!("Cleared local leaderboard and profiles");
        Ok(())
    }

    fn indexer(&self) -> Result<&Arc<dyn IndexerClient>, SyncError> {
        self.indexer
            .as_ref()
            .ok_or_else(|| SyncError::not_configured("indexer"))
    }

    /// Indexer aggregates for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if no indexer is configured or the query fails.
    pub async fn player_stats(&self, address: &str) -> Result<Option<PlayerStats>, SyncError> {
        self.indexer()?.player_stats(address).await
    }

    /// Indexer account listing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if no indexer is configured or the query fails.
    pub async fn accounts(
        &self,
        order: AccountOrder,
        page: Page,
    ) -> Result<Vec<UserAccount>, SyncError> {
        self.indexer()?.accounts(order, page).await
    }

    /// Accounts active within the last 24 hours.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if no indexer is configured or the query fails.
    #[instrument(skip(self))]
    pub async fn active_users(&self) -> Result<Vec<UserAccount>, SyncError> {
        let since = self.clock.now() - ChronoDuration::hours(ACTIVE_WINDOW_HOURS);
        self.indexer()?.active_since(since).await
    }

    /// Starts delivering push updates to `on_update`, replacing any previous
    /// subscription.
    ///
    /// The connection is re-established with exponential backoff after any
    /// drop; the delay resets once an update arrives. Updates that fail to
    /// decode are skipped and the connection stays open.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if no push transport is configured.
    #[instrument(skip(self, on_update))]
    pub fn subscribe<F>(&self, on_update: F) -> Result<(), SyncError>
    where
        F: Fn(UserAccount) + Send + Sync + 'static,
    {
        let push = self
            .push
            .clone()
            .ok_or_else(|| SyncError::not_configured("push transport"))?;
        let backoff = self.backoff;

        let handle = tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match push.connect().await {
                    Ok(mut updates) => {
                        info!("Push channel connected");
                        while let Some(update) = updates.next().await {
                            match update {
                                Ok(account) => {
                                    attempt = 0;
                                    on_update(account);
                                }
                                Err(e) if e.is_transient() => {
                                    warn!(error = %e, "Push channel dropped");
                                    break;
                                }
                                Err(e) => warn!(error = %e, "Skipping malformed push update"),
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, attempt, "Push connect failed"),
                }
                let delay = backoff.delay(attempt);
                attempt = attempt.saturating_add(1);
                debug!(delay_ms = delay.as_millis() as u64, "Reconnecting push channel");
                tokio::time::sleep(delay).await;
            }
        });

        if let Some(previous) = self.subscription.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stops the push subscription. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub fn unsubscribe(&self) {
        if let Some(handle) = self.subscription.lock().take() {
            handle.abort();
            info!("Push subscription stopped");
        }
    }

    /// Whether a push subscription is running.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for LeaderboardSync {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.get_mut().take() {
            handle.abort();
        }
    }
}
