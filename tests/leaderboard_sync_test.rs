//! Tests for leaderboard commit, merge and push subscription.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use futures::stream;
use memorabilia::{
    AccountOrder, BackoffPolicy, Difficulty, EntrySource, IndexerClient, LeaderboardSync,
    MemoryStore, Page, PlayerStats, PushTransport, RecordStore, RemoteStatus, ScoreRecord,
    ScoreSink, SyncError, SyncErrorKind, UpdateStream, UserAccount,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_772_000_000 + secs, 0).unwrap()
}

fn record(player: &str, score: u64, secs: i64) -> ScoreRecord {
    ScoreRecord::new(
        player.to_string(),
        format!("{player} name"),
        score,
        6,
        42.0,
        Difficulty::Easy,
        at(secs),
    )
}

fn local_sync() -> LeaderboardSync {
    LeaderboardSync::new(RecordStore::new(Arc::new(MemoryStore::new())))
}

#[derive(Debug)]
struct FakeIndexer {
    top: Result<Vec<ScoreRecord>, SyncError>,
}

#[async_trait]
impl IndexerClient for FakeIndexer {
    async fn top_scores(&self, _page: Page) -> Result<Vec<ScoreRecord>, SyncError> {
        self.top.clone()
    }

    async fn accounts(
        &self,
        _order: AccountOrder,
        _page: Page,
    ) -> Result<Vec<UserAccount>, SyncError> {
        Ok(Vec::new())
    }

    async fn account(&self, _telegram_id: &str) -> Result<Option<UserAccount>, SyncError> {
        Ok(None)
    }

    async fn player_stats(&self, address: &str) -> Result<Option<PlayerStats>, SyncError> {
        Ok(Some(PlayerStats::new(
            address.to_string(),
            3,
            3,
            900,
            40,
            30,
            700.0,
        )))
    }

    async fn active_since(&self, _since: DateTime<Utc>) -> Result<Vec<UserAccount>, SyncError> {
        Ok(vec![account("42")])
    }
}

#[derive(Debug)]
struct FailingSink;

#[async_trait]
impl ScoreSink for FailingSink {
    async fn submit_score(&self, _record: &ScoreRecord) -> Result<(), SyncError> {
        Err(SyncError::remote_submission("provider offline"))
    }
}

fn account(id: &str) -> UserAccount {
    UserAccount::new(id.to_string(), None, None, None, 1, true)
}

#[tokio::test]
async fn test_profile_aggregates_best_and_average() {
    let sync = local_sync();
    sync.commit(record("p1", 500, 0)).await.expect("commit");
    let receipt = sync.commit(record("p1", 700, 10)).await.expect("commit");

    let profile = receipt.profile();
    assert_eq!(*profile.best_score(), 700);
    assert_eq!(*profile.average_score(), 600.0);
    assert_eq!(*profile.total_games(), 2);
    assert_eq!(*profile.wins(), 2);
    assert_eq!(*profile.last_played(), Some(at(10)));
    assert_eq!(receipt.remote(), &RemoteStatus::Skipped);
}

#[tokio::test]
async fn test_leaderboard_is_ranked_descending() {
    let sync = local_sync();
    for (i, score) in [300, 900, 600, 900].into_iter().enumerate() {
        sync.commit(record(&format!("p{i}"), score, i as i64))
            .await
            .expect("commit");
    }

    let top = sync.local_top(10).expect("local_top");
    let scores: Vec<u64> = top.iter().map(|e| *e.record().score()).collect();
    let ranks: Vec<usize> = top.iter().map(|e| *e.rank()).collect();
    assert_eq!(scores, vec![900, 900, 600, 300]);
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    // Earlier of the tied scores ranks first.
    assert_eq!(top[0].record().player_id(), "p1");
}

#[tokio::test]
async fn test_capacity_truncates_lowest_scores() {
    let sync = local_sync().with_capacity(2);
    sync.commit(record("a", 100, 0)).await.expect("commit");
    sync.commit(record("b", 300, 1)).await.expect("commit");
    let receipt = sync.commit(record("c", 200, 2)).await.expect("commit");
    assert_eq!(receipt.entry().as_ref().map(|e| *e.rank()), Some(2));

    let dropped = sync.commit(record("d", 50, 3)).await.expect("commit");
    assert!(dropped.entry().is_none());
    assert_eq!(sync.local_top(10).expect("local_top").len(), 2);
    // The profile is still recorded.
    assert!(sync.profile("d").expect("profile").is_some());
}

#[tokio::test]
async fn test_page_skips_and_limits() {
    let sync = local_sync();
    for i in 0..5 {
        sync.commit(record("p", 100 * (i + 1), i as i64))
            .await
            .expect("commit");
    }
    let page = sync.page(Page::new(2, 1)).expect("page");
    let ranks: Vec<usize> = page.iter().map(|e| *e.rank()).collect();
    assert_eq!(ranks, vec![2, 3]);
}

#[tokio::test]
async fn test_fetch_top_without_indexer_is_local() {
    let sync = local_sync();
    sync.commit(record("p1", 400, 0)).await.expect("commit");
    sync.commit(record("p2", 400, 0)).await.expect("commit");
    let top = sync.fetch_top(10).await.expect("fetch_top");
    assert_eq!(top.len(), 2);
    assert!(top.iter().all(|e| *e.source() == EntrySource::Local));
}

#[tokio::test]
async fn test_fetch_top_merges_remote_and_prefers_local() {
    let indexer = FakeIndexer {
        top: Ok(vec![record("p1", 999, 5), record("remote", 800, 7)]),
    };
    let sync = local_sync().with_indexer(Arc::new(indexer));
    sync.commit(record("p1", 500, 5)).await.expect("commit");
    sync.commit(record("p2", 100, 9)).await.expect("commit");

    let top = sync.fetch_top(10).await.expect("fetch_top");
    let rows: Vec<(String, u64, EntrySource)> = top
        .iter()
        .map(|e| (e.record().player_id().clone(), *e.record().score(), *e.source()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("remote".to_string(), 800, EntrySource::Remote),
            ("p1".to_string(), 500, EntrySource::Local),
            ("p2".to_string(), 100, EntrySource::Local),
        ]
    );
}

#[tokio::test]
async fn test_indexer_failure_is_reported() {
    let indexer = FakeIndexer {
        top: Err(SyncError::unreachable("connection refused")),
    };
    let sync = local_sync().with_indexer(Arc::new(indexer));
    let err = sync.fetch_top(5).await.expect_err("indexer down");
    assert!(matches!(err.kind, SyncErrorKind::IndexerUnreachable(_)));
    assert!(err.is_transient());
    // Local data is still available.
    assert!(sync.local_top(5).expect("local_top").is_empty());
}

#[tokio::test]
async fn test_remote_failure_keeps_local_commit() {
    let sync = local_sync().with_sink(Arc::new(FailingSink));
    let receipt = sync.commit(record("p1", 1200, 0)).await.expect("commit");
    assert!(matches!(receipt.remote(), RemoteStatus::Failed(_)));
    assert_eq!(sync.local_top(1).expect("local_top").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_are_not_lost() {
    let sync = Arc::new(local_sync());
    let mut handles = Vec::new();
    for i in 0..20u64 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            sync.commit(record("shared", 100 + i, i as i64)).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("commit");
    }

    assert_eq!(sync.local_top(100).expect("local_top").len(), 20);
    let profile = sync
        .profile("shared")
        .expect("profile")
        .expect("profile exists");
    assert_eq!(*profile.total_games(), 20);
    assert_eq!(*profile.best_score(), 119);
}

#[tokio::test]
async fn test_stats_and_clear() {
    let sync = local_sync();
    sync.commit(record("a", 100, 0)).await.expect("commit");
    sync.commit(record("a", 300, 1)).await.expect("commit");
    sync.commit(record("b", 200, 2)).await.expect("commit");

    let stats = sync.stats().expect("stats");
    assert_eq!(*stats.total_players(), 2);
    assert_eq!(*stats.total_games(), 3);
    assert_eq!(*stats.average_score(), 200.0);
    assert_eq!(*stats.highest_score(), 300);

    sync.clear().expect("clear");
    let stats = sync.stats().expect("stats");
    assert_eq!(*stats.total_players(), 0);
    assert_eq!(*stats.highest_score(), 0);
}

#[tokio::test]
async fn test_get_or_create_profile_is_idempotent() {
    let sync = local_sync();
    let created = sync.get_or_create_profile("p9", "Nine").expect("create");
    assert_eq!(*created.total_games(), 0);
    let again = sync.get_or_create_profile("p9", "Other").expect("get");
    assert_eq!(again.display_name(), "Nine");
    assert_eq!(sync.profiles().expect("profiles").len(), 1);
}

#[tokio::test]
async fn test_indexer_reads_require_indexer() {
    let sync = local_sync();
    let err = sync.active_users().await.expect_err("no indexer");
    assert!(matches!(err.kind, SyncErrorKind::NotConfigured(_)));

    let sync = local_sync().with_indexer(Arc::new(FakeIndexer { top: Ok(Vec::new()) }));
    assert_eq!(sync.active_users().await.expect("active").len(), 1);
    let stats = sync
        .player_stats("0xabc")
        .await
        .expect("stats")
        .expect("player");
    assert_eq!(*stats.best_score(), 900);
}

/// Serves one scripted stream per connect, then a silent stream.
#[derive(Debug, Default)]
struct ScriptedPush {
    connects: AtomicUsize,
    script: Mutex<VecDeque<Result<Vec<Result<UserAccount, SyncError>>, SyncError>>>,
}

#[async_trait]
impl PushTransport for ScriptedPush {
    async fn connect(&self) -> Result<UpdateStream, SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            // A scripted connection stays open after its last update.
            Some(Ok(items)) => Ok(stream::iter(items).chain(stream::pending()).boxed()),
            Some(Err(e)) => Err(e),
            None => Ok(stream::pending().boxed()),
        }
    }
}

#[tokio::test]
async fn test_push_reconnects_after_drop() {
    let push = Arc::new(ScriptedPush::default());
    {
        let mut script = push.script.lock();
        script.push_back(Ok(vec![
            Ok(account("1")),
            Err(SyncError::unreachable("socket closed")),
        ]));
        script.push_back(Err(SyncError::unreachable("refused")));
        script.push_back(Ok(vec![Ok(account("2"))]));
    }
    let sync = local_sync().with_push(
        push.clone(),
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    sync.subscribe(move |account| {
        let _ = tx.send(account);
    })
    .expect("subscribe");
    assert!(sync.is_subscribed());

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first update in time")
        .expect("channel open");
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second update in time")
        .expect("channel open");
    assert_eq!(first.telegram_id(), "1");
    assert_eq!(second.telegram_id(), "2");
    assert!(push.connects.load(Ordering::SeqCst) >= 3);

    sync.unsubscribe();
    sync.unsubscribe();
    tokio::task::yield_now().await;
    assert!(!sync.is_subscribed());
}

#[tokio::test]
async fn test_malformed_push_update_keeps_connection() {
    let push = Arc::new(ScriptedPush::default());
    push.script.lock().push_back(Ok(vec![
        Ok(account("1")),
        Err(SyncError::response("invalid push frame: expected value")),
        Ok(account("2")),
    ]));
    let sync = local_sync().with_push(
        push.clone(),
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    sync.subscribe(move |account| {
        let _ = tx.send(account);
    })
    .expect("subscribe");

    let mut received = Vec::new();
    for _ in 0..2 {
        let account = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("update in time")
            .expect("channel open");
        received.push(account.telegram_id().to_string());
    }
    assert_eq!(received, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(push.connects.load(Ordering::SeqCst), 1);
    assert!(sync.is_subscribed());
    sync.unsubscribe();
}

#[tokio::test]
async fn test_subscribe_requires_transport() {
    let sync = local_sync();
    let err = sync.subscribe(|_| {}).expect_err("no transport");
    assert!(matches!(err.kind, SyncErrorKind::NotConfigured(_)));
}

#[test]
fn test_backoff_doubles_and_caps() {
    let policy = BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(30));
    assert_eq!(policy.delay(0), Duration::from_millis(500));
    assert_eq!(policy.delay(1), Duration::from_millis(1000));
    assert_eq!(policy.delay(3), Duration::from_millis(4000));
    assert_eq!(policy.delay(10), Duration::from_secs(30));
    assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
}
