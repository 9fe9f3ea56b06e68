//! Ordering and ranking of leaderboard rows.

use std::collections::HashMap;

use crate::leaderboard::{EntrySource, LeaderboardEntry, ScoreRecord};

/// Sorts by score descending, earlier timestamp first on ties, and assigns
/// ranks `1..=n`.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.record()
            .score()
            .cmp(a.record().score())
            .then_with(|| a.record().recorded_at().cmp(b.record().recorded_at()))
    });
    for (pos, entry) in entries.iter_mut().enumerate() {
        entry.set_rank(pos + 1);
    }
}

/// Merges indexer records with local entries.
///
/// A record present on both sides keeps its local copy. The result is ranked
/// and cut to `limit`.
pub fn merge_entries(
    remote: Vec<ScoreRecord>,
    local: Vec<LeaderboardEntry>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut by_key: HashMap<_, LeaderboardEntry> = HashMap::new();
    for record in remote {
        by_key.insert(
            record.merge_key(),
            LeaderboardEntry::new(0, record, EntrySource::Remote),
        );
    }
    for entry in local {
        by_key.insert(
            entry.record().merge_key(),
            LeaderboardEntry::new(0, entry.record().clone(), EntrySource::Local),
        );
    }

    let mut merged: Vec<_> = by_key.into_values().collect();
    rank_entries(&mut merged);
    merged.truncate(limit);
    merged
}
