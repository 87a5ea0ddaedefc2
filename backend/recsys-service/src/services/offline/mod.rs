mod loader;

use crate::models::{RecommendationTier, TrackId, UserId};
use crate::utils::unique_keep_order;
use std::collections::HashMap;

pub use loader::{
    build_indices, load_indices, read_tables, LoadedIndices, OfflineTables, RankingRow,
    RankingTable,
};

/// Offline Recommendation Index：離線排序結果
///
/// Two per-user tiers ("final" wins over "personal") plus the global
/// popularity ranking used for cold start and backfill. Built once at
/// startup and never mutated afterwards, so readers need no locking.
#[derive(Debug, Default)]
pub struct OfflineIndex {
    final_by_user: HashMap<UserId, Vec<TrackId>>,
    personal_by_user: HashMap<UserId, Vec<TrackId>>,
    popularity: Vec<TrackId>,
}

impl OfflineIndex {
    pub fn new(
        final_by_user: HashMap<UserId, Vec<TrackId>>,
        personal_by_user: HashMap<UserId, Vec<TrackId>>,
        popularity: Vec<TrackId>,
    ) -> Self {
        Self {
            final_by_user: dedup_lists(final_by_user),
            personal_by_user: dedup_lists(personal_by_user),
            popularity: unique_keep_order(popularity),
        }
    }

    pub fn final_for(&self, user_id: UserId) -> Option<&[TrackId]> {
        self.final_by_user.get(&user_id).map(Vec::as_slice)
    }

    pub fn personal_for(&self, user_id: UserId) -> Option<&[TrackId]> {
        self.personal_by_user.get(&user_id).map(Vec::as_slice)
    }

    pub fn popularity(&self) -> &[TrackId] {
        &self.popularity
    }

    /// True when the user has a row in either per-user tier
    pub fn has_offline_signal(&self, user_id: UserId) -> bool {
        self.final_by_user.contains_key(&user_id) || self.personal_by_user.contains_key(&user_id)
    }

    /// Pick the offline list for a user: final, then personal, then popularity
    pub fn select(&self, user_id: UserId) -> (RecommendationTier, &[TrackId]) {
        if let Some(tracks) = self.final_for(user_id) {
            (RecommendationTier::Final, tracks)
        } else if let Some(tracks) = self.personal_for(user_id) {
            (RecommendationTier::Personal, tracks)
        } else {
            (RecommendationTier::Popularity, self.popularity())
        }
    }

    pub fn final_user_count(&self) -> usize {
        self.final_by_user.len()
    }

    pub fn personal_user_count(&self) -> usize {
        self.personal_by_user.len()
    }
}

fn dedup_lists(lists: HashMap<UserId, Vec<TrackId>>) -> HashMap<UserId, Vec<TrackId>> {
    lists
        .into_iter()
        .map(|(key, tracks)| (key, unique_keep_order(tracks)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> OfflineIndex {
        OfflineIndex::new(
            HashMap::from([(1, vec![10, 11, 10]), (3, vec![30])]),
            HashMap::from([(1, vec![90]), (2, vec![20, 21])]),
            vec![5, 6, 5, 7],
        )
    }

    #[test]
    fn test_final_wins_over_personal() {
        let index = index();
        let (tier, tracks) = index.select(1);
        assert_eq!(tier, RecommendationTier::Final);
        assert_eq!(tracks.to_vec(), vec![10, 11]);
    }

    #[test]
    fn test_personal_when_final_missing() {
        let index = index();
        let (tier, tracks) = index.select(2);
        assert_eq!(tier, RecommendationTier::Personal);
        assert_eq!(tracks.to_vec(), vec![20, 21]);
    }

    #[test]
    fn test_unknown_user_falls_back_to_popularity() {
        let index = index();
        let (tier, tracks) = index.select(42);
        assert_eq!(tier, RecommendationTier::Popularity);
        assert_eq!(tracks.to_vec(), vec![5, 6, 7]);
        assert!(!index.has_offline_signal(42));
        assert!(index.has_offline_signal(2));
        assert!(index.has_offline_signal(3));
    }

    #[test]
    fn test_counts() {
        let index = index();
        assert_eq!(index.final_user_count(), 2);
        assert_eq!(index.personal_user_count(), 2);
    }
}
