use crate::models::{TrackId, UserId};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

/// Default number of events kept per user
pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Online History Store：用戶最近互動
///
/// Bounded, per-user, append-ordered log of recent tracks. Tracks may repeat;
/// nothing is reordered or deduplicated.
///
/// # Concurrency
/// Backed by a sharded `DashMap`. `record` holds the shard's write guard for
/// the whole append-then-trim, so concurrent appends for one user cannot both
/// see the pre-append length. Users on different shards never contend.
/// `snapshot` copies the list under a read guard, so it always sees a state
/// produced by some complete sequence of `record` calls.
#[derive(Debug)]
pub struct OnlineHistoryStore {
    histories: DashMap<UserId, VecDeque<TrackId>>,
    capacity: usize,
}

impl OnlineHistoryStore {
    /// Create a store keeping at most `capacity` events per user (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append `track_id` to the user's history, dropping the oldest events past capacity
    pub fn record(&self, user_id: UserId, track_id: TrackId) {
        let mut history = self
            .histories
            .entry(user_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        history.push_back(track_id);
        while history.len() > self.capacity {
            history.pop_front();
        }

        debug!(
            user_id = user_id,
            track_id = track_id,
            history_len = history.len(),
            "Event recorded"
        );
    }

    /// Current history in arrival order; empty for unknown users
    pub fn snapshot(&self, user_id: UserId) -> Vec<TrackId> {
        self.histories
            .get(&user_id)
            .map(|history| history.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of users with at least one event
    pub fn user_count(&self) -> usize {
        self.histories.len()
    }
}

impl Default for OnlineHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unknown_user_has_empty_history() {
        let store = OnlineHistoryStore::default();
        assert!(store.snapshot(1).is_empty());
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_record_appends_in_arrival_order_with_repeats() {
        let store = OnlineHistoryStore::default();
        store.record(1, 10);
        store.record(1, 11);
        store.record(1, 10);
        assert_eq!(store.snapshot(1), vec![10, 11, 10]);
    }

    #[test]
    fn test_cap_keeps_most_recent_events() {
        let store = OnlineHistoryStore::default();
        for track in 0..120 {
            store.record(7, track);
        }

        let history = store.snapshot(7);
        assert_eq!(history.len(), DEFAULT_HISTORY_SIZE);
        assert_eq!(history, (70..120).collect::<Vec<_>>());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = OnlineHistoryStore::new(3);
        store.record(1, 10);
        store.record(2, 20);
        assert_eq!(store.snapshot(1), vec![10]);
        assert_eq!(store.snapshot(2), vec![20]);
        assert_eq!(store.user_count(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = OnlineHistoryStore::new(0);
        store.record(1, 10);
        store.record(1, 11);
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.snapshot(1), vec![11]);
    }

    #[test]
    fn test_concurrent_records_for_one_user_respect_cap() {
        let store = Arc::new(OnlineHistoryStore::new(50));
        let threads = 8;
        let per_thread = 500;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        store.record(1, (t * per_thread + i) as TrackId);
                        assert!(store.snapshot(1).len() <= 50);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let history = store.snapshot(1);
        assert_eq!(history.len(), 50);

        // Each writer's own events must stay in the order it issued them
        for t in 0..threads {
            let lo = (t * per_thread) as TrackId;
            let hi = lo + per_thread as TrackId;
            let own: Vec<TrackId> = history
                .iter()
                .copied()
                .filter(|track| (lo..hi).contains(track))
                .collect();
            assert!(own.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_concurrent_records_for_many_users() {
        let store = Arc::new(OnlineHistoryStore::new(10));

        let handles: Vec<_> = (0..16)
            .map(|user| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for track in 0..100 {
                        store.record(user, track);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.user_count(), 16);
        for user in 0..16 {
            assert_eq!(store.snapshot(user), (90..100).collect::<Vec<_>>());
        }
    }
}
