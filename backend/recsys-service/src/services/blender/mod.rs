use crate::config::Config;
use crate::models::{BlendStats, Recommendation, TrackId, UserId};
use crate::services::offline::OfflineIndex;
use crate::services::similarity::SimilarityIndex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Blending parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BlendConfig {
    /// Most recent history events used as item-to-item seeds
    pub recent_history_window: usize,
    /// Share of `k` taken from the offline list before the online slice
    pub offline_head_ratio: f64,
    /// Cap on the online slice as a share of `k`
    pub online_cap_ratio: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            recent_history_window: 5,
            offline_head_ratio: 0.7,
            online_cap_ratio: 0.6,
        }
    }
}

impl BlendConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recent_history_window: config.recent_history_window,
            offline_head_ratio: config.offline_head_ratio,
            online_cap_ratio: config.online_cap_ratio,
        }
    }

    /// `floor(k * offline_head_ratio)`
    pub fn offline_head_len(&self, k: usize) -> usize {
        (k as f64 * self.offline_head_ratio) as usize
    }

    /// `floor(k * online_cap_ratio)`
    pub fn online_cap(&self, k: usize) -> usize {
        (k as f64 * self.online_cap_ratio) as usize
    }
}

/// Candidate Blender：離線 + 在線候選混排
///
/// Deterministic merge of the offline ranking, item-to-item online candidates
/// and the popularity fallback:
///
/// 1. No final/personal row for the user: popularity only.
/// 2. Offline row but empty history: offline list only.
/// 3. Otherwise: `offline[..head] ++ online[..cap] ++ offline[head..]`.
///
/// The mix is deduplicated, stripped of tracks in the history, backfilled
/// from popularity and cut to `k`.
pub struct CandidateBlender {
    offline: Arc<OfflineIndex>,
    similarity: Arc<SimilarityIndex>,
    config: BlendConfig,
}

impl CandidateBlender {
    pub fn new(
        offline: Arc<OfflineIndex>,
        similarity: Arc<SimilarityIndex>,
        config: BlendConfig,
    ) -> Self {
        Self {
            offline,
            similarity,
            config,
        }
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    /// Blend recommendations for `user_id` against a history snapshot.
    ///
    /// `k` is assumed to be validated by the caller.
    pub fn blend(&self, user_id: UserId, k: usize, history: &[TrackId]) -> Recommendation {
        let history_set: HashSet<TrackId> = history.iter().copied().collect();
        let (tier, offline) = self.offline.select(user_id);
        let popularity = self.offline.popularity();

        let mut stats = BlendStats {
            history_len: history.len(),
            ..BlendStats::default()
        };

        let mixed: Vec<TrackId> = if !self.offline.has_offline_signal(user_id) {
            popularity.to_vec()
        } else if history.is_empty() {
            offline.to_vec()
        } else {
            let online = self
                .similarity
                .online_candidates(history, self.config.recent_history_window);
            let head = self.config.offline_head_len(k).min(offline.len());
            let online_taken = self.config.online_cap(k).min(online.len());

            stats.online_candidates = online.len();
            stats.online_taken = online_taken;

            offline[..head]
                .iter()
                .chain(&online[..online_taken])
                .chain(&offline[head..])
                .copied()
                .collect()
        };

        // Dedup and history filtering share one `seen` set; anything filtered
        // out by history stays filtered during backfill as well.
        let mut seen: HashSet<TrackId> = HashSet::with_capacity(k * 2);
        let mut tracks: Vec<TrackId> = Vec::with_capacity(k);

        for track in mixed {
            if tracks.len() == k {
                break;
            }
            if seen.insert(track) && !history_set.contains(&track) {
                tracks.push(track);
            }
        }

        for &track in popularity {
            if tracks.len() == k {
                break;
            }
            if seen.insert(track) && !history_set.contains(&track) {
                tracks.push(track);
                stats.backfilled += 1;
            }
        }

        debug!(
            user_id = user_id,
            k = k,
            tier = tier.as_str(),
            history_len = stats.history_len,
            online_candidates = stats.online_candidates,
            online_taken = stats.online_taken,
            backfilled = stats.backfilled,
            returned = tracks.len(),
            "Recommendations blended"
        );

        Recommendation {
            tracks,
            tier,
            stats,
        }
    }
}
