pub mod blender;
pub mod history;
pub mod offline;
pub mod similarity;

pub use blender::{BlendConfig, CandidateBlender};
pub use history::OnlineHistoryStore;
pub use offline::{LoadedIndices, OfflineIndex};
pub use similarity::SimilarityIndex;

use crate::config::Config;
use crate::error::LoadError;
use crate::metrics;
use crate::models::{Recommendation, TrackId, UserId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Recommendation service facade
///
/// Owns the immutable indices and the online history store. It can only be
/// built from successfully loaded indices, so events and recommendation
/// requests are never served against a partial load.
pub struct RecommendationService {
    history: Arc<OnlineHistoryStore>,
    blender: CandidateBlender,
}

impl RecommendationService {
    pub fn new(
        indices: LoadedIndices,
        history: Arc<OnlineHistoryStore>,
        blend_config: BlendConfig,
    ) -> Self {
        let blender = CandidateBlender::new(
            Arc::new(indices.offline),
            Arc::new(indices.similarity),
            blend_config,
        );

        Self { history, blender }
    }

    /// Load the offline tables named in `config` and build the service
    pub fn from_config(config: &Config) -> Result<Self, LoadError> {
        let indices = offline::load_indices(config)?;
        let history = Arc::new(OnlineHistoryStore::new(config.history_size));

        info!(
            history_size = config.history_size,
            recent_history_window = config.recent_history_window,
            offline_head_ratio = config.offline_head_ratio,
            online_cap_ratio = config.online_cap_ratio,
            "RecommendationService initialized"
        );

        Ok(Self::new(indices, history, BlendConfig::from_config(config)))
    }

    /// Record a listening event. Always succeeds.
    pub fn ingest_event(&self, user_id: UserId, track_id: TrackId) {
        self.history.record(user_id, track_id);
        metrics::record_event_ingested();
    }

    /// Blend recommendations for a user against one snapshot of their history.
    ///
    /// `k` must already be validated by the boundary.
    pub fn get_recommendations(&self, user_id: UserId, k: usize) -> Recommendation {
        let started = Instant::now();
        let history = self.history.snapshot(user_id);
        let recommendation = self.blender.blend(user_id, k, &history);

        metrics::observe_recommendation(
            recommendation.tier,
            started.elapsed(),
            recommendation.stats.backfilled > 0,
        );

        debug!(
            user_id = user_id,
            k = k,
            tier = recommendation.tier.as_str(),
            returned = recommendation.tracks.len(),
            "Recommendations served"
        );

        recommendation
    }

    pub fn history(&self) -> &OnlineHistoryStore {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecommendationTier;
    use std::collections::HashMap;

    fn service() -> RecommendationService {
        let indices = LoadedIndices {
            offline: OfflineIndex::new(
                HashMap::from([(3, (1..=10).collect())]),
                HashMap::new(),
                (1..=10).collect(),
            ),
            similarity: SimilarityIndex::new(HashMap::from([
                (101, vec![20, 21]),
                (102, vec![21, 22]),
            ])),
        };
        RecommendationService::new(
            indices,
            Arc::new(OnlineHistoryStore::default()),
            BlendConfig::default(),
        )
    }

    #[test]
    fn test_events_feed_blending() {
        let service = service();
        assert_eq!(
            service.get_recommendations(3, 10).tracks,
            (1..=10).collect::<Vec<_>>()
        );

        service.ingest_event(3, 101);
        service.ingest_event(3, 102);

        let rec = service.get_recommendations(3, 10);
        assert_eq!(rec.tier, RecommendationTier::Final);
        assert_eq!(rec.tracks, vec![1, 2, 3, 4, 5, 6, 7, 20, 21, 22]);
        assert_eq!(service.history().snapshot(3), vec![101, 102]);
    }

    #[test]
    fn test_listened_tracks_are_not_recommended() {
        let service = service();
        service.ingest_event(99, 1);
        service.ingest_event(99, 2);

        let rec = service.get_recommendations(99, 5);
        assert_eq!(rec.tier, RecommendationTier::Popularity);
        assert_eq!(rec.tracks, vec![3, 4, 5, 6, 7]);
    }
}
