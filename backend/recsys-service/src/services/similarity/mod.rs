use crate::models::TrackId;
use crate::utils::unique_keep_order;
use std::collections::HashMap;

/// Item Similarity Index (item-to-item)
///
/// Maps a track to its precomputed nearest neighbours, best first. Used to
/// turn the user's most recent events into online candidates.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    by_track: HashMap<TrackId, Vec<TrackId>>,
}

impl SimilarityIndex {
    pub fn new(by_track: HashMap<TrackId, Vec<TrackId>>) -> Self {
        let by_track = by_track
            .into_iter()
            .map(|(track, similar)| (track, unique_keep_order(similar)))
            .collect();
        Self { by_track }
    }

    /// Neighbours of `track_id`; empty when the track is unknown
    pub fn similar_to(&self, track_id: TrackId) -> &[TrackId] {
        self.by_track
            .get(&track_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Online candidates for a chronological history.
    ///
    /// Takes the last `window` events oldest first, concatenates their
    /// neighbour lists in that order and keeps the first occurrence of each track.
    pub fn online_candidates(&self, history: &[TrackId], window: usize) -> Vec<TrackId> {
        let recent = &history[history.len().saturating_sub(window)..];
        unique_keep_order(
            recent
                .iter()
                .flat_map(|track_id| self.similar_to(*track_id).iter().copied()),
        )
    }

    pub fn len(&self) -> usize {
        self.by_track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_track.is_empty()
    }
}
