use serde::{Deserialize, Serialize};
use validator::Validate;

pub type UserId = i64;
pub type TrackId = i64;

/// Listening event posted by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIn {
    pub user_id: UserId,
    pub track_id: TrackId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAccepted {
    pub status: String,
}

impl EventAccepted {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

/// Query string of `GET /recommendations`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecommendationQuery {
    pub user_id: UserId,
    #[validate(range(min = 1, max = 100))]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub recommendations: Vec<TrackId>,
}

/// Which offline ranking a request was served from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Final,        // 主排序
    Personal,     // 個性化 ALS
    Popularity,   // 冷啟動熱門
}

impl RecommendationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationTier::Final => "final",
            RecommendationTier::Personal => "personal",
            RecommendationTier::Popularity => "popularity",
        }
    }
}

/// Output of one blending pass, with the bookkeeping used for logs and metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub tracks: Vec<TrackId>,
    pub tier: RecommendationTier,
    pub stats: BlendStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlendStats {
    pub history_len: usize,
    pub online_candidates: usize,
    pub online_taken: usize,
    pub backfilled: usize,
}
