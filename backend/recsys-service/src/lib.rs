pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, LoadError};
pub use handlers::AppState;
pub use services::{
    BlendConfig, CandidateBlender, OfflineIndex, OnlineHistoryStore, RecommendationService,
    SimilarityIndex,
};
