use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::metrics::metrics_handler;
use crate::models::{EventAccepted, EventIn, RecommendationQuery, RecommendationResponse};
use crate::services::RecommendationService;

pub struct AppState {
    pub service: Arc<RecommendationService>,
    pub default_k: usize,
    pub max_k: usize,
}

impl AppState {
    pub fn new(service: Arc<RecommendationService>, config: &Config) -> Self {
        Self {
            service,
            default_k: config.default_k,
            max_k: config.max_k,
        }
    }
}

/// Register routes and JSON error handling for malformed requests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(err.to_string()).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(err.to_string()).into()
    }))
    .route("/health", web::get().to(health_check))
    .route("/event", web::post().to(add_event))
    .route("/recommendations", web::get().to(get_recommendations))
    .route("/metrics", web::get().to(metrics_handler));
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn add_event(state: web::Data<AppState>, event: web::Json<EventIn>) -> HttpResponse {
    let event = event.into_inner();
    state.service.ingest_event(event.user_id, event.track_id);

    HttpResponse::Ok().json(EventAccepted::accepted())
}

pub async fn get_recommendations(
    state: web::Data<AppState>,
    query: web::Query<RecommendationQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    query.validate()?;

    let k = query.k.unwrap_or(state.default_k);
    if k > state.max_k {
        return Err(AppError::Validation(format!(
            "k must be between 1 and {}",
            state.max_k
        )));
    }

    debug!(user_id = query.user_id, k = k, "Recommendation request");
    let recommendation = state.service.get_recommendations(query.user_id, k);

    Ok(HttpResponse::Ok().json(RecommendationResponse {
        user_id: query.user_id,
        recommendations: recommendation.tracks,
    }))
}
