pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::log_responses;

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/healthz/db", get(handlers::db_health))
        .route("/api/youtube/trending", get(handlers::trending_videos))
        .route(
            "/api/youtube/shorts/trending",
            get(handlers::trending_shorts),
        )
        .route("/api/youtube/channel", get(handlers::channel_report))
        .route("/api/youtube/video", get(handlers::video_details))
        .route("/api/youtube/search", get(handlers::search_channels))
        .route("/api/charts/trending", get(handlers::trending_chart))
        .route("/api/home/rankings", get(handlers::home_rankings))
        .route(
            "/api/batch/collect-trending",
            post(handlers::collect_trending),
        )
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/invalidate", post(handlers::cache_invalidate))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
}
