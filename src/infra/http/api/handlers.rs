//! API handlers

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::cache::CacheError;
use crate::application::channels::ChannelError;
use crate::application::jobs::run_collection;
use crate::application::rankings::{RankingsError, RankingsQuery};
use crate::application::repos::RepoError;
use crate::application::source::SourceError;
use crate::application::trending::{ChartQuery, FeedQuery, TrendingError};
use crate::domain::analytics::HIDDEN_GEM_THRESHOLD;
use crate::domain::error::DomainError;
use crate::domain::period::parse_anchor;
use crate::domain::types::{ContentType, Period, SortField, SortOrder};

use super::error::{ApiError, codes};
use super::models::{
    ChannelParams, ChartParams, InvalidateRequest, RankingsParams, SearchParams,
    TrendingFeedParams, VideoParams,
};
use super::state::ApiState;
use crate::infra::http::db_health_response;

const DEFAULT_FEED_REGION: &str = "US";
const DEFAULT_CHART_REGION: &str = "GLOBAL";

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn db_health(State(state): State<ApiState>) -> Response {
    db_health_response(state.health.ping().await)
}

pub async fn trending_videos(
    State(state): State<ApiState>,
    Query(params): Query<TrendingFeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    serve_feed(&state, params, ContentType::Long).await
}

pub async fn trending_shorts(
    State(state): State<ApiState>,
    Query(params): Query<TrendingFeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    serve_feed(&state, params, ContentType::Short).await
}

async fn serve_feed(
    state: &ApiState,
    params: TrendingFeedParams,
    content_type: ContentType,
) -> Result<Json<crate::application::trending::TrendingFeed>, ApiError> {
    let feed = state
        .trending
        .feed(FeedQuery {
            region_code: params
                .region_code
                .unwrap_or_else(|| DEFAULT_FEED_REGION.to_string()),
            category_id: params.video_category_id,
            content_type,
            page_token: params.page_token,
        })
        .await
        .map_err(trending_to_api)?;
    Ok(Json(feed))
}

pub async fn channel_report(
    State(state): State<ApiState>,
    Query(params): Query<ChannelParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = require(params.id, "channel id is required")?;
    let report = state.channels.report(&id).await.map_err(channel_to_api)?;
    Ok(Json(report))
}

pub async fn video_details(
    State(state): State<ApiState>,
    Query(params): Query<VideoParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = require(params.id, "video id is required")?;
    let video = state.channels.video(&id).await.map_err(channel_to_api)?;
    Ok(Json(video))
}

pub async fn search_channels(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = require(params.q, "search query is required")?;
    let results = state
        .channels
        .search(&query)
        .await
        .map_err(channel_to_api)?;
    Ok(Json(results))
}

pub async fn trending_chart(
    State(state): State<ApiState>,
    Query(params): Query<ChartParams>,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = params
        .video_type
        .as_deref()
        .map(ContentType::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or(ContentType::Short);
    let period = params
        .period
        .as_deref()
        .map(Period::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or_default();
    let anchor = params
        .date
        .as_deref()
        .map(parse_anchor)
        .transpose()
        .map_err(domain_to_api)?;
    let sort = params
        .sort_by
        .as_deref()
        .map(SortField::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or_default();
    let order = params
        .order
        .as_deref()
        .map(SortOrder::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or_else(|| SortOrder::default_for(sort));

    let view = state
        .trending
        .chart(ChartQuery {
            region_code: params
                .region_code
                .unwrap_or_else(|| DEFAULT_CHART_REGION.to_string()),
            content_type,
            category_id: params.video_category_id,
            period,
            anchor,
            sort,
            order,
            hidden_gems_only: params.hidden_gems_only.unwrap_or(false),
            hidden_gem_threshold: params.hidden_gem_threshold.unwrap_or(HIDDEN_GEM_THRESHOLD),
        })
        .await
        .map_err(trending_to_api)?;
    Ok(Json(view))
}

pub async fn home_rankings(
    State(state): State<ApiState>,
    Query(params): Query<RankingsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = params
        .video_type
        .as_deref()
        .map(ContentType::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or(ContentType::Short);
    let period = params
        .period
        .as_deref()
        .map(Period::from_param)
        .transpose()
        .map_err(domain_to_api)?
        .unwrap_or_default();

    let rankings = state
        .rankings
        .home(RankingsQuery {
            region_code: params
                .region_code
                .unwrap_or_else(|| DEFAULT_CHART_REGION.to_string()),
            content_type,
            period,
        })
        .await
        .map_err(rankings_to_api)?;
    Ok(Json(rankings))
}

/// Runs one full collection pass inline and reports the outcome. Partition
/// failures stay inside the report; the endpoint itself answers 200.
pub async fn collect_trending(State(state): State<ApiState>) -> impl IntoResponse {
    let report = run_collection(&state.collector).await;
    Json(report)
}

pub async fn cache_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.cache.stats().await)
}

#[derive(Debug, Serialize)]
struct InvalidateResponse {
    removed: u64,
}

pub async fn cache_invalidate(
    State(state): State<ApiState>,
    payload: Option<Json<InvalidateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let pattern = payload
        .and_then(|Json(body)| body.pattern)
        .unwrap_or_else(|| "*".to_string());
    let removed = state
        .cache
        .invalidate(&pattern)
        .await
        .map_err(cache_to_api)?;
    Ok(Json(InvalidateResponse { removed }))
}

fn require(value: Option<String>, message: &'static str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::bad_request(message, None)),
    }
}

fn domain_to_api(err: DomainError) -> ApiError {
    ApiError::bad_request("invalid query parameter", Some(err.to_string()))
}

fn source_to_api(err: SourceError) -> ApiError {
    match err {
        SourceError::NotFound => ApiError::not_found("upstream resource not found"),
        SourceError::QuotaExhausted => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::QUOTA_EXHAUSTED,
            "Upstream quota exhausted",
            None,
        ),
        other => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM,
            "Upstream request failed",
            Some(other.to_string()),
        ),
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        other => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(other.to_string()),
        ),
    }
}

fn trending_to_api(err: TrendingError) -> ApiError {
    match err {
        TrendingError::Source(err) => source_to_api(err),
        TrendingError::Repo(err) => repo_to_api(err),
    }
}

fn channel_to_api(err: ChannelError) -> ApiError {
    match err {
        ChannelError::ChannelNotFound => ApiError::not_found("channel not found"),
        ChannelError::VideoNotFound => ApiError::not_found("video not found"),
        ChannelError::Source(err) => source_to_api(err),
    }
}

fn rankings_to_api(err: RankingsError) -> ApiError {
    match err {
        RankingsError::Repo(err) => repo_to_api(err),
    }
}

fn cache_to_api(err: CacheError) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::CACHE,
        "Cache backend request failed",
        Some(err.to_string()),
    )
}
