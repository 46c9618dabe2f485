//! Upstream catalog source trait.
//!
//! The upstream API itself is a black box with quota and pagination
//! behavior; everything behind this trait is the thin typed adapter over
//! it. Single-entity lookups return `Ok(None)` when the upstream answers
//! successfully but knows no such entity.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{CatalogItem, ChannelProfile, ChannelSummary, ChannelVideo};
use crate::domain::types::ContentType;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
    #[error("upstream quota exhausted")]
    QuotaExhausted,
    #[error("upstream resource not found")]
    NotFound,
}

impl SourceError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// One trending-page request: a partition's coordinates plus paging state.
#[derive(Debug, Clone)]
pub struct TrendingRequest {
    pub region_code: String,
    pub category_id: Option<String>,
    pub content_type: ContentType,
    /// Items to assemble before stopping; the adapter pages the upstream
    /// (bounded) until it has this many matching items or runs out.
    pub target_count: u32,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrendingBatch {
    pub items: Vec<CatalogItem>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Assembles up to `target_count` items of the requested content type
    /// for a region/category, in upstream rank order, paging the upstream
    /// at most a fixed number of pages.
    async fn trending(&self, request: &TrendingRequest) -> Result<TrendingBatch, SourceError>;

    async fn channel_profile(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelProfile>, SourceError>;

    /// Latest uploads of a channel with full statistics, newest first.
    async fn channel_videos(
        &self,
        channel_id: &str,
        max: u32,
    ) -> Result<Vec<ChannelVideo>, SourceError>;

    async fn video(&self, video_id: &str) -> Result<Option<ChannelVideo>, SourceError>;

    async fn search_channels(
        &self,
        query: &str,
        max: u32,
    ) -> Result<Vec<ChannelSummary>, SourceError>;
}
