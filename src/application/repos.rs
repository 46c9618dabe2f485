//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::TrendingSnapshot;
use crate::domain::period::PublishedWindow;
use crate::domain::types::{ContentType, PartitionKey};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Region-wide read scope for ranking aggregates: one region and content
/// type, optionally narrowed by a publish-time window.
#[derive(Debug, Clone)]
pub struct RegionScope {
    pub region_code: String,
    pub content_type: ContentType,
    pub window: PublishedWindow,
}

impl RegionScope {
    pub fn new(region_code: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            region_code: region_code.into(),
            content_type,
            window: PublishedWindow::UNBOUNDED,
        }
    }

    pub fn with_window(mut self, window: PublishedWindow) -> Self {
        self.window = window;
        self
    }
}

/// One distinct channel drawn from snapshot rows, ordered by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelAggregate {
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub video_count: i64,
}

/// How many distinct trending videos a channel placed in scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelActivity {
    pub channel_id: String,
    pub trending_count: i64,
}

#[async_trait]
pub trait SnapshotsRepo: Send + Sync {
    /// Replaces one partition's rows atomically: delete everything under
    /// the key, then bulk-insert `rows`, inside a single transaction. An
    /// empty `rows` still performs the delete, leaving the partition empty.
    async fn replace_partition(
        &self,
        key: &PartitionKey,
        rows: &[TrendingSnapshot],
    ) -> Result<(), RepoError>;

    /// Reads one partition ordered by stored rank ascending, optionally
    /// narrowed to a publish-time window.
    async fn list_partition(
        &self,
        key: &PartitionKey,
        window: &PublishedWindow,
    ) -> Result<Vec<TrendingSnapshot>, RepoError>;

    async fn top_by_views(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError>;

    async fn top_by_engagement(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError>;

    /// Every row in scope, rank order. The rising-videos ranking computes
    /// its ratio in the service, so it needs the full scope.
    async fn list_scope(&self, scope: &RegionScope) -> Result<Vec<TrendingSnapshot>, RepoError>;

    /// Distinct channels in scope ordered by subscriber count descending.
    async fn top_channels(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelAggregate>, RepoError>;

    /// Channels ranked by how many distinct videos they placed in scope.
    async fn channel_activity(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelActivity>, RepoError>;

    /// Most recent snapshot row for a channel, regardless of scope.
    async fn find_channel_row(
        &self,
        channel_id: &str,
    ) -> Result<Option<TrendingSnapshot>, RepoError>;

    /// Most recently collected rows in scope, publish date as tiebreak.
    async fn latest_collected(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
