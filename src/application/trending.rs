//! Trending reads: live upstream feeds and stored chart views.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::cache::{CacheGateway, TRENDING_TTL_SECONDS, keys};
use crate::application::repos::{RepoError, SnapshotsRepo};
use crate::application::source::{CatalogSource, SourceError, TrendingRequest};
use crate::domain::analytics;
use crate::domain::catalog::{CatalogItem, TrendingSnapshot};
use crate::domain::period::published_window;
use crate::domain::types::{ContentType, PartitionKey, Period, SortField, SortOrder};
use crate::util::datetime::rfc3339;

#[derive(Debug, Error)]
pub enum TrendingError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Parameters of a live trending read served straight from the upstream.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub region_code: String,
    pub category_id: Option<String>,
    pub content_type: ContentType,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedChannel {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub video_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub duration: String,
    pub engagement_rate: f64,
    pub channel: FeedChannel,
}

impl FeedItem {
    fn from_catalog(item: CatalogItem) -> Self {
        let engagement_rate =
            analytics::engagement_rate(item.like_count, item.comment_count, item.view_count);
        Self {
            id: item.video_id,
            title: item.title,
            description: item.description,
            thumbnail_url: item.thumbnail_url,
            published_at: rfc3339(item.published_at),
            channel_id: item.channel_id.clone(),
            channel_title: item.channel_title.clone(),
            view_count: item.view_count,
            like_count: item.like_count,
            comment_count: item.comment_count,
            duration: item.duration,
            engagement_rate,
            channel: FeedChannel {
                id: item.channel_id,
                title: item.channel_title,
                thumbnail_url: item.channel_thumbnail_url,
                subscriber_count: item.subscriber_count,
                video_count: item.video_count,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingFeed {
    pub items: Vec<FeedItem>,
    pub region: String,
    pub total: usize,
    pub next_page_token: Option<String>,
}

/// Parameters of a stored chart read over one snapshot partition.
#[derive(Debug, Clone)]
pub struct ChartQuery {
    pub region_code: String,
    pub content_type: ContentType,
    pub category_id: Option<String>,
    pub period: Period,
    pub anchor: Option<NaiveDate>,
    pub sort: SortField,
    pub order: SortOrder,
    pub hidden_gems_only: bool,
    pub hidden_gem_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartItem {
    pub id: String,
    pub rank: i32,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: String,
    pub duration: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub engagement_rate: f64,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub views_per_subscriber: f64,
}

impl ChartItem {
    fn from_snapshot(row: TrendingSnapshot) -> Self {
        let views_per_subscriber = row.views_per_subscriber();
        Self {
            id: row.video_id,
            rank: row.rank,
            title: row.title,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            published_at: rfc3339(row.published_at),
            duration: row.duration,
            view_count: row.view_count,
            like_count: row.like_count,
            comment_count: row.comment_count,
            engagement_rate: row.engagement_rate,
            channel_id: row.channel_id,
            channel_title: row.channel_title,
            channel_thumbnail_url: row.channel_thumbnail_url,
            subscriber_count: row.subscriber_count,
            video_count: row.video_count,
            views_per_subscriber,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub items: Vec<ChartItem>,
    pub total: usize,
    pub region_code: String,
    pub video_type: ContentType,
    pub category_id: Option<String>,
    pub period: Period,
    pub collected_at: Option<String>,
}

#[derive(Clone)]
pub struct TrendingService {
    snapshots: Arc<dyn SnapshotsRepo>,
    source: Arc<dyn CatalogSource>,
    cache: CacheGateway,
    reporting_tz: Tz,
    feed_target: u32,
}

impl TrendingService {
    pub fn new(
        snapshots: Arc<dyn SnapshotsRepo>,
        source: Arc<dyn CatalogSource>,
        cache: CacheGateway,
        reporting_tz: Tz,
        feed_target: u32,
    ) -> Self {
        Self {
            snapshots,
            source,
            cache,
            reporting_tz,
            feed_target,
        }
    }

    /// Live trending feed straight from the upstream, cached briefly.
    pub async fn feed(&self, query: FeedQuery) -> Result<TrendingFeed, TrendingError> {
        let key = keys::trending(
            query.content_type,
            &query.region_code,
            query.category_id.as_deref(),
            query.page_token.as_deref(),
        );
        self.cache
            .read_through(&key, TRENDING_TTL_SECONDS, || async {
                let batch = self
                    .source
                    .trending(&TrendingRequest {
                        region_code: query.region_code.clone(),
                        category_id: query.category_id.clone(),
                        content_type: query.content_type,
                        target_count: self.feed_target,
                        page_token: query.page_token.clone(),
                    })
                    .await?;
                let items: Vec<FeedItem> =
                    batch.items.into_iter().map(FeedItem::from_catalog).collect();
                Ok(TrendingFeed {
                    total: items.len(),
                    items,
                    region: query.region_code.clone(),
                    next_page_token: batch.next_page_token,
                })
            })
            .await
    }

    /// Stored chart view over one snapshot partition: rank-ordered rows,
    /// optionally window-filtered, gem-filtered, and re-sorted.
    pub async fn chart(&self, query: ChartQuery) -> Result<ChartView, TrendingError> {
        let window = published_window(
            query.period,
            query.anchor,
            self.reporting_tz,
            OffsetDateTime::now_utc(),
        );
        let anchor_segment = query.anchor.map(|date| date.to_string());
        let key = keys::chart(
            &query.region_code,
            query.content_type,
            query.category_id.as_deref(),
            query.period,
            anchor_segment.as_deref(),
            query.sort,
            query.order,
            query.hidden_gems_only,
            query.hidden_gem_threshold,
        );
        self.cache
            .read_through(&key, TRENDING_TTL_SECONDS, || async {
                let partition = PartitionKey::new(
                    query.region_code.clone(),
                    query.category_id.clone(),
                    query.content_type,
                );
                let mut rows = self.snapshots.list_partition(&partition, &window).await?;
                if query.hidden_gems_only {
                    rows.retain(|row| {
                        analytics::is_hidden_gem(
                            row.views_per_subscriber(),
                            query.hidden_gem_threshold,
                        )
                    });
                }
                analytics::sort_snapshots(&mut rows, query.sort, query.order);
                let collected_at = rows.iter().map(|row| row.collected_at).max().map(rfc3339);
                let items: Vec<ChartItem> =
                    rows.into_iter().map(ChartItem::from_snapshot).collect();
                Ok(ChartView {
                    total: items.len(),
                    items,
                    region_code: query.region_code.clone(),
                    video_type: query.content_type,
                    category_id: query.category_id.clone(),
                    period: query.period,
                    collected_at,
                })
            })
            .await
    }
}
