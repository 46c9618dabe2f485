//! Catalog entities and the snapshot partition key space.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    analytics,
    duration::parse_seconds,
    types::{ContentType, PartitionKey},
};

/// Regions collected by default, upstream spelling. `GLOBAL` is a synthetic
/// code mapped to a concrete region by the upstream adapter.
pub const DEFAULT_REGIONS: [&str; 6] = ["GLOBAL", "KR", "US", "JP", "TW", "VN"];

/// Explicit category ids collected by default; the "all categories"
/// partition (no category filter) is always collected in addition.
pub const DEFAULT_CATEGORY_IDS: [&str; 14] = [
    "10", "20", "25", "22", "1", "17", "27", "28", "24", "26", "23", "19", "15", "2",
];

/// Enumerates the full partition key space: every region crossed with the
/// "all" partition plus each explicit category, crossed with both content
/// types. The collector iterates this set; its size bounds one batch run.
pub fn partition_space(regions: &[String], category_ids: &[String]) -> Vec<PartitionKey> {
    let mut keys = Vec::with_capacity(regions.len() * (category_ids.len() + 1) * 2);
    for region in regions {
        for category in std::iter::once(None).chain(category_ids.iter().map(|id| Some(id.clone())))
        {
            for content_type in [ContentType::Short, ContentType::Long] {
                keys.push(PartitionKey::new(
                    region.clone(),
                    category.clone(),
                    content_type,
                ));
            }
        }
    }
    keys
}

/// One video-level aggregate as assembled by the upstream adapter: video
/// metadata joined with its channel's statistics. Duration is kept verbatim
/// in upstream ISO-8601 form; parsed seconds are derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: OffsetDateTime,
    pub duration: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub video_count: i64,
}

impl CatalogItem {
    pub fn duration_seconds(&self) -> u64 {
        parse_seconds(&self.duration)
    }
}

/// A ranked row as persisted by the collector. Never updated in place:
/// superseded wholesale when its partition is next replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingSnapshot {
    pub video_id: String,
    pub content_type: ContentType,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: OffsetDateTime,
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
    pub region_code: String,
    pub category_id: Option<String>,
    pub rank: i32,
    pub collected_at: OffsetDateTime,
}

impl TrendingSnapshot {
    /// Builds a ranked row from an upstream item. Rank is 1-based in
    /// upstream order; `collected_at` is the run-wide stamp, captured once
    /// per batch run rather than per partition.
    pub fn from_catalog(
        item: CatalogItem,
        key: &PartitionKey,
        rank: i32,
        collected_at: OffsetDateTime,
    ) -> Self {
        let engagement_rate =
            analytics::engagement_rate(item.like_count, item.comment_count, item.view_count);
        Self {
            video_id: item.video_id,
            content_type: key.content_type,
            title: item.title,
            description: item.description,
            thumbnail_url: item.thumbnail_url,
            published_at: item.published_at,
            duration: item.duration,
            view_count: item.view_count,
            like_count: item.like_count,
            comment_count: item.comment_count,
            engagement_rate,
            channel_id: item.channel_id,
            channel_title: item.channel_title,
            channel_thumbnail_url: item.channel_thumbnail_url,
            subscriber_count: item.subscriber_count,
            video_count: item.video_count,
            region_code: key.region_code.clone(),
            category_id: key.category_id.clone(),
            rank,
            collected_at,
        }
    }

    pub fn views_per_subscriber(&self) -> f64 {
        analytics::views_per_subscriber(self.view_count, self.subscriber_count)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelThumbnails {
    pub default: Option<String>,
    pub medium: Option<String>,
    pub high: Option<String>,
}

impl ChannelThumbnails {
    /// Preferred display url, largest available first.
    pub fn best(&self) -> Option<&str> {
        self.high
            .as_deref()
            .or(self.medium.as_deref())
            .or(self.default.as_deref())
    }
}

/// Channel master data as returned by the upstream profile lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelProfile {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub custom_url: Option<String>,
    pub published_at: Option<OffsetDateTime>,
    pub thumbnails: ChannelThumbnails,
    pub subscriber_count: i64,
    pub view_count: i64,
    pub video_count: i64,
}

/// One upload belonging to a channel, with full statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelVideo {
    pub video_id: String,
    pub title: String,
    pub published_at: OffsetDateTime,
    pub duration: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub channel_id: String,
    pub channel_title: String,
}

/// Free-text channel search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: ChannelThumbnails,
}
