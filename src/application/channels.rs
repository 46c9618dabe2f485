//! Channel analytics: scorecards, free-text search, single-video lookups.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::cache::{
    CHANNEL_TTL_SECONDS, CacheGateway, SEARCH_TTL_SECONDS, keys,
};
use crate::application::source::{CatalogSource, SourceError};
use crate::domain::analytics::{
    self, PerformanceInput,
};
use crate::domain::catalog::{ChannelThumbnails, ChannelVideo};
use crate::domain::duration::{format_clock, parse_seconds};
use crate::util::datetime::rfc3339;

const UPLOADS_ANALYZED: u32 = 50;
const TOP_VIDEO_LIMIT: usize = 10;
const HIDDEN_GEM_LIMIT: usize = 10;
const SEARCH_RESULT_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel not found")]
    ChannelNotFound,
    #[error("video not found")]
    VideoNotFound,
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailSet {
    pub default: Option<String>,
    pub medium: Option<String>,
    pub high: Option<String>,
}

impl ThumbnailSet {
    fn from_domain(thumbnails: ChannelThumbnails) -> Self {
        Self {
            default: thumbnails.default,
            medium: thumbnails.medium,
            high: thumbnails.high,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub subscriber_count: i64,
    pub view_count: i64,
    pub video_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub custom_url: Option<String>,
    pub published_at: Option<String>,
    pub thumbnails: ThumbnailSet,
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub views_per_subscriber: f64,
    pub avg_views_per_video: f64,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopVideo {
    pub id: String,
    pub title: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub engagement_rate: f64,
    pub published_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenGemView {
    pub id: String,
    pub title: String,
    pub view_count: i64,
    pub views_to_subscriber_ratio: f64,
    pub published_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceView {
    pub score: u8,
    pub insights: Vec<String>,
}

/// The full channel scorecard served by the channel endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    pub channel: ChannelCard,
    pub analytics: AnalyticsSummary,
    pub top_videos: Vec<TopVideo>,
    pub hidden_gems: Vec<HiddenGemView>,
    pub performance: PerformanceView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchChannel {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: ThumbnailSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSearchResults {
    pub channels: Vec<SearchChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    pub id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: String,
    pub duration: String,
    pub duration_formatted: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub engagement_rate: f64,
    pub views_to_engagement_ratio: f64,
}

impl VideoView {
    fn from_domain(video: ChannelVideo) -> Self {
        let engagement_rate = analytics::engagement_rate(
            video.like_count,
            video.comment_count,
            video.view_count,
        );
        let views_to_engagement_ratio = analytics::views_to_engagement(
            video.view_count,
            video.like_count,
            video.comment_count,
        );
        let seconds = parse_seconds(&video.duration);
        Self {
            id: video.video_id,
            title: video.title,
            channel_id: video.channel_id,
            channel_title: video.channel_title,
            published_at: rfc3339(video.published_at),
            duration: video.duration,
            duration_formatted: format_clock(seconds as i64),
            view_count: video.view_count,
            like_count: video.like_count,
            comment_count: video.comment_count,
            engagement_rate,
            views_to_engagement_ratio,
        }
    }
}

#[derive(Clone)]
pub struct ChannelService {
    source: Arc<dyn CatalogSource>,
    cache: CacheGateway,
    hidden_gem_threshold: f64,
}

impl ChannelService {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        cache: CacheGateway,
        hidden_gem_threshold: f64,
    ) -> Self {
        Self {
            source,
            cache,
            hidden_gem_threshold,
        }
    }

    /// Builds the channel scorecard: profile, aggregate analytics, per-video
    /// analytics over recent uploads, hidden gems, and the banded
    /// performance score. Errors inside the producer are never cached.
    pub async fn report(&self, channel_id: &str) -> Result<ChannelReport, ChannelError> {
        let key = keys::channel(channel_id);
        self.cache
            .read_through(&key, CHANNEL_TTL_SECONDS, || async {
                let profile = self
                    .source
                    .channel_profile(channel_id)
                    .await?
                    .ok_or(ChannelError::ChannelNotFound)?;

                let channel_analytics = analytics::channel_analytics(
                    profile.subscriber_count,
                    profile.view_count,
                    profile.video_count,
                );
                let videos = self
                    .source
                    .channel_videos(channel_id, UPLOADS_ANALYZED)
                    .await?;
                let engagement_rate = analytics::average_engagement_rate(&videos);

                let mut gems = analytics::find_hidden_gems(
                    &videos,
                    profile.subscriber_count,
                    self.hidden_gem_threshold,
                );
                gems.truncate(HIDDEN_GEM_LIMIT);

                let performance = analytics::channel_performance(&PerformanceInput {
                    views_per_subscriber: channel_analytics.views_per_subscriber,
                    avg_views_per_video: channel_analytics.avg_views_per_video,
                    video_count: profile.video_count,
                    view_count: profile.view_count,
                });

                let mut by_views = videos.clone();
                by_views.sort_by(|a, b| b.view_count.cmp(&a.view_count));
                by_views.truncate(TOP_VIDEO_LIMIT);

                Ok(ChannelReport {
                    channel: ChannelCard {
                        id: profile.channel_id,
                        title: profile.title,
                        description: profile.description,
                        custom_url: profile.custom_url,
                        published_at: profile.published_at.map(rfc3339),
                        thumbnails: ThumbnailSet::from_domain(profile.thumbnails),
                        statistics: ChannelStatistics {
                            subscriber_count: profile.subscriber_count,
                            view_count: profile.view_count,
                            video_count: profile.video_count,
                        },
                    },
                    analytics: AnalyticsSummary {
                        views_per_subscriber: channel_analytics.views_per_subscriber,
                        avg_views_per_video: channel_analytics.avg_views_per_video,
                        engagement_rate,
                    },
                    top_videos: by_views
                        .into_iter()
                        .map(|video| TopVideo {
                            engagement_rate: analytics::engagement_rate(
                                video.like_count,
                                video.comment_count,
                                video.view_count,
                            ),
                            id: video.video_id,
                            title: video.title,
                            view_count: video.view_count,
                            like_count: video.like_count,
                            comment_count: video.comment_count,
                            published_at: rfc3339(video.published_at),
                        })
                        .collect(),
                    hidden_gems: gems
                        .into_iter()
                        .map(|gem| HiddenGemView {
                            id: gem.video.video_id,
                            title: gem.video.title,
                            view_count: gem.video.view_count,
                            views_to_subscriber_ratio: gem.ratio,
                            published_at: rfc3339(gem.video.published_at),
                        })
                        .collect(),
                    performance: PerformanceView {
                        score: performance.score,
                        insights: performance.insights,
                    },
                })
            })
            .await
    }

    pub async fn search(&self, query: &str) -> Result<ChannelSearchResults, ChannelError> {
        let key = keys::channel_search(query);
        self.cache
            .read_through(&key, SEARCH_TTL_SECONDS, || async {
                let hits = self
                    .source
                    .search_channels(query, SEARCH_RESULT_LIMIT)
                    .await?;
                Ok(ChannelSearchResults {
                    channels: hits
                        .into_iter()
                        .map(|hit| SearchChannel {
                            id: hit.channel_id,
                            title: hit.title,
                            description: hit.description,
                            thumbnails: ThumbnailSet::from_domain(hit.thumbnails),
                        })
                        .collect(),
                })
            })
            .await
    }

    pub async fn video(&self, video_id: &str) -> Result<VideoView, ChannelError> {
        let key = keys::video(video_id);
        self.cache
            .read_through(&key, CHANNEL_TTL_SECONDS, || async {
                let video = self
                    .source
                    .video(video_id)
                    .await?
                    .ok_or(ChannelError::VideoNotFound)?;
                Ok(VideoView::from_domain(video))
            })
            .await
    }
}
