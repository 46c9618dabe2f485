//! Home rankings: seven small leaderboards over stored snapshot rows.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::cache::{CacheGateway, TRENDING_TTL_SECONDS, keys};
use crate::application::repos::{RegionScope, RepoError, SnapshotsRepo};
use crate::domain::analytics;
use crate::domain::catalog::TrendingSnapshot;
use crate::domain::period::published_window;
use crate::domain::types::{ContentType, Period};

const SECTION_LIMIT: i64 = 5;
const LATEST_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum RankingsError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct RankingsQuery {
    pub region_code: String,
    pub content_type: ContentType,
    pub period: Period,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedVideoCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail_url: Option<String>,
    pub view_count: i64,
    pub subscriber_count: i64,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RisingVideoCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail_url: Option<String>,
    pub view_count: i64,
    pub subscriber_count: i64,
    pub views_to_subscriber_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementVideoCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_id: String,
    pub channel_title: String,
    pub engagement_rate: f64,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopChannelCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub video_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChannelCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    pub trending_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeChannelCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: i64,
    /// Always 0: real growth needs a historical time series we do not keep.
    pub growth: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestTrendingCard {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_title: String,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSections {
    pub top_videos: Vec<RankedVideoCard>,
    pub rising_videos: Vec<RisingVideoCard>,
    pub high_engagement: Vec<EngagementVideoCard>,
    pub top_channels: Vec<TopChannelCard>,
    pub active_channels: Vec<ActiveChannelCard>,
    pub subscriber_surge: Vec<SurgeChannelCard>,
    pub latest_trending: Vec<LatestTrendingCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeRankings {
    pub video_type: ContentType,
    pub period: Period,
    pub region_code: String,
    pub rankings: RankingSections,
}

#[derive(Clone)]
pub struct RankingsService {
    snapshots: Arc<dyn SnapshotsRepo>,
    cache: CacheGateway,
    reporting_tz: Tz,
    hidden_gem_threshold: f64,
}

impl RankingsService {
    pub fn new(
        snapshots: Arc<dyn SnapshotsRepo>,
        cache: CacheGateway,
        reporting_tz: Tz,
        hidden_gem_threshold: f64,
    ) -> Self {
        Self {
            snapshots,
            cache,
            reporting_tz,
            hidden_gem_threshold,
        }
    }

    pub async fn home(&self, query: RankingsQuery) -> Result<HomeRankings, RankingsError> {
        let key = keys::home_rankings(query.content_type, query.period, &query.region_code);
        let window = published_window(
            query.period,
            None,
            self.reporting_tz,
            OffsetDateTime::now_utc(),
        );
        self.cache
            .read_through(&key, TRENDING_TTL_SECONDS, || async {
                let scope = RegionScope::new(query.region_code.clone(), query.content_type)
                    .with_window(window);

                let top_videos = self
                    .snapshots
                    .top_by_views(&scope, SECTION_LIMIT)
                    .await?
                    .into_iter()
                    .map(ranked_card)
                    .collect();

                let rising_videos = self.rising_videos(&scope).await?;

                let high_engagement = self
                    .snapshots
                    .top_by_engagement(&scope, SECTION_LIMIT)
                    .await?
                    .into_iter()
                    .map(|row| EngagementVideoCard {
                        id: row.video_id,
                        title: row.title,
                        thumbnail_url: row.thumbnail_url,
                        channel_id: row.channel_id,
                        channel_title: row.channel_title,
                        engagement_rate: row.engagement_rate,
                        view_count: row.view_count,
                    })
                    .collect();

                let top_channels: Vec<TopChannelCard> = self
                    .snapshots
                    .top_channels(&scope, SECTION_LIMIT)
                    .await?
                    .into_iter()
                    .map(|channel| TopChannelCard {
                        id: channel.channel_id,
                        title: channel.channel_title,
                        thumbnail_url: channel.channel_thumbnail_url,
                        subscriber_count: channel.subscriber_count,
                        video_count: channel.video_count,
                    })
                    .collect();

                let active_channels = self.active_channels(&scope).await?;

                // Same ordering as top channels until a historical series
                // exists to compute real growth from.
                let subscriber_surge = top_channels
                    .iter()
                    .map(|channel| SurgeChannelCard {
                        id: channel.id.clone(),
                        title: channel.title.clone(),
                        thumbnail_url: channel.thumbnail_url.clone(),
                        subscriber_count: channel.subscriber_count,
                        growth: 0,
                    })
                    .collect();

                let latest_trending = self
                    .snapshots
                    .latest_collected(&scope, LATEST_LIMIT)
                    .await?
                    .into_iter()
                    .map(|row| LatestTrendingCard {
                        id: row.video_id,
                        title: row.title,
                        thumbnail_url: row.thumbnail_url,
                        channel_title: row.channel_title,
                        view_count: row.view_count,
                    })
                    .collect();

                Ok(HomeRankings {
                    video_type: query.content_type,
                    period: query.period,
                    region_code: query.region_code.clone(),
                    rankings: RankingSections {
                        top_videos,
                        rising_videos,
                        high_engagement,
                        top_channels,
                        active_channels,
                        subscriber_surge,
                        latest_trending,
                    },
                })
            })
            .await
    }

    /// Rising videos: ratio of views to subscribers at/above the gem
    /// threshold, ranked by that ratio. Computed over the full scope since
    /// the ratio is not a stored column.
    async fn rising_videos(&self, scope: &RegionScope) -> Result<Vec<RisingVideoCard>, RepoError> {
        let rows = self.snapshots.list_scope(scope).await?;
        let mut rated: Vec<(f64, TrendingSnapshot)> = rows
            .into_iter()
            .map(|row| (row.views_per_subscriber(), row))
            .filter(|(ratio, _)| analytics::is_hidden_gem(*ratio, self.hidden_gem_threshold))
            .collect();
        rated.sort_by(|a, b| b.0.total_cmp(&a.0));
        rated.truncate(SECTION_LIMIT as usize);
        Ok(rated
            .into_iter()
            .map(|(ratio, row)| RisingVideoCard {
                id: row.video_id,
                title: row.title,
                thumbnail_url: row.thumbnail_url,
                channel_id: row.channel_id,
                channel_title: row.channel_title,
                channel_thumbnail_url: row.channel_thumbnail_url,
                view_count: row.view_count,
                subscriber_count: row.subscriber_count,
                views_to_subscriber_ratio: ratio,
            })
            .collect())
    }

    /// Channels by distinct trending placements. The representative row
    /// for display is looked up per channel without scope so a channel's
    /// card survives even when its latest row sits in another partition.
    async fn active_channels(
        &self,
        scope: &RegionScope,
    ) -> Result<Vec<ActiveChannelCard>, RepoError> {
        let activity = self.snapshots.channel_activity(scope, SECTION_LIMIT).await?;
        let mut cards = Vec::with_capacity(activity.len());
        for entry in activity {
            let Some(row) = self.snapshots.find_channel_row(&entry.channel_id).await? else {
                continue;
            };
            cards.push(ActiveChannelCard {
                id: row.channel_id,
                title: row.channel_title,
                thumbnail_url: row.channel_thumbnail_url,
                subscriber_count: row.subscriber_count,
                trending_count: entry.trending_count,
            });
        }
        Ok(cards)
    }
}

fn ranked_card(row: TrendingSnapshot) -> RankedVideoCard {
    RankedVideoCard {
        id: row.video_id,
        title: row.title,
        thumbnail_url: row.thumbnail_url,
        channel_id: row.channel_id,
        channel_title: row.channel_title,
        channel_thumbnail_url: row.channel_thumbnail_url,
        view_count: row.view_count,
        subscriber_count: row.subscriber_count,
        engagement_rate: row.engagement_rate,
    }
}
