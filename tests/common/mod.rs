#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;

use marea::application::cache::{CacheBackend, CacheError};
use marea::application::repos::{
    ChannelActivity, ChannelAggregate, HealthRepo, RegionScope, RepoError, SnapshotsRepo,
};
use marea::application::source::{CatalogSource, SourceError, TrendingBatch, TrendingRequest};
use marea::domain::catalog::{
    CatalogItem, ChannelProfile, ChannelSummary, ChannelThumbnails, ChannelVideo, TrendingSnapshot,
};
use marea::domain::period::PublishedWindow;
use marea::domain::types::PartitionKey;

pub const STAMP: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

pub fn catalog_item(video_id: &str, view_count: i64) -> CatalogItem {
    CatalogItem {
        video_id: video_id.to_string(),
        title: format!("title {video_id}"),
        description: String::new(),
        thumbnail_url: format!("https://img.example/{video_id}.jpg"),
        published_at: datetime!(2024-02-20 00:00 UTC),
        duration: "PT45S".to_string(),
        view_count,
        like_count: view_count / 20,
        comment_count: view_count / 100,
        channel_id: format!("ch-{video_id}"),
        channel_title: format!("channel {video_id}"),
        channel_thumbnail_url: None,
        subscriber_count: 1_000,
        video_count: 10,
    }
}

pub fn snapshot(
    video_id: &str,
    key: &PartitionKey,
    rank: i32,
    collected_at: OffsetDateTime,
) -> TrendingSnapshot {
    TrendingSnapshot::from_catalog(catalog_item(video_id, 1_000 * rank as i64), key, rank, collected_at)
}

/// In-memory stand-in for the Postgres snapshots repository. Rows live in a
/// map keyed by partition label; partitions listed in `fail_partitions`
/// reject writes so callers can exercise failure isolation.
#[derive(Default)]
pub struct InMemorySnapshots {
    rows: Mutex<HashMap<String, Vec<TrendingSnapshot>>>,
    pub fail_partitions: HashSet<String>,
    pub replace_calls: AtomicUsize,
}

impl InMemorySnapshots {
    pub fn failing(partitions: &[&str]) -> Self {
        Self {
            fail_partitions: partitions.iter().map(|label| label.to_string()).collect(),
            ..Self::default()
        }
    }

    pub async fn partition_rows(&self, label: &str) -> Vec<TrendingSnapshot> {
        self.rows.lock().await.get(label).cloned().unwrap_or_default()
    }

    pub async fn total_rows(&self) -> usize {
        self.rows.lock().await.values().map(Vec::len).sum()
    }

    pub async fn seed(&self, key: &PartitionKey, rows: Vec<TrendingSnapshot>) {
        self.rows.lock().await.insert(key.label(), rows);
    }

    async fn scope_rows(&self, scope: &RegionScope) -> Vec<TrendingSnapshot> {
        let rows = self.rows.lock().await;
        let mut latest: HashMap<String, TrendingSnapshot> = HashMap::new();
        for row in rows.values().flatten() {
            if row.region_code != scope.region_code
                || row.content_type != scope.content_type
                || !scope.window.contains(row.published_at)
            {
                continue;
            }
            match latest.get(&row.video_id) {
                Some(existing) if existing.collected_at >= row.collected_at => {}
                _ => {
                    latest.insert(row.video_id.clone(), row.clone());
                }
            }
        }
        latest.into_values().collect()
    }
}

#[async_trait]
impl SnapshotsRepo for InMemorySnapshots {
    async fn replace_partition(
        &self,
        key: &PartitionKey,
        rows: &[TrendingSnapshot],
    ) -> Result<(), RepoError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_partitions.contains(&key.label()) {
            return Err(RepoError::Persistence("injected write failure".into()));
        }
        self.rows.lock().await.insert(key.label(), rows.to_vec());
        Ok(())
    }

    async fn list_partition(
        &self,
        key: &PartitionKey,
        window: &PublishedWindow,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut rows: Vec<TrendingSnapshot> = self
            .rows
            .lock()
            .await
            .get(&key.label())
            .map(|rows| {
                rows.iter()
                    .filter(|row| window.contains(row.published_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| row.rank);
        Ok(rows)
    }

    async fn top_by_views(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut rows = self.scope_rows(scope).await;
        rows.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn top_by_engagement(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut rows = self.scope_rows(scope).await;
        rows.sort_by(|a, b| b.engagement_rate.total_cmp(&a.engagement_rate));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn list_scope(&self, scope: &RegionScope) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut rows = self.scope_rows(scope).await;
        rows.sort_by_key(|row| row.rank);
        Ok(rows)
    }

    async fn top_channels(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelAggregate>, RepoError> {
        let rows = self.scope_rows(scope).await;
        let mut latest: HashMap<String, TrendingSnapshot> = HashMap::new();
        for row in rows {
            match latest.get(&row.channel_id) {
                Some(existing) if existing.collected_at >= row.collected_at => {}
                _ => {
                    latest.insert(row.channel_id.clone(), row);
                }
            }
        }
        let mut channels: Vec<ChannelAggregate> = latest
            .into_values()
            .map(|row| ChannelAggregate {
                channel_id: row.channel_id,
                channel_title: row.channel_title,
                channel_thumbnail_url: row.channel_thumbnail_url,
                subscriber_count: row.subscriber_count,
                video_count: row.video_count,
            })
            .collect();
        channels.sort_by(|a, b| b.subscriber_count.cmp(&a.subscriber_count));
        channels.truncate(limit as usize);
        Ok(channels)
    }

    async fn channel_activity(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelActivity>, RepoError> {
        let rows = self.scope_rows(scope).await;
        let mut counts: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows {
            counts.entry(row.channel_id).or_default().insert(row.video_id);
        }
        let mut activity: Vec<ChannelActivity> = counts
            .into_iter()
            .map(|(channel_id, videos)| ChannelActivity {
                channel_id,
                trending_count: videos.len() as i64,
            })
            .collect();
        activity.sort_by(|a, b| b.trending_count.cmp(&a.trending_count));
        activity.truncate(limit as usize);
        Ok(activity)
    }

    async fn find_channel_row(
        &self,
        channel_id: &str,
    ) -> Result<Option<TrendingSnapshot>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .flatten()
            .filter(|row| row.channel_id == channel_id)
            .max_by_key(|row| row.collected_at)
            .cloned())
    }

    async fn latest_collected(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut rows = self.scope_rows(scope).await;
        rows.sort_by(|a, b| {
            b.collected_at
                .cmp(&a.collected_at)
                .then(b.published_at.cmp(&a.published_at))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct FakeHealth {
    pub fail: bool,
}

#[async_trait]
impl HealthRepo for FakeHealth {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.fail {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

/// Catalog source fake answering every trending request with the same item
/// list, except for regions flagged to fail. Channel lookups come from
/// preloaded entries.
#[derive(Default)]
pub struct FakeCatalogSource {
    pub items: Vec<CatalogItem>,
    pub fail_regions: HashSet<String>,
    pub profiles: HashMap<String, ChannelProfile>,
    pub channel_videos: HashMap<String, Vec<ChannelVideo>>,
    pub videos: HashMap<String, ChannelVideo>,
    pub search_hits: Vec<ChannelSummary>,
    pub trending_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeCatalogSource {
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn failing_region(mut self, region: &str) -> Self {
        self.fail_regions.insert(region.to_string());
        self
    }
}

#[async_trait]
impl CatalogSource for FakeCatalogSource {
    async fn trending(&self, request: &TrendingRequest) -> Result<TrendingBatch, SourceError> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_regions.contains(&request.region_code) {
            return Err(SourceError::transport("injected upstream failure"));
        }
        let items = self
            .items
            .iter()
            .take(request.target_count as usize)
            .cloned()
            .collect();
        Ok(TrendingBatch {
            items,
            next_page_token: None,
        })
    }

    async fn channel_profile(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelProfile>, SourceError> {
        Ok(self.profiles.get(channel_id).cloned())
    }

    async fn channel_videos(
        &self,
        channel_id: &str,
        max: u32,
    ) -> Result<Vec<ChannelVideo>, SourceError> {
        Ok(self
            .channel_videos
            .get(channel_id)
            .map(|videos| videos.iter().take(max as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn video(&self, video_id: &str) -> Result<Option<ChannelVideo>, SourceError> {
        Ok(self.videos.get(video_id).cloned())
    }

    async fn search_channels(
        &self,
        _query: &str,
        max: u32,
    ) -> Result<Vec<ChannelSummary>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_hits.iter().take(max as usize).cloned().collect())
    }
}

pub fn channel_profile(channel_id: &str, subscriber_count: i64) -> ChannelProfile {
    ChannelProfile {
        channel_id: channel_id.to_string(),
        title: format!("channel {channel_id}"),
        description: "a channel".to_string(),
        custom_url: Some(format!("@{channel_id}")),
        published_at: Some(datetime!(2020-01-01 00:00 UTC)),
        thumbnails: ChannelThumbnails {
            default: Some("https://img.example/default.jpg".to_string()),
            medium: None,
            high: None,
        },
        subscriber_count,
        view_count: subscriber_count * 100,
        video_count: 40,
    }
}

pub fn channel_video(video_id: &str, channel_id: &str, view_count: i64) -> ChannelVideo {
    ChannelVideo {
        video_id: video_id.to_string(),
        title: format!("upload {video_id}"),
        published_at: datetime!(2024-02-10 00:00 UTC),
        duration: "PT3M20S".to_string(),
        view_count,
        like_count: view_count / 25,
        comment_count: view_count / 200,
        channel_id: channel_id.to_string(),
        channel_title: format!("channel {channel_id}"),
    }
}

/// Cache backend fake over a plain map, with per-operation counters and an
/// injectable read failure for degradation tests.
#[derive(Default)]
pub struct SpyBackend {
    entries: Mutex<HashMap<String, String>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_gets: bool,
}

impl SpyBackend {
    pub fn failing_reads() -> Self {
        Self {
            fail_gets: true,
            ..Self::default()
        }
    }

    pub async fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl CacheBackend for SpyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets {
            return Err(CacheError::backend("injected read failure"));
        }
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_seconds: u64) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        if let Some(prefix) = pattern.strip_suffix('*') {
            entries.retain(|key, _| !key.starts_with(prefix));
        } else {
            entries.retain(|key, _| key != pattern);
        }
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
