//! HTTP adapter for the upstream video catalog API.
//!
//! The upstream paginates trending in pages of at most 50 and classifies
//! nothing by length, so short-form selection happens here: pages are
//! pulled and filtered until the requested count is assembled or the page
//! budget runs out. Statistics arrive as decimal strings and are parsed
//! leniently; a missing count reads as zero.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use url::Url;

use crate::application::source::{CatalogSource, SourceError, TrendingBatch, TrendingRequest};
use crate::config::UpstreamSettings;
use crate::domain::catalog::{
    CatalogItem, ChannelProfile, ChannelSummary, ChannelThumbnails, ChannelVideo,
};
use crate::domain::duration::is_short_form;
use crate::domain::types::ContentType;

use super::error::InfraError;

pub const METRIC_UPSTREAM_CALL_MS: &str = "marea_upstream_call_ms";

/// Upstream hard limit on ids per `/channels` lookup.
const CHANNELS_BATCH_SIZE: usize = 50;

pub struct HttpCatalogSource {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
    max_pages: u32,
}

impl HttpCatalogSource {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        // Relative joins need the trailing slash, or the last path segment
        // of the base would be replaced.
        let mut raw = settings.base_url.trim_end_matches('/').to_string();
        raw.push('/');
        let base_url = Url::parse(&raw).map_err(|err| {
            InfraError::configuration(format!("invalid upstream base url `{raw}`: {err}"))
        })?;

        let client = Client::builder()
            .user_agent(concat!("marea/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build upstream client: {err}"))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            page_size: settings.page_size,
            max_pages: settings.max_pages,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut url = self.base_url.join(path).map_err(SourceError::transport)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SourceError::transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(SourceError::transport)?;
        histogram!(METRIC_UPSTREAM_CALL_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes).map_err(SourceError::decode)
    }

    /// Resolves channel statistics for every distinct channel among
    /// `items` and folds them in. Best-effort: items keep their zero
    /// defaults when the lookup fails, the batch itself still succeeds.
    async fn enrich_with_channels(&self, items: &mut [CatalogItem]) {
        let mut seen = HashSet::new();
        let ids: Vec<String> = items
            .iter()
            .filter(|item| !item.channel_id.is_empty())
            .map(|item| item.channel_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return;
        }

        let mut stats: HashMap<String, ChannelStats> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(CHANNELS_BATCH_SIZE) {
            let query = [
                ("part", "snippet,statistics".to_string()),
                ("id", chunk.join(",")),
                ("maxResults", CHANNELS_BATCH_SIZE.to_string()),
            ];
            match self
                .get_json::<wire::Paged<wire::Channel>>("channels", &query)
                .await
            {
                Ok(page) => {
                    for channel in page.items {
                        stats.insert(channel.id.clone(), ChannelStats::from_wire(channel));
                    }
                }
                Err(error) => {
                    warn!(
                        target: "marea::upstream",
                        %error,
                        channels = chunk.len(),
                        "channel enrichment lookup failed"
                    );
                }
            }
        }

        for item in items {
            if let Some(found) = stats.get(&item.channel_id) {
                item.channel_thumbnail_url = found.thumbnail_url.clone();
                item.subscriber_count = found.subscriber_count;
                item.video_count = found.video_count;
            }
        }
    }

    async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>, SourceError> {
        let query = [
            ("part", "contentDetails".to_string()),
            ("id", channel_id.to_string()),
        ];
        let page: wire::Paged<wire::Channel> = self.get_json("channels", &query).await?;
        Ok(page
            .items
            .into_iter()
            .next()
            .and_then(|channel| channel.content_details)
            .and_then(|details| details.related_playlists)
            .and_then(|playlists| playlists.uploads))
    }

    async fn videos_by_id(&self, ids: &[String]) -> Result<Vec<ChannelVideo>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", ids.join(",")),
        ];
        let page: wire::Paged<wire::Video> = self.get_json("videos", &query).await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(channel_video_from_wire)
            .collect())
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn trending(&self, request: &TrendingRequest) -> Result<TrendingBatch, SourceError> {
        let target = request.target_count as usize;
        let mut items: Vec<CatalogItem> = Vec::with_capacity(target);
        let mut seen = HashSet::new();
        let mut page_token = request.page_token.clone();
        let mut next_page_token = None;

        for _ in 0..self.max_pages {
            let mut query = vec![
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("chart", "mostPopular".to_string()),
                ("maxResults", self.page_size.to_string()),
            ];
            // `GLOBAL` means no region filter; the upstream then serves its
            // default worldwide chart.
            if !request.region_code.eq_ignore_ascii_case("GLOBAL") {
                query.push(("regionCode", request.region_code.clone()));
            }
            if let Some(category) = request.category_id.as_deref() {
                query.push(("videoCategoryId", category.to_string()));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token.to_string()));
            }

            let page: wire::Paged<wire::Video> = self.get_json("videos", &query).await?;
            let fetched_token = page.next_page_token;

            for resource in page.items {
                if items.len() >= target {
                    break;
                }
                let Some(item) = catalog_item_from_wire(resource) else {
                    continue;
                };
                if matches_content_type(request.content_type, &item)
                    && seen.insert(item.video_id.clone())
                {
                    items.push(item);
                }
            }

            next_page_token = fetched_token.clone();
            if items.len() >= target || fetched_token.is_none() {
                break;
            }
            page_token = fetched_token;
        }

        debug!(
            target: "marea::upstream",
            region = %request.region_code,
            content_type = request.content_type.as_str(),
            assembled = items.len(),
            "trending batch assembled"
        );

        self.enrich_with_channels(&mut items).await;

        Ok(TrendingBatch {
            items,
            next_page_token,
        })
    }

    async fn channel_profile(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelProfile>, SourceError> {
        let query = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", channel_id.to_string()),
        ];
        let page: wire::Paged<wire::Channel> = self.get_json("channels", &query).await?;
        Ok(page.items.into_iter().next().map(channel_profile_from_wire))
    }

    async fn channel_videos(
        &self,
        channel_id: &str,
        max: u32,
    ) -> Result<Vec<ChannelVideo>, SourceError> {
        let Some(playlist_id) = self.uploads_playlist(channel_id).await? else {
            return Ok(Vec::new());
        };

        let query = [
            ("part", "contentDetails".to_string()),
            ("playlistId", playlist_id),
            ("maxResults", max.to_string()),
        ];
        let page: wire::Paged<wire::PlaylistItem> = self.get_json("playlistItems", &query).await?;
        let ids: Vec<String> = page
            .items
            .into_iter()
            .filter_map(|item| item.content_details)
            .filter_map(|details| details.video_id)
            .collect();

        self.videos_by_id(&ids).await
    }

    async fn video(&self, video_id: &str) -> Result<Option<ChannelVideo>, SourceError> {
        let query = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", video_id.to_string()),
        ];
        let page: wire::Paged<wire::Video> = self.get_json("videos", &query).await?;
        Ok(page.items.into_iter().next().and_then(channel_video_from_wire))
    }

    async fn search_channels(
        &self,
        query: &str,
        max: u32,
    ) -> Result<Vec<ChannelSummary>, SourceError> {
        let params = [
            ("part", "snippet".to_string()),
            ("q", query.to_string()),
            ("type", "channel".to_string()),
            ("maxResults", max.to_string()),
        ];
        let page: wire::Paged<wire::SearchResult> = self.get_json("search", &params).await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(channel_summary_from_wire)
            .collect())
    }
}

struct ChannelStats {
    thumbnail_url: Option<String>,
    subscriber_count: i64,
    video_count: i64,
}

impl ChannelStats {
    fn from_wire(channel: wire::Channel) -> Self {
        let thumbnail_url = channel
            .snippet
            .and_then(|snippet| snippet.thumbnails)
            .and_then(|thumbs| thumbs.default)
            .map(|thumb| thumb.url);
        let (subscriber_count, video_count) = match channel.statistics {
            Some(stats) => (
                parse_count(stats.subscriber_count.as_deref()),
                parse_count(stats.video_count.as_deref()),
            ),
            None => (0, 0),
        };
        Self {
            thumbnail_url,
            subscriber_count,
            video_count,
        }
    }
}

fn matches_content_type(content_type: ContentType, item: &CatalogItem) -> bool {
    match content_type {
        ContentType::Short => is_short_form(item.duration_seconds()),
        // Unknown durations (live streams report none) land in the
        // long-form feed rather than vanishing from both.
        ContentType::Long => !is_short_form(item.duration_seconds()),
    }
}

fn classify_failure(status: u16, body: &[u8]) -> SourceError {
    let envelope: Option<wire::ErrorEnvelope> = serde_json::from_slice(body).ok();
    let reason = envelope
        .as_ref()
        .and_then(|e| e.error.errors.first())
        .map(|detail| detail.reason.as_str())
        .unwrap_or_default();

    if status == 403 && reason.contains("quota") {
        return SourceError::QuotaExhausted;
    }
    if status == 404 {
        return SourceError::NotFound;
    }
    let message = envelope
        .map(|e| e.error.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    SourceError::Transport(format!("upstream returned {status}: {message}"))
}

fn parse_count(value: Option<&str>) -> i64 {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(0)
}

fn parse_timestamp(value: Option<&str>) -> Option<OffsetDateTime> {
    value.and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
}

fn video_thumbnail(thumbs: Option<wire::Thumbnails>) -> String {
    thumbs
        .and_then(|set| set.high.or(set.medium).or(set.default))
        .map(|thumb| thumb.url)
        .unwrap_or_default()
}

fn channel_thumbnails(thumbs: Option<wire::Thumbnails>) -> ChannelThumbnails {
    match thumbs {
        Some(set) => ChannelThumbnails {
            default: set.default.map(|thumb| thumb.url),
            medium: set.medium.map(|thumb| thumb.url),
            high: set.high.map(|thumb| thumb.url),
        },
        None => ChannelThumbnails::default(),
    }
}

/// Items without an id or a parseable publish timestamp are dropped: every
/// downstream period filter keys off the publish time.
fn catalog_item_from_wire(video: wire::Video) -> Option<CatalogItem> {
    if video.id.is_empty() {
        return None;
    }
    let snippet = video.snippet.unwrap_or_default();
    let published_at = parse_timestamp(snippet.published_at.as_deref())?;
    let stats = video.statistics.unwrap_or_default();
    let duration = video
        .content_details
        .and_then(|details| details.duration)
        .unwrap_or_default();

    Some(CatalogItem {
        video_id: video.id,
        title: snippet.title.unwrap_or_default(),
        description: snippet.description.unwrap_or_default(),
        thumbnail_url: video_thumbnail(snippet.thumbnails),
        published_at,
        duration,
        view_count: parse_count(stats.view_count.as_deref()),
        like_count: parse_count(stats.like_count.as_deref()),
        comment_count: parse_count(stats.comment_count.as_deref()),
        channel_id: snippet.channel_id.unwrap_or_default(),
        channel_title: snippet.channel_title.unwrap_or_default(),
        channel_thumbnail_url: None,
        subscriber_count: 0,
        video_count: 0,
    })
}

fn channel_video_from_wire(video: wire::Video) -> Option<ChannelVideo> {
    if video.id.is_empty() {
        return None;
    }
    let snippet = video.snippet.unwrap_or_default();
    let published_at = parse_timestamp(snippet.published_at.as_deref())?;
    let stats = video.statistics.unwrap_or_default();
    let duration = video
        .content_details
        .and_then(|details| details.duration)
        .unwrap_or_default();

    Some(ChannelVideo {
        video_id: video.id,
        title: snippet.title.unwrap_or_default(),
        published_at,
        duration,
        view_count: parse_count(stats.view_count.as_deref()),
        like_count: parse_count(stats.like_count.as_deref()),
        comment_count: parse_count(stats.comment_count.as_deref()),
        channel_id: snippet.channel_id.unwrap_or_default(),
        channel_title: snippet.channel_title.unwrap_or_default(),
    })
}

fn channel_profile_from_wire(channel: wire::Channel) -> ChannelProfile {
    let snippet = channel.snippet.unwrap_or_default();
    let stats = channel.statistics.unwrap_or_default();
    ChannelProfile {
        channel_id: channel.id,
        title: snippet.title.unwrap_or_default(),
        description: snippet.description.unwrap_or_default(),
        custom_url: snippet.custom_url,
        published_at: parse_timestamp(snippet.published_at.as_deref()),
        thumbnails: channel_thumbnails(snippet.thumbnails),
        subscriber_count: parse_count(stats.subscriber_count.as_deref()),
        view_count: parse_count(stats.view_count.as_deref()),
        video_count: parse_count(stats.video_count.as_deref()),
    }
}

fn channel_summary_from_wire(result: wire::SearchResult) -> Option<ChannelSummary> {
    let channel_id = result.id.and_then(|id| id.channel_id)?;
    let snippet = result.snippet.unwrap_or_default();
    Some(ChannelSummary {
        channel_id,
        title: snippet.title.unwrap_or_default(),
        description: snippet.description.unwrap_or_default(),
        thumbnails: channel_thumbnails(snippet.thumbnails),
    })
}

/// Wire shapes as the upstream serves them. Everything beyond the id is
/// optional; absent collections decode as empty.
mod wire {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Paged<T> {
        #[serde(default = "Vec::new")]
        pub items: Vec<T>,
        #[serde(default)]
        pub next_page_token: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Video {
        #[serde(default)]
        pub id: String,
        pub snippet: Option<VideoSnippet>,
        pub statistics: Option<VideoStatistics>,
        pub content_details: Option<VideoContentDetails>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VideoSnippet {
        pub title: Option<String>,
        pub description: Option<String>,
        pub published_at: Option<String>,
        pub channel_id: Option<String>,
        pub channel_title: Option<String>,
        pub thumbnails: Option<Thumbnails>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VideoStatistics {
        pub view_count: Option<String>,
        pub like_count: Option<String>,
        pub comment_count: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VideoContentDetails {
        pub duration: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Thumbnails {
        pub default: Option<Thumbnail>,
        pub medium: Option<Thumbnail>,
        pub high: Option<Thumbnail>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Thumbnail {
        pub url: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Channel {
        #[serde(default)]
        pub id: String,
        pub snippet: Option<ChannelSnippet>,
        pub statistics: Option<ChannelStatistics>,
        pub content_details: Option<ChannelContentDetails>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChannelSnippet {
        pub title: Option<String>,
        pub description: Option<String>,
        pub custom_url: Option<String>,
        pub published_at: Option<String>,
        pub thumbnails: Option<Thumbnails>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChannelStatistics {
        pub subscriber_count: Option<String>,
        pub view_count: Option<String>,
        pub video_count: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChannelContentDetails {
        pub related_playlists: Option<RelatedPlaylists>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RelatedPlaylists {
        pub uploads: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PlaylistItem {
        pub content_details: Option<PlaylistItemContentDetails>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PlaylistItemContentDetails {
        pub video_id: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SearchResult {
        pub id: Option<SearchResultId>,
        pub snippet: Option<ChannelSnippet>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SearchResultId {
        pub channel_id: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorEnvelope {
        pub error: ErrorBody,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub message: String,
        #[serde(default = "Vec::new")]
        pub errors: Vec<ErrorDetail>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        #[serde(default)]
        pub reason: String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_json(id: &str, duration: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "snippet": {
                "title": "a title",
                "description": "words",
                "publishedAt": "2024-03-01T09:00:00Z",
                "channelId": "c1",
                "channelTitle": "channel",
                "thumbnails": {
                    "default": { "url": "http://img/default.jpg" },
                    "high": { "url": "http://img/high.jpg" }
                }
            },
            "statistics": {
                "viewCount": "1200",
                "likeCount": "40",
                "commentCount": "8"
            },
            "contentDetails": { "duration": duration }
        })
    }

    #[test]
    fn wire_video_maps_to_catalog_item() {
        let video: wire::Video = serde_json::from_value(video_json("v1", "PT59S")).unwrap();
        let item = catalog_item_from_wire(video).unwrap();
        assert_eq!(item.video_id, "v1");
        assert_eq!(item.view_count, 1200);
        assert_eq!(item.thumbnail_url, "http://img/high.jpg");
        assert_eq!(item.duration_seconds(), 59);
        assert_eq!(item.subscriber_count, 0);
    }

    #[test]
    fn items_without_publish_timestamps_are_dropped() {
        let mut raw = video_json("v1", "PT59S");
        raw["snippet"]
            .as_object_mut()
            .unwrap()
            .remove("publishedAt");
        let video: wire::Video = serde_json::from_value(raw).unwrap();
        assert!(catalog_item_from_wire(video).is_none());
    }

    #[test]
    fn content_type_filter_splits_on_the_sixty_second_bound() {
        let short: wire::Video = serde_json::from_value(video_json("v1", "PT60S")).unwrap();
        let long: wire::Video = serde_json::from_value(video_json("v2", "PT1M1S")).unwrap();
        let unknown: wire::Video = serde_json::from_value(video_json("v3", "")).unwrap();

        let short = catalog_item_from_wire(short).unwrap();
        let long = catalog_item_from_wire(long).unwrap();
        let unknown = catalog_item_from_wire(unknown).unwrap();

        assert!(matches_content_type(ContentType::Short, &short));
        assert!(!matches_content_type(ContentType::Long, &short));
        assert!(matches_content_type(ContentType::Long, &long));
        assert!(matches_content_type(ContentType::Long, &unknown));
    }

    #[test]
    fn missing_items_field_decodes_as_empty_page() {
        let page: wire::Paged<wire::Video> = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn quota_failures_are_classified_from_the_error_reason() {
        let body = serde_json::json!({
            "error": {
                "code": 403,
                "message": "quota exceeded",
                "errors": [{ "reason": "quotaExceeded" }]
            }
        });
        let err = classify_failure(403, body.to_string().as_bytes());
        assert!(matches!(err, SourceError::QuotaExhausted));

        let plain = classify_failure(500, b"upstream broke");
        assert!(matches!(plain, SourceError::Transport(_)));
    }

    #[test]
    fn lenient_count_parsing_defaults_to_zero() {
        assert_eq!(parse_count(Some("123")), 123);
        assert_eq!(parse_count(Some("not-a-number")), 0);
        assert_eq!(parse_count(None), 0);
    }
}
