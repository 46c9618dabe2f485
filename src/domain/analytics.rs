//! Pure ranking and analytics functions.
//!
//! Everything here is side-effect-free and total: zero denominators degrade
//! to zero-valued ratios instead of panicking or erroring, enforced by
//! explicit check-before-divide.

use crate::domain::catalog::{ChannelVideo, TrendingSnapshot};
use crate::domain::types::{SortField, SortOrder};

/// Default multiplier for hidden-gem discovery: reach at least twice the
/// subscriber base.
pub const HIDDEN_GEM_THRESHOLD: f64 = 2.0;

/// Engagement as a percentage of views: `(likes + comments) / views * 100`.
pub fn engagement_rate(like_count: i64, comment_count: i64, view_count: i64) -> f64 {
    if view_count <= 0 {
        return 0.0;
    }
    (like_count + comment_count) as f64 / view_count as f64 * 100.0
}

pub fn views_per_subscriber(view_count: i64, subscriber_count: i64) -> f64 {
    if subscriber_count <= 0 {
        return 0.0;
    }
    view_count as f64 / subscriber_count as f64
}

/// Views per unit of engagement (likes + comments); 0 when the video has
/// no views or no engagement at all.
pub fn views_to_engagement(view_count: i64, like_count: i64, comment_count: i64) -> f64 {
    let engagement = like_count + comment_count;
    if view_count <= 0 || engagement <= 0 {
        return 0.0;
    }
    view_count as f64 / engagement as f64
}

pub fn avg_views_per_video(view_count: i64, video_count: i64) -> f64 {
    if video_count <= 0 {
        return 0.0;
    }
    view_count as f64 / video_count as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelAnalytics {
    pub views_per_subscriber: f64,
    pub avg_views_per_video: f64,
}

pub fn channel_analytics(
    subscriber_count: i64,
    view_count: i64,
    video_count: i64,
) -> ChannelAnalytics {
    ChannelAnalytics {
        views_per_subscriber: views_per_subscriber(view_count, subscriber_count),
        avg_views_per_video: avg_views_per_video(view_count, video_count),
    }
}

/// Hidden-gem test: the views-to-subscriber ratio meets the threshold.
/// The boundary is inclusive.
pub fn is_hidden_gem(ratio: f64, threshold: f64) -> bool {
    ratio >= threshold
}

/// A channel upload annotated with its views-to-subscriber ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct RatedVideo {
    pub video: ChannelVideo,
    pub ratio: f64,
}

/// Finds uploads whose reach is disproportionate to the channel's
/// subscriber base: ratio at/above threshold, sorted descending by ratio.
pub fn find_hidden_gems(
    videos: &[ChannelVideo],
    subscriber_count: i64,
    threshold: f64,
) -> Vec<RatedVideo> {
    let mut gems: Vec<RatedVideo> = videos
        .iter()
        .map(|video| RatedVideo {
            video: video.clone(),
            ratio: views_per_subscriber(video.view_count, subscriber_count),
        })
        .filter(|rated| is_hidden_gem(rated.ratio, threshold))
        .collect();
    gems.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    gems
}

/// Mean engagement rate across a set of uploads; 0 for an empty set.
pub fn average_engagement_rate(videos: &[ChannelVideo]) -> f64 {
    if videos.is_empty() {
        return 0.0;
    }
    let total: f64 = videos
        .iter()
        .map(|video| engagement_rate(video.like_count, video.comment_count, video.view_count))
        .sum();
    total / videos.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceInput {
    pub views_per_subscriber: f64,
    pub avg_views_per_video: f64,
    pub video_count: i64,
    pub view_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub score: u8,
    pub insights: Vec<String>,
}

/// Banded scoring over four independent signals, two thresholds each.
/// The unweighted band sum is bounded to [30, 100] by construction
/// (30 + 30 + 20 + 20 maximum, 10 + 10 + 5 + 5 minimum).
pub fn channel_performance(input: &PerformanceInput) -> PerformanceReport {
    let mut score: u8 = 0;
    let mut insights = Vec::with_capacity(4);

    if input.views_per_subscriber > 100.0 {
        score += 30;
        insights.push("Views far exceed the subscriber base (very high reach)".to_string());
    } else if input.views_per_subscriber > 50.0 {
        score += 20;
        insights.push("Views well above the subscriber base (high reach)".to_string());
    } else {
        score += 10;
        insights.push("Views roughly in line with the subscriber base".to_string());
    }

    if input.avg_views_per_video > 10_000.0 {
        score += 30;
        insights.push("Average views per upload are very high".to_string());
    } else if input.avg_views_per_video > 5_000.0 {
        score += 20;
        insights.push("Average views per upload are high".to_string());
    } else {
        score += 10;
        insights.push("Average views per upload are moderate".to_string());
    }

    if input.video_count > 100 {
        score += 20;
        insights.push("Large upload library (over 100 videos)".to_string());
    } else if input.video_count > 50 {
        score += 15;
        insights.push("Substantial upload library (over 50 videos)".to_string());
    } else {
        score += 5;
        insights.push("Upload library still growing".to_string());
    }

    if input.view_count > 1_000_000 {
        score += 20;
        insights.push("Total views past the one million mark".to_string());
    } else if input.view_count > 100_000 {
        score += 15;
        insights.push("Total views past the hundred thousand mark".to_string());
    } else {
        score += 5;
        insights.push("Total views still building".to_string());
    }

    PerformanceReport { score, insights }
}

/// Stable re-sort for chart views. Ties keep their stored-rank order, so
/// equal-valued rows never swap between reads.
pub fn sort_snapshots(rows: &mut [TrendingSnapshot], field: SortField, order: SortOrder) {
    let compare = |a: &TrendingSnapshot, b: &TrendingSnapshot| match field {
        SortField::Rank => a.rank.cmp(&b.rank),
        SortField::Views => a.view_count.cmp(&b.view_count),
        SortField::Likes => a.like_count.cmp(&b.like_count),
        SortField::Comments => a.comment_count.cmp(&b.comment_count),
        SortField::Subscribers => a.subscriber_count.cmp(&b.subscriber_count),
        SortField::Ratio => a
            .views_per_subscriber()
            .total_cmp(&b.views_per_subscriber()),
        SortField::PublishedAt => a.published_at.cmp(&b.published_at),
    };
    match order {
        SortOrder::Asc => rows.sort_by(compare),
        SortOrder::Desc => rows.sort_by(|a, b| compare(b, a)),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::catalog::CatalogItem;
    use crate::domain::types::{ContentType, PartitionKey};

    fn upload(id: &str, views: i64, likes: i64, comments: i64) -> ChannelVideo {
        ChannelVideo {
            video_id: id.to_string(),
            title: format!("video {id}"),
            published_at: datetime!(2024-01-01 00:00 UTC),
            duration: "PT3M".to_string(),
            view_count: views,
            like_count: likes,
            comment_count: comments,
            channel_id: "c1".to_string(),
            channel_title: "channel".to_string(),
        }
    }

    fn snapshot(id: &str, rank: i32, views: i64, subscribers: i64) -> TrendingSnapshot {
        let key = PartitionKey::new("KR", None, ContentType::Short);
        let item = CatalogItem {
            video_id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            thumbnail_url: String::new(),
            published_at: datetime!(2024-01-01 00:00 UTC),
            duration: "PT30S".to_string(),
            view_count: views,
            like_count: 0,
            comment_count: 0,
            channel_id: "c1".to_string(),
            channel_title: "channel".to_string(),
            channel_thumbnail_url: None,
            subscriber_count: subscribers,
            video_count: 1,
        };
        TrendingSnapshot::from_catalog(item, &key, rank, datetime!(2024-03-01 00:00 UTC))
    }

    #[test]
    fn zero_views_yield_zero_engagement() {
        assert_eq!(engagement_rate(10, 5, 0), 0.0);
        assert_eq!(engagement_rate(10, 5, -1), 0.0);
    }

    #[test]
    fn engagement_is_a_percentage_of_views() {
        assert!((engagement_rate(40, 10, 1_000) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_subscribers_yield_zero_ratio() {
        assert_eq!(views_per_subscriber(5_000, 0), 0.0);
        assert_eq!(avg_views_per_video(5_000, 0), 0.0);
        assert_eq!(views_to_engagement(0, 10, 10), 0.0);
        assert_eq!(views_to_engagement(100, 0, 0), 0.0);
    }

    #[test]
    fn hidden_gem_boundary_is_inclusive_at_the_threshold() {
        assert!(is_hidden_gem(2.0, HIDDEN_GEM_THRESHOLD));
        assert!(is_hidden_gem(2.5, HIDDEN_GEM_THRESHOLD));
        assert!(!is_hidden_gem(1.999_999, HIDDEN_GEM_THRESHOLD));
    }

    #[test]
    fn hidden_gems_filter_and_sort_descending() {
        let videos = vec![
            upload("low", 100, 0, 0),
            upload("edge", 200, 0, 0),
            upload("top", 1_000, 0, 0),
        ];
        let gems = find_hidden_gems(&videos, 100, HIDDEN_GEM_THRESHOLD);
        let ids: Vec<&str> = gems.iter().map(|gem| gem.video.video_id.as_str()).collect();
        assert_eq!(ids, vec!["top", "edge"]);
        assert!((gems[0].ratio - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hidden_gems_with_no_subscribers_find_nothing() {
        let videos = vec![upload("a", 1_000_000, 0, 0)];
        assert!(find_hidden_gems(&videos, 0, HIDDEN_GEM_THRESHOLD).is_empty());
    }

    #[test]
    fn average_engagement_over_empty_set_is_zero() {
        assert_eq!(average_engagement_rate(&[]), 0.0);
    }

    #[test]
    fn performance_score_extremes_are_30_and_100() {
        let floor = channel_performance(&PerformanceInput {
            views_per_subscriber: 0.0,
            avg_views_per_video: 0.0,
            video_count: 0,
            view_count: 0,
        });
        assert_eq!(floor.score, 30);
        assert_eq!(floor.insights.len(), 4);

        let ceiling = channel_performance(&PerformanceInput {
            views_per_subscriber: 150.0,
            avg_views_per_video: 50_000.0,
            video_count: 500,
            view_count: 10_000_000,
        });
        assert_eq!(ceiling.score, 100);
        assert_eq!(ceiling.insights.len(), 4);
    }

    #[test]
    fn performance_middle_bands_add_up() {
        let report = channel_performance(&PerformanceInput {
            views_per_subscriber: 60.0,
            avg_views_per_video: 6_000.0,
            video_count: 60,
            view_count: 200_000,
        });
        assert_eq!(report.score, 20 + 20 + 15 + 15);
    }

    #[test]
    fn sort_is_stable_for_equal_values() {
        let mut rows = vec![
            snapshot("first", 1, 500, 10),
            snapshot("second", 2, 500, 10),
            snapshot("third", 3, 900, 10),
        ];
        sort_snapshots(&mut rows, SortField::Views, SortOrder::Desc);
        let ids: Vec<&str> = rows.iter().map(|row| row.video_id.as_str()).collect();
        // Equal view counts keep stored-rank order.
        assert_eq!(ids, vec!["third", "first", "second"]);
    }

    #[test]
    fn ratio_sort_handles_zero_subscriber_rows() {
        let mut rows = vec![snapshot("zero", 1, 1_000, 0), snapshot("some", 2, 1_000, 100)];
        sort_snapshots(&mut rows, SortField::Ratio, SortOrder::Desc);
        assert_eq!(rows[0].video_id, "some");
    }
}
