//! Query-string and body shapes of the public API.
//!
//! Parameters keep the wire spellings the original clients send
//! (camelCase, `videoType` values `short|shorts|long|videos`); conversion
//! into domain enums happens in the handlers.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingFeedParams {
    pub region_code: Option<String>,
    pub video_category_id: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelParams {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoParams {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartParams {
    pub region_code: Option<String>,
    pub video_type: Option<String>,
    pub video_category_id: Option<String>,
    pub period: Option<String>,
    /// Anchor date `YYYY-MM-DD` for calendar-based periods.
    pub date: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub hidden_gems_only: Option<bool>,
    pub hidden_gem_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsParams {
    pub region_code: Option<String>,
    pub video_type: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    /// Glob pattern under the service's key namespace; absent means the
    /// whole namespace.
    pub pattern: Option<String>,
}
