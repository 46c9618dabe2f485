//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Duration-based classification of a catalog item. Persisted as the
/// Postgres enum `content_type`; an item belongs to exactly one variant
/// per collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_type", rename_all = "snake_case")]
pub enum ContentType {
    Short,
    Long,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Short => "short",
            ContentType::Long => "long",
        }
    }

    /// Parses the public query-parameter spellings alongside the canonical
    /// ones (`shorts`/`videos` are the legacy client values).
    pub fn from_param(value: &str) -> Result<Self, DomainError> {
        match value {
            "short" | "shorts" => Ok(ContentType::Short),
            "long" | "video" | "videos" => Ok(ContentType::Long),
            other => Err(DomainError::unknown_variant("videoType", other)),
        }
    }
}

/// Recency window applied to partition reads. Calendar-based variants are
/// evaluated in the configured reporting timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    YearEnd,
    #[default]
    All,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
            Period::YearEnd => "yearEnd",
            Period::All => "all",
        }
    }

    pub fn from_param(value: &str) -> Result<Self, DomainError> {
        match value {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "yearly" => Ok(Period::Yearly),
            "yearEnd" | "year_end" => Ok(Period::YearEnd),
            "all" => Ok(Period::All),
            other => Err(DomainError::unknown_variant("period", other)),
        }
    }
}

/// Sortable columns for chart views. `Ratio` is the views-to-subscriber
/// ratio computed on the fly rather than a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Rank,
    Views,
    Likes,
    Comments,
    Subscribers,
    Ratio,
    PublishedAt,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Rank => "rank",
            SortField::Views => "views",
            SortField::Likes => "likes",
            SortField::Comments => "comments",
            SortField::Subscribers => "subscribers",
            SortField::Ratio => "ratio",
            SortField::PublishedAt => "publishedAt",
        }
    }

    pub fn from_param(value: &str) -> Result<Self, DomainError> {
        match value {
            "rank" => Ok(SortField::Rank),
            "views" => Ok(SortField::Views),
            "likes" => Ok(SortField::Likes),
            "comments" => Ok(SortField::Comments),
            "subscribers" => Ok(SortField::Subscribers),
            "ratio" => Ok(SortField::Ratio),
            "publishedAt" | "published_at" => Ok(SortField::PublishedAt),
            other => Err(DomainError::unknown_variant("sortBy", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// Rank reads ascending by convention; every other column is a
    /// leaderboard and defaults to descending.
    pub fn default_for(field: SortField) -> Self {
        match field {
            SortField::Rank => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn from_param(value: &str) -> Result<Self, DomainError> {
        match value {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DomainError::unknown_variant("order", other)),
        }
    }
}

/// The unit of atomic snapshot replacement and of failure isolation in the
/// collector: one (region, category, content-type) cell of the key space.
/// `category_id: None` is the "all categories" partition, not a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub region_code: String,
    pub category_id: Option<String>,
    pub content_type: ContentType,
}

impl PartitionKey {
    pub fn new(
        region_code: impl Into<String>,
        category_id: Option<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            region_code: region_code.into(),
            category_id,
            content_type,
        }
    }

    /// Human-readable partition label used in logs and failure reports,
    /// e.g. `KR/10/short` or `GLOBAL/all/long`.
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.region_code,
            self.category_id.as_deref().unwrap_or("all"),
            self.content_type.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_accepts_legacy_param_spellings() {
        assert_eq!(ContentType::from_param("shorts").unwrap(), ContentType::Short);
        assert_eq!(ContentType::from_param("videos").unwrap(), ContentType::Long);
        assert_eq!(ContentType::from_param("short").unwrap(), ContentType::Short);
        assert!(ContentType::from_param("reels").is_err());
    }

    #[test]
    fn period_parses_both_year_end_spellings() {
        assert_eq!(Period::from_param("yearEnd").unwrap(), Period::YearEnd);
        assert_eq!(Period::from_param("year_end").unwrap(), Period::YearEnd);
        assert_eq!(Period::from_param("all").unwrap(), Period::All);
    }

    #[test]
    fn sort_order_defaults_ascending_only_for_rank() {
        assert_eq!(SortOrder::default_for(SortField::Rank), SortOrder::Asc);
        assert_eq!(SortOrder::default_for(SortField::Views), SortOrder::Desc);
        assert_eq!(SortOrder::default_for(SortField::Ratio), SortOrder::Desc);
    }

    #[test]
    fn partition_label_uses_all_sentinel_for_missing_category() {
        let with = PartitionKey::new("KR", Some("10".into()), ContentType::Short);
        let without = PartitionKey::new("GLOBAL", None, ContentType::Long);
        assert_eq!(with.label(), "KR/10/short");
        assert_eq!(without.label(), "GLOBAL/all/long");
    }
}
