use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{
    ChannelActivity, ChannelAggregate, RegionScope, RepoError, SnapshotsRepo,
};
use crate::domain::catalog::TrendingSnapshot;
use crate::domain::period::PublishedWindow;
use crate::domain::types::{ContentType, PartitionKey};

use super::{PostgresRepositories, map_sqlx_error};

const SNAPSHOT_COLUMNS: &str = "video_id, content_type, title, description, thumbnail_url, \
    published_at, duration, view_count, like_count, comment_count, engagement_rate, channel_id, \
    channel_title, channel_thumbnail_url, subscriber_count, video_count, region_code, \
    category_id, rank, collected_at";

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    video_id: String,
    content_type: ContentType,
    title: String,
    description: String,
    thumbnail_url: String,
    published_at: OffsetDateTime,
    duration: String,
    view_count: i64,
    like_count: i64,
    comment_count: i64,
    engagement_rate: f64,
    channel_id: String,
    channel_title: String,
    channel_thumbnail_url: Option<String>,
    subscriber_count: i64,
    video_count: i64,
    region_code: String,
    category_id: Option<String>,
    rank: i32,
    collected_at: OffsetDateTime,
}

impl From<SnapshotRow> for TrendingSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            video_id: row.video_id,
            content_type: row.content_type,
            title: row.title,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            published_at: row.published_at,
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
            region_code: row.region_code,
            category_id: row.category_id,
            rank: row.rank,
            collected_at: row.collected_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    channel_id: String,
    channel_title: String,
    channel_thumbnail_url: Option<String>,
    subscriber_count: i64,
    video_count: i64,
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    channel_id: String,
    trending_count: i64,
}

fn apply_partition_key<'q>(qb: &mut QueryBuilder<'q, Postgres>, key: &'q PartitionKey) {
    qb.push(" AND region_code = ");
    qb.push_bind(&key.region_code);
    match key.category_id.as_ref() {
        Some(category) => {
            qb.push(" AND category_id = ");
            qb.push_bind(category);
        }
        None => {
            qb.push(" AND category_id IS NULL ");
        }
    }
    qb.push(" AND content_type = ");
    qb.push_bind(key.content_type);
}

fn apply_window<'q>(qb: &mut QueryBuilder<'q, Postgres>, window: &PublishedWindow) {
    if let Some(start) = window.start {
        qb.push(" AND published_at >= ");
        qb.push_bind(start);
    }
    if let Some(end) = window.end {
        qb.push(" AND published_at < ");
        qb.push_bind(end);
    }
}

fn apply_scope<'q>(qb: &mut QueryBuilder<'q, Postgres>, scope: &'q RegionScope) {
    qb.push(" AND region_code = ");
    qb.push_bind(&scope.region_code);
    qb.push(" AND content_type = ");
    qb.push_bind(scope.content_type);
    apply_window(qb, &scope.window);
}

/// Builds a query over each video's most recent row within the scope.
/// Scope reads span every category partition of a region, so the same
/// video can appear under `all` and under its own category; rankings must
/// see it once. Callers append their ORDER BY and LIMIT.
fn latest_per_video<'q>(scope: &'q RegionScope) -> QueryBuilder<'q, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(SNAPSHOT_COLUMNS);
    qb.push(" FROM (SELECT DISTINCT ON (video_id) ");
    qb.push(SNAPSHOT_COLUMNS);
    qb.push(" FROM trending_snapshots WHERE 1=1 ");
    apply_scope(&mut qb, scope);
    qb.push(" ORDER BY video_id, collected_at DESC) AS latest ");
    qb
}

#[async_trait]
impl SnapshotsRepo for PostgresRepositories {
    async fn replace_partition(
        &self,
        key: &PartitionKey,
        rows: &[TrendingSnapshot],
    ) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let mut delete = QueryBuilder::new("DELETE FROM trending_snapshots WHERE 1=1 ");
        apply_partition_key(&mut delete, key);
        delete
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !rows.is_empty() {
            let mut insert = QueryBuilder::new("INSERT INTO trending_snapshots (");
            insert.push(SNAPSHOT_COLUMNS);
            insert.push(") ");
            insert.push_values(rows, |mut b, row| {
                b.push_bind(&row.video_id)
                    .push_bind(row.content_type)
                    .push_bind(&row.title)
                    .push_bind(&row.description)
                    .push_bind(&row.thumbnail_url)
                    .push_bind(row.published_at)
                    .push_bind(&row.duration)
                    .push_bind(row.view_count)
                    .push_bind(row.like_count)
                    .push_bind(row.comment_count)
                    .push_bind(row.engagement_rate)
                    .push_bind(&row.channel_id)
                    .push_bind(&row.channel_title)
                    .push_bind(row.channel_thumbnail_url.as_deref())
                    .push_bind(row.subscriber_count)
                    .push_bind(row.video_count)
                    .push_bind(&row.region_code)
                    .push_bind(row.category_id.as_deref())
                    .push_bind(row.rank)
                    .push_bind(row.collected_at);
            });
            insert
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_partition(
        &self,
        key: &PartitionKey,
        window: &PublishedWindow,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SNAPSHOT_COLUMNS);
        qb.push(" FROM trending_snapshots WHERE 1=1 ");
        apply_partition_key(&mut qb, key);
        apply_window(&mut qb, window);
        qb.push(" ORDER BY rank ASC ");

        let rows: Vec<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TrendingSnapshot::from).collect())
    }

    async fn top_by_views(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut qb = latest_per_video(scope);
        qb.push(" ORDER BY view_count DESC LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TrendingSnapshot::from).collect())
    }

    async fn top_by_engagement(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut qb = latest_per_video(scope);
        qb.push(" ORDER BY engagement_rate DESC LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TrendingSnapshot::from).collect())
    }

    async fn list_scope(&self, scope: &RegionScope) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut qb = latest_per_video(scope);
        qb.push(" ORDER BY rank ASC ");

        let rows: Vec<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TrendingSnapshot::from).collect())
    }

    async fn top_channels(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelAggregate>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT channel_id, channel_title, channel_thumbnail_url, subscriber_count, \
             video_count FROM (SELECT DISTINCT ON (channel_id) channel_id, channel_title, \
             channel_thumbnail_url, subscriber_count, video_count FROM trending_snapshots \
             WHERE 1=1 ",
        );
        apply_scope(&mut qb, scope);
        qb.push(" ORDER BY channel_id, collected_at DESC) AS latest ");
        qb.push(" ORDER BY subscriber_count DESC LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<ChannelRow> = qb
            .build_query_as::<ChannelRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ChannelAggregate {
                channel_id: row.channel_id,
                channel_title: row.channel_title,
                channel_thumbnail_url: row.channel_thumbnail_url,
                subscriber_count: row.subscriber_count,
                video_count: row.video_count,
            })
            .collect())
    }

    async fn channel_activity(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<ChannelActivity>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT channel_id, COUNT(DISTINCT video_id) AS trending_count \
             FROM trending_snapshots WHERE 1=1 ",
        );
        apply_scope(&mut qb, scope);
        qb.push(" GROUP BY channel_id ORDER BY trending_count DESC LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<ActivityRow> = qb
            .build_query_as::<ActivityRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ChannelActivity {
                channel_id: row.channel_id,
                trending_count: row.trending_count,
            })
            .collect())
    }

    async fn find_channel_row(
        &self,
        channel_id: &str,
    ) -> Result<Option<TrendingSnapshot>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SNAPSHOT_COLUMNS);
        qb.push(" FROM trending_snapshots WHERE channel_id = ");
        qb.push_bind(channel_id);
        qb.push(" ORDER BY collected_at DESC LIMIT 1 ");

        let row: Option<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TrendingSnapshot::from))
    }

    async fn latest_collected(
        &self,
        scope: &RegionScope,
        limit: i64,
    ) -> Result<Vec<TrendingSnapshot>, RepoError> {
        let mut qb = latest_per_video(scope);
        qb.push(" ORDER BY collected_at DESC, published_at DESC LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<SnapshotRow> = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TrendingSnapshot::from).collect())
    }
}
