//! Batch snapshot refresh over the full partition key space.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use apalis::prelude::Data;
use apalis_cron::Schedule;
use futures::{StreamExt, stream};
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::repos::{RepoError, SnapshotsRepo};
use crate::application::source::{CatalogSource, SourceError, TrendingRequest};
use crate::domain::catalog::{TrendingSnapshot, partition_space};
use crate::domain::types::PartitionKey;
use crate::util::datetime::rfc3339;

pub const METRIC_COLLECT_PARTITION_FAIL_TOTAL: &str = "marea_collect_partition_fail_total";
pub const METRIC_COLLECT_RUN_MS: &str = "marea_collect_run_ms";

const REPORTED_ERRORS_LIMIT: usize = 10;

/// Marker struct for the cron-triggered collection job, constructed from
/// the cron tick timestamp.
#[derive(Default, Debug, Clone)]
pub struct CollectTrendingJob;

impl From<chrono::DateTime<chrono::Utc>> for CollectTrendingJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Tunables of one collection run.
#[derive(Debug, Clone)]
pub struct CollectorRunSettings {
    pub regions: Vec<String>,
    pub category_ids: Vec<String>,
    /// Ranked items to assemble per partition.
    pub partition_target: u32,
    /// Partitions processed concurrently; bounds upstream pressure.
    pub concurrency: usize,
}

/// Context for the collection job worker.
#[derive(Clone)]
pub struct CollectorContext {
    pub snapshots: Arc<dyn SnapshotsRepo>,
    pub source: Arc<dyn CatalogSource>,
    pub settings: CollectorRunSettings,
}

/// Run summary returned by the batch endpoint and logged by the cron
/// worker. Partition failures leave `success` true; they are reported,
/// not fatal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub success: bool,
    pub total_collected: usize,
    pub total_errors: usize,
    pub errors: Vec<String>,
    pub collected_at: String,
    pub duration_ms: u64,
    pub duration_minutes: String,
}

#[derive(Debug, Error)]
enum PartitionError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Collects every partition once and replaces its stored rows. One shared
/// `collected_at` stamp is captured at run start so all partitions of a
/// run form a single point-in-time snapshot. A failed partition is
/// counted and skipped; it keeps its previous rows until the next run.
pub async fn run_collection(ctx: &CollectorContext) -> CollectionReport {
    let started = Instant::now();
    let collected_at = OffsetDateTime::now_utc();
    let partitions = partition_space(&ctx.settings.regions, &ctx.settings.category_ids);
    info!(
        target: "marea::collector",
        partitions = partitions.len(),
        concurrency = ctx.settings.concurrency,
        "starting trending collection run"
    );

    let concurrency = ctx.settings.concurrency.max(1);
    let outcomes = stream::iter(partitions)
        .map(|key| {
            let ctx = ctx.clone();
            async move {
                let outcome = collect_partition(&ctx, &key, collected_at).await;
                (key, outcome)
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

    let mut total_collected = 0usize;
    let mut errors = Vec::new();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(count) => total_collected += count,
            Err(error) => {
                counter!(METRIC_COLLECT_PARTITION_FAIL_TOTAL).increment(1);
                warn!(
                    target: "marea::collector",
                    partition = %key.label(),
                    %error,
                    "partition collection failed"
                );
                errors.push(format!("failed to collect {}: {error}", key.label()));
            }
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    histogram!(METRIC_COLLECT_RUN_MS).record(duration_ms as f64);
    let total_errors = errors.len();
    errors.truncate(REPORTED_ERRORS_LIMIT);
    info!(
        target: "marea::collector",
        total_collected,
        total_errors,
        duration_ms,
        "trending collection run finished"
    );

    CollectionReport {
        success: true,
        total_collected,
        total_errors,
        errors,
        collected_at: rfc3339(collected_at),
        duration_ms,
        duration_minutes: format!("{:.2}", duration_ms as f64 / 60_000.0),
    }
}

async fn collect_partition(
    ctx: &CollectorContext,
    key: &PartitionKey,
    collected_at: OffsetDateTime,
) -> Result<usize, PartitionError> {
    let batch = ctx
        .source
        .trending(&TrendingRequest {
            region_code: key.region_code.clone(),
            category_id: key.category_id.clone(),
            content_type: key.content_type,
            target_count: ctx.settings.partition_target,
            page_token: None,
        })
        .await?;
    let rows: Vec<TrendingSnapshot> = batch
        .items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            TrendingSnapshot::from_catalog(item, key, index as i32 + 1, collected_at)
        })
        .collect();
    ctx.snapshots.replace_partition(key, &rows).await?;
    Ok(rows.len())
}

/// Process the collection job fired by the cron stream.
pub async fn process_collect_trending_job(
    _job: CollectTrendingJob,
    ctx: Data<CollectorContext>,
) -> Result<(), apalis::prelude::Error> {
    let report = run_collection(&ctx).await;
    if report.total_errors > 0 {
        tracing::warn!(
            total_errors = report.total_errors,
            total_collected = report.total_collected,
            "Trending collection completed with partition failures"
        );
    } else {
        tracing::info!(
            total_collected = report.total_collected,
            "Trending collection completed"
        );
    }
    Ok(())
}

/// Create the cron schedule for trending collection.
/// Runs every 3 hours on the hour: "0 0 */3 * * *"
pub fn collect_trending_schedule() -> Schedule {
    Schedule::from_str("0 0 */3 * * *").expect("Invalid cron expression for collect_trending")
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn schedule_fires_on_the_hour_every_three_hours() {
        let schedule = collect_trending_schedule();
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
        for tick in &upcoming {
            assert_eq!(tick.minute(), 0, "tick not on the hour: {tick}");
            assert_eq!(tick.second(), 0, "tick not on the hour: {tick}");
            assert_eq!(tick.hour() % 3, 0, "tick off the 3-hour grid: {tick}");
        }
    }
}
