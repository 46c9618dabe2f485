mod collect;

pub use collect::{
    CollectTrendingJob, CollectionReport, CollectorContext, CollectorRunSettings,
    METRIC_COLLECT_PARTITION_FAIL_TOTAL, METRIC_COLLECT_RUN_MS, collect_trending_schedule,
    process_collect_trending_job, run_collection,
};
