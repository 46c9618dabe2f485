use std::{process, sync::Arc, time::Duration};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use marea::{
    application::{
        cache::CacheGateway,
        channels::ChannelService,
        error::AppError,
        jobs::{
            CollectorContext, CollectorRunSettings, collect_trending_schedule,
            process_collect_trending_job, run_collection,
        },
        rankings::RankingsService,
        repos::{HealthRepo, SnapshotsRepo},
        source::CatalogSource,
        trending::TrendingService,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{ApiState, build_router},
        redis::RedisBackend,
        telemetry,
        upstream::HttpCatalogSource,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Collect(_) => run_collect(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings).await?;

    let monitor_handle = if settings.collector.cron_enabled {
        Some(spawn_collect_monitor(app.collector.as_ref().clone()))
    } else {
        info!(target = "marea::main", "cron collector disabled by configuration");
        None
    };

    let result = serve_http(&settings, app).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_collect(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let snapshots: Arc<dyn SnapshotsRepo> = repositories.clone();
    let source = build_catalog_source(&settings)?;

    let context = CollectorContext {
        snapshots,
        source,
        settings: collector_run_settings(&settings),
    };

    let report = run_collection(&context).await;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");

    if report.total_collected == 0 && report.total_errors > 0 {
        return Err(AppError::unexpected(
            "collection produced no rows; every partition failed",
        ));
    }
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_catalog_source(settings: &config::Settings) -> Result<Arc<dyn CatalogSource>, AppError> {
    if settings.upstream.api_key.trim().is_empty() {
        return Err(AppError::from(InfraError::configuration(
            "upstream api key is not configured",
        )));
    }
    let source = HttpCatalogSource::new(&settings.upstream).map_err(AppError::from)?;
    Ok(Arc::new(source))
}

/// Connects the cache backend when configured. A connection failure only
/// disables caching; reads fall through to their producers.
async fn build_cache_gateway(settings: &config::Settings) -> CacheGateway {
    let Some(url) = settings.cache.url.as_ref() else {
        info!(target = "marea::main", "no cache url configured; caching disabled");
        return CacheGateway::new(None, settings.cache.key_prefix.clone());
    };

    match RedisBackend::connect(url).await {
        Ok(backend) => CacheGateway::new(Some(Arc::new(backend)), settings.cache.key_prefix.clone()),
        Err(error) => {
            warn!(
                target = "marea::main",
                %error,
                "cache backend unreachable at startup; caching disabled"
            );
            CacheGateway::new(None, settings.cache.key_prefix.clone())
        }
    }
}

fn collector_run_settings(settings: &config::Settings) -> CollectorRunSettings {
    CollectorRunSettings {
        regions: settings.collector.regions.clone(),
        category_ids: settings.collector.category_ids.clone(),
        partition_target: settings.collector.partition_target,
        concurrency: settings.collector.concurrency.get() as usize,
    }
}

struct ApplicationContext {
    api_state: ApiState,
    collector: Arc<CollectorContext>,
}

async fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let snapshots: Arc<dyn SnapshotsRepo> = repositories.clone();
    let health: Arc<dyn HealthRepo> = repositories.clone();
    let source = build_catalog_source(settings)?;
    let cache = build_cache_gateway(settings).await;

    let trending = Arc::new(TrendingService::new(
        snapshots.clone(),
        source.clone(),
        cache.clone(),
        settings.query.reporting_timezone,
        settings.query.feed_target,
    ));
    let channels = Arc::new(ChannelService::new(
        source.clone(),
        cache.clone(),
        settings.query.hidden_gem_threshold,
    ));
    let rankings = Arc::new(RankingsService::new(
        snapshots.clone(),
        cache.clone(),
        settings.query.reporting_timezone,
        settings.query.hidden_gem_threshold,
    ));
    let collector = Arc::new(CollectorContext {
        snapshots,
        source,
        settings: collector_run_settings(settings),
    });

    let api_state = ApiState {
        trending,
        channels,
        rankings,
        collector: collector.clone(),
        cache,
        health,
    };

    Ok(ApplicationContext {
        api_state,
        collector,
    })
}

fn spawn_collect_monitor(context: CollectorContext) -> tokio::task::JoinHandle<()> {
    let worker = WorkerBuilder::new("collect-trending-worker")
        .data(context)
        .backend(CronStream::new(collect_trending_schedule()))
        .build_fn(process_collect_trending_job);

    let monitor = Monitor::new().register(worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "collect monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let router = build_router(app.api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "marea::main", addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
        return;
    }
    info!(target = "marea::main", "shutdown signal received; draining");
    // Bound the drain: anything still open after the grace window is cut.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        process::exit(0);
    });
}
