//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::catalog::{DEFAULT_CATEGORY_IDS, DEFAULT_REGIONS};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "marea";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CACHE_KEY_PREFIX: &str = "marea";
const DEFAULT_UPSTREAM_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_UPSTREAM_PAGE_SIZE: u32 = 50;
const DEFAULT_UPSTREAM_MAX_PAGES: u32 = 10;
const DEFAULT_PARTITION_TARGET: u32 = 50;
const DEFAULT_COLLECTOR_CONCURRENCY: u32 = 4;
const DEFAULT_FEED_TARGET: u32 = 50;
const DEFAULT_HIDDEN_GEM_THRESHOLD: f64 = 2.0;
const DEFAULT_REPORTING_TIMEZONE: &str = "Asia/Seoul";

/// Command-line arguments for the Marea binary.
#[derive(Debug, Parser)]
#[command(name = "marea", version, about = "Marea trending-analytics server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MAREA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Marea HTTP service and cron collector.
    Serve(Box<ServeArgs>),
    /// Run one trending collection pass and exit.
    #[command(name = "collect")]
    Collect(CollectArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub overrides: CollectOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CollectOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the upstream API key.
    #[arg(long = "upstream-api-key", value_name = "KEY")]
    pub upstream_api_key: Option<String>,

    /// Override the number of partitions collected concurrently.
    #[arg(long = "collector-concurrency", value_name = "COUNT")]
    pub collector_concurrency: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub collect: CollectOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the cache connection URL.
    #[arg(long = "cache-url", value_name = "URL")]
    pub cache_url: Option<String>,

    /// Override the upstream API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub upstream: UpstreamSettings,
    pub collector: CollectorSettings,
    pub query: QuerySettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
}

/// Cache connection settings. `url: None` is a valid "caching disabled"
/// deployment, never a startup failure.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    /// Empty means unconfigured; serve and collect refuse to start without it.
    pub api_key: String,
    pub page_size: u32,
    pub max_pages: u32,
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub regions: Vec<String>,
    pub category_ids: Vec<String>,
    pub partition_target: u32,
    pub concurrency: NonZeroU32,
    /// Disables the cron worker; the batch endpoint still works.
    pub cron_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub reporting_timezone: Tz,
    pub hidden_gem_threshold: f64,
    pub feed_target: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("MAREA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Collect(args)) => raw.apply_collect_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    upstream: RawUpstreamSettings,
    collector: RawCollectorSettings,
    query: RawQuerySettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.cache_url.as_ref() {
            self.cache.url = Some(url.clone());
        }
        if let Some(url) = overrides.upstream_base_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }

        self.apply_collect_overrides(&overrides.collect);
    }

    fn apply_collect_overrides(&mut self, overrides: &CollectOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(key) = overrides.upstream_api_key.as_ref() {
            self.upstream.api_key = Some(key.clone());
        }
        if let Some(concurrency) = overrides.collector_concurrency {
            self.collector.concurrency = Some(concurrency);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            upstream,
            collector,
            query,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache),
            upstream: build_upstream_settings(upstream)?,
            collector: build_collector_settings(collector)?,
            query: build_query_settings(query)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    let acquire_secs = database
        .acquire_timeout_seconds
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    if acquire_secs == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout: Duration::from_secs(acquire_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    let url = cache.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let key_prefix = cache
        .key_prefix
        .and_then(|value| {
            let trimmed = value.trim().trim_end_matches(':').to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());

    CacheSettings { url, key_prefix }
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let base_url = upstream
        .base_url
        .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());
    if base_url.trim().is_empty() {
        return Err(LoadError::invalid(
            "upstream.base_url",
            "url must not be empty",
        ));
    }

    // The upstream caps page sizes at 50; asking for more is a client error.
    let page_size = upstream.page_size.unwrap_or(DEFAULT_UPSTREAM_PAGE_SIZE);
    if page_size == 0 || page_size > 50 {
        return Err(LoadError::invalid(
            "upstream.page_size",
            "must be between 1 and 50",
        ));
    }

    let max_pages = upstream.max_pages.unwrap_or(DEFAULT_UPSTREAM_MAX_PAGES);
    if max_pages == 0 {
        return Err(LoadError::invalid(
            "upstream.max_pages",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamSettings {
        base_url,
        api_key: upstream.api_key.unwrap_or_default(),
        page_size,
        max_pages,
    })
}

fn build_collector_settings(
    collector: RawCollectorSettings,
) -> Result<CollectorSettings, LoadError> {
    let regions = match collector.regions {
        Some(regions) if !regions.is_empty() => regions,
        Some(_) => {
            return Err(LoadError::invalid(
                "collector.regions",
                "must list at least one region",
            ));
        }
        None => DEFAULT_REGIONS.iter().map(|code| code.to_string()).collect(),
    };

    let category_ids = collector
        .category_ids
        .unwrap_or_else(|| DEFAULT_CATEGORY_IDS.iter().map(|id| id.to_string()).collect());

    let partition_target = collector.partition_target.unwrap_or(DEFAULT_PARTITION_TARGET);
    if partition_target == 0 {
        return Err(LoadError::invalid(
            "collector.partition_target",
            "must be greater than zero",
        ));
    }

    let concurrency_value = collector
        .concurrency
        .unwrap_or(DEFAULT_COLLECTOR_CONCURRENCY);
    let concurrency = non_zero_u32(concurrency_value.into(), "collector.concurrency")?;

    Ok(CollectorSettings {
        regions,
        category_ids,
        partition_target,
        concurrency,
        cron_enabled: collector.cron_enabled.unwrap_or(true),
    })
}

fn build_query_settings(query: RawQuerySettings) -> Result<QuerySettings, LoadError> {
    let tz_name = query
        .reporting_timezone
        .unwrap_or_else(|| DEFAULT_REPORTING_TIMEZONE.to_string());
    let reporting_timezone = Tz::from_str(&tz_name)
        .map_err(|_| LoadError::invalid("query.reporting_timezone", "unknown timezone"))?;

    let hidden_gem_threshold = query
        .hidden_gem_threshold
        .unwrap_or(DEFAULT_HIDDEN_GEM_THRESHOLD);
    if !hidden_gem_threshold.is_finite() || hidden_gem_threshold <= 0.0 {
        return Err(LoadError::invalid(
            "query.hidden_gem_threshold",
            "must be a positive number",
        ));
    }

    let feed_target = query.feed_target.unwrap_or(DEFAULT_FEED_TARGET);
    if feed_target == 0 {
        return Err(LoadError::invalid(
            "query.feed_target",
            "must be greater than zero",
        ));
    }

    Ok(QuerySettings {
        reporting_timezone,
        hidden_gem_threshold,
        feed_target,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    url: Option<String>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    page_size: Option<u32>,
    max_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCollectorSettings {
    regions: Option<Vec<String>>,
    category_ids: Option<Vec<String>>,
    partition_target: Option<u32>,
    concurrency: Option<u32>,
    cron_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuerySettings {
    reporting_timezone: Option<String>,
    hidden_gem_threshold: Option<f64>,
    feed_target: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn missing_cache_url_means_caching_disabled() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert!(settings.cache.url.is_none());
        assert_eq!(settings.cache.key_prefix, "marea");
    }

    #[test]
    fn blank_cache_url_is_treated_as_absent() {
        let mut raw = RawSettings::default();
        raw.cache.url = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.cache.url.is_none());
    }

    #[test]
    fn default_partition_space_dimensions_survive_resolution() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.collector.regions.len(), 6);
        assert_eq!(settings.collector.category_ids.len(), 14);
        assert_eq!(settings.collector.partition_target, 50);
        assert_eq!(settings.collector.concurrency.get(), 4);
        assert!(settings.collector.cron_enabled);
    }

    #[test]
    fn empty_region_list_is_rejected() {
        let mut raw = RawSettings::default();
        raw.collector.regions = Some(Vec::new());
        let error = Settings::from_raw(raw).expect_err("must fail");
        assert!(matches!(
            error,
            LoadError::Invalid {
                key: "collector.regions",
                ..
            }
        ));
    }

    #[test]
    fn oversized_upstream_page_is_rejected() {
        let mut raw = RawSettings::default();
        raw.upstream.page_size = Some(51);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn unknown_reporting_timezone_is_rejected() {
        let mut raw = RawSettings::default();
        raw.query.reporting_timezone = Some("Mars/Olympus".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn collect_overrides_reach_database_and_collector() {
        let mut raw = RawSettings::default();
        let overrides = CollectOverrides {
            database_url: Some("postgres://localhost/marea".to_string()),
            collector_concurrency: Some(2),
            ..Default::default()
        };
        raw.apply_collect_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://localhost/marea")
        );
        assert_eq!(settings.collector.concurrency.get(), 2);
    }
}
