//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::hooks::EdenQueryConfig;
use crate::link::{BatchLinkOptions, DEFAULT_MAX_BATCH_SIZE};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "eden";
const ENV_PREFIX: &str = "EDEN";
const DEFAULT_DOMAIN: &str = "http://localhost:3000";
const DEFAULT_ENDPOINT: &str = "/batch";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_LIMIT: usize = 500;

/// Configuration flags shared by every binary that talks to an endpoint.
#[derive(Debug, Args, Default, Clone)]
pub struct ConfigArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "EDEN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ConfigOverrides {
    /// Override the server origin, e.g. `http://localhost:3000`.
    #[arg(long = "domain", value_name = "URL")]
    pub domain: Option<String>,

    /// Override the batch endpoint path.
    #[arg(long = "endpoint", value_name = "PATH")]
    pub endpoint: Option<String>,

    /// Toggle request batching.
    #[arg(
        long = "batching",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub batching: Option<bool>,

    /// Override the maximum number of calls per batch.
    #[arg(long = "max-batch-size", value_name = "COUNT")]
    pub max_batch_size: Option<usize>,

    /// Override how long a batch window stays open, in milliseconds.
    #[arg(long = "batch-wait-ms", value_name = "MS")]
    pub batch_wait_ms: Option<u64>,

    /// Override the HTTP request timeout. Zero disables it.
    #[arg(long = "timeout-seconds", value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

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
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub link: LinkSettings,
    pub query: QuerySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// `{domain}{endpoint}`.
    pub url: Url,
    pub batching: bool,
    pub max_batch_size: NonZeroUsize,
    pub batch_wait: Duration,
    pub timeout: Option<Duration>,
}

impl LinkSettings {
    pub fn batch_options(&self) -> BatchLinkOptions {
        let options = BatchLinkOptions::with_url(self.url.clone())
            .max_batch_size(self.max_batch_size)
            .batch_wait(self.batch_wait);
        match self.timeout {
            Some(timeout) => options.timeout(timeout),
            None => options,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub abort_on_unmount: bool,
    pub stale_time: Duration,
    pub cache_limit: NonZeroUsize,
}

impl QuerySettings {
    pub fn eden_config(&self) -> EdenQueryConfig {
        EdenQueryConfig {
            abort_on_unmount: self.abort_on_unmount,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Compact,
    Json,
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
pub fn load(args: &ConfigArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = args.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&args.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    link: RawLinkSettings,
    query: RawQuerySettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(domain) = overrides.domain.as_ref() {
            self.link.domain = Some(domain.clone());
        }
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.link.endpoint = Some(endpoint.clone());
        }
        if let Some(batching) = overrides.batching {
            self.link.batching = Some(batching);
        }
        if let Some(size) = overrides.max_batch_size {
            self.link.max_batch_size = Some(size);
        }
        if let Some(wait) = overrides.batch_wait_ms {
            self.link.batch_wait_ms = Some(wait);
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.link.timeout_secs = Some(timeout);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            link,
            query,
            logging,
        } = raw;

        let link = build_link_settings(link)?;
        let query = build_query_settings(query)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            link,
            query,
            logging,
        })
    }
}

fn build_link_settings(link: RawLinkSettings) -> Result<LinkSettings, LoadError> {
    let domain = link.domain.unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
    let endpoint = link.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    if !endpoint.starts_with('/') {
        return Err(LoadError::invalid(
            "link.endpoint",
            "endpoint must start with `/`",
        ));
    }

    let url = BatchLinkOptions::new(domain.trim(), &endpoint)
        .map(|options| options.url)
        .map_err(|err| LoadError::invalid("link.domain", format!("invalid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "link.domain",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    let max_batch_size = match link.max_batch_size {
        Some(size) => NonZeroUsize::new(size).ok_or_else(|| {
            LoadError::invalid("link.max_batch_size", "must be greater than zero")
        })?,
        None => DEFAULT_MAX_BATCH_SIZE,
    };

    let batch_wait = Duration::from_millis(link.batch_wait_ms.unwrap_or(0));
    let timeout = match link.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(LinkSettings {
        url,
        batching: link.batching.unwrap_or(true),
        max_batch_size,
        batch_wait,
        timeout,
    })
}

fn build_query_settings(query: RawQuerySettings) -> Result<QuerySettings, LoadError> {
    let cache_limit = NonZeroUsize::new(query.cache_limit.unwrap_or(DEFAULT_CACHE_LIMIT))
        .ok_or_else(|| LoadError::invalid("query.cache_limit", "must be greater than zero"))?;

    Ok(QuerySettings {
        abort_on_unmount: query.abort_on_unmount.unwrap_or(false),
        stale_time: Duration::from_millis(query.stale_time_ms.unwrap_or(0)),
        cache_limit,
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

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLinkSettings {
    domain: Option<String>,
    endpoint: Option<String>,
    batching: Option<bool>,
    max_batch_size: Option<usize>,
    batch_wait_ms: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuerySettings {
    abort_on_unmount: Option<bool>,
    stale_time_ms: Option<u64>,
    cache_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}
