//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "specchio";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_STREAM_NAME: &str = "transactions";
const DEFAULT_GROUP: &str = "specchio";
const DEFAULT_READ_BATCH: usize = 16;
const DEFAULT_LANGUAGES: [&str; 2] = ["en", "nl"];

/// Command-line arguments for the Specchio binary.
#[derive(Debug, Parser)]
#[command(name = "specchio", version, about = "Specchio rendering cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SPECCHIO_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the invalidation worker.
    Serve(Box<ServeArgs>),
    /// Flatten a deep document into storage shape.
    #[command(name = "flatten")]
    Flatten(FlattenArgs),
    /// Convert a hextuple document into storage shape.
    #[command(name = "ingest")]
    Ingest(IngestArgs),
    /// Append a mutation message to the stream.
    #[command(name = "emit")]
    Emit(EmitArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct RedisOverride {
    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub redis: RedisOverride,

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

    /// Override the mutation stream name.
    #[arg(long = "cache-stream", value_name = "NAME")]
    pub cache_stream: Option<String>,

    /// Override the consumer group name.
    #[arg(long = "cache-group", value_name = "NAME")]
    pub cache_group: Option<String>,

    /// Override this replica's consumer name.
    #[arg(long = "cache-consumer", value_name = "NAME")]
    pub cache_consumer: Option<String>,

    /// Override the rendered languages (comma-separated).
    #[arg(
        long = "cache-languages",
        value_name = "LANGS",
        value_delimiter = ','
    )]
    pub cache_languages: Option<Vec<String>>,

    /// Override the maximum messages per stream read.
    #[arg(long = "cache-read-batch", value_name = "COUNT")]
    pub cache_read_batch: Option<usize>,

    /// Override the rendered-entry time-to-live in seconds.
    #[arg(long = "cache-entry-ttl-seconds", value_name = "SECONDS")]
    pub cache_entry_ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct FlattenArgs {
    /// Path to the deep JSON document to flatten.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Write the flat document here instead of standard output.
    #[arg(long = "output", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct IngestArgs {
    /// Path to the newline-delimited hextuple document.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Write the flat document here instead of standard output.
    #[arg(long = "output", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct EmitArgs {
    #[command(flatten)]
    pub redis: RedisOverride,

    /// IRI of the mutated resource.
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    /// Operation kind (Created|Updated|Converted|Moved|Published|Unpublished|Deleted).
    #[arg(long = "kind", value_name = "KIND", default_value = "Updated")]
    pub kind: String,

    /// Class of the mutated resource.
    #[arg(long = "resource-type", value_name = "IRI")]
    pub resource_type: Option<String>,

    /// Override the mutation stream name.
    #[arg(long = "cache-stream", value_name = "NAME")]
    pub cache_stream: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
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
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub stream_name: String,
    pub group: String,
    /// Consumer name; a unique per-replica name is generated when absent.
    pub consumer: Option<String>,
    pub languages: Vec<String>,
    pub read_batch: NonZeroUsize,
    pub entry_ttl_seconds: Option<NonZeroU64>,
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

    builder = builder.add_source(Environment::with_prefix("SPECCHIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Emit(args)) => raw.apply_emit_overrides(args),
        Some(Command::Flatten(_)) | Some(Command::Ingest(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.redis.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(stream) = overrides.cache_stream.as_ref() {
            self.cache.stream_name = Some(stream.clone());
        }
        if let Some(group) = overrides.cache_group.as_ref() {
            self.cache.group = Some(group.clone());
        }
        if let Some(consumer) = overrides.cache_consumer.as_ref() {
            self.cache.consumer = Some(consumer.clone());
        }
        if let Some(languages) = overrides.cache_languages.as_ref() {
            self.cache.languages = Some(languages.clone());
        }
        if let Some(batch) = overrides.cache_read_batch {
            self.cache.read_batch = Some(batch);
        }
        if let Some(ttl) = overrides.cache_entry_ttl_seconds {
            self.cache.entry_ttl_seconds = Some(ttl);
        }
    }

    fn apply_emit_overrides(&mut self, args: &EmitArgs) {
        if let Some(url) = args.redis.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(stream) = args.cache_stream.as_ref() {
            self.cache.stream_name = Some(stream.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            redis,
            cache,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let redis = build_redis_settings(redis)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            logging,
            redis,
            cache,
        })
    }
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

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let url = redis.url.unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if url.trim().is_empty() {
        return Err(LoadError::invalid("redis.url", "url must not be empty"));
    }

    Ok(RedisSettings { url })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let stream_name = cache
        .stream_name
        .unwrap_or_else(|| DEFAULT_STREAM_NAME.to_string());
    if stream_name.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.stream_name",
            "stream name must not be empty",
        ));
    }

    let group = cache.group.unwrap_or_else(|| DEFAULT_GROUP.to_string());
    if group.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.group",
            "group name must not be empty",
        ));
    }

    let consumer = cache.consumer.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let languages = cache
        .languages
        .unwrap_or_else(|| DEFAULT_LANGUAGES.map(str::to_string).to_vec());
    if languages.is_empty() {
        return Err(LoadError::invalid(
            "cache.languages",
            "at least one language is required",
        ));
    }
    for language in &languages {
        if language.len() < 2 {
            return Err(LoadError::invalid(
                "cache.languages",
                format!("`{language}` is not a language tag"),
            ));
        }
    }

    let read_batch_value = cache.read_batch.unwrap_or(DEFAULT_READ_BATCH);
    let read_batch = NonZeroUsize::new(read_batch_value)
        .ok_or_else(|| LoadError::invalid("cache.read_batch", "must be greater than zero"))?;

    let entry_ttl_seconds = match cache.entry_ttl_seconds {
        Some(seconds) => Some(
            NonZeroU64::new(seconds).ok_or_else(|| {
                LoadError::invalid("cache.entry_ttl_seconds", "must be greater than zero")
            })?,
        ),
        None => None,
    };

    Ok(CacheSettings {
        stream_name,
        group,
        consumer,
        languages,
        read_batch,
        entry_ttl_seconds,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    stream_name: Option<String>,
    group: Option<String>,
    consumer: Option<String>,
    languages: Option<Vec<String>>,
    read_batch: Option<usize>,
    entry_ttl_seconds: Option<u64>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
