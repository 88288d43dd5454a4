//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::Query;
use crate::resource::{ResourceKind, ResourceRegistry};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "wpqc";
const ENV_PREFIX: &str = "WPQC";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the `wpqc` binary.
#[derive(Debug, Parser)]
#[command(
    name = "wpqc",
    version,
    about = "Fetch WordPress REST resources through the normalized query cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WPQC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SiteOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SiteOverrides {
    /// Override the site endpoint URL.
    #[arg(long = "endpoint", global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Override the bearer token sent with every request.
    #[arg(long = "auth-token", global = true, env = "WPQC_AUTH_TOKEN", value_name = "TOKEN")]
    pub auth_token: Option<String>,

    /// Override the request timeout.
    #[arg(long = "timeout-seconds", global = true, value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        global = true,
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Fetch a collection and print the cached records for the query.
    List(ListArgs),
    /// Fetch a single record by slug and print it.
    Get(GetArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Resource kind (e.g. `events`, `users`).
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    /// Query parameter; JSON values are parsed, anything else is a string.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,
}

impl ListArgs {
    pub fn query(&self) -> Query {
        self.params.iter().cloned().collect()
    }
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    /// Resource kind (e.g. `events`, `users`).
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    /// Slug of the record.
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub site: SiteSettings,
    pub logging: LoggingSettings,
    pub resources: ResourceRegistry,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub endpoint: Url,
    pub auth_token: Option<String>,
    pub timeout: Duration,
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

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    site: RawSiteSettings,
    logging: RawLoggingSettings,
    resources: BTreeMap<String, RawResourceSettings>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SiteOverrides) {
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.site.endpoint = Some(endpoint.clone());
        }
        if let Some(token) = overrides.auth_token.as_ref() {
            self.site.auth_token = Some(token.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.site.timeout_seconds = Some(seconds);
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
            site,
            logging,
            resources,
        } = raw;

        Ok(Self {
            site: build_site_settings(site)?,
            logging: build_logging_settings(logging)?,
            resources: build_resource_registry(resources)?,
        })
    }
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_endpoint = site
        .endpoint
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid("site.endpoint", "an endpoint URL is required"))?;

    let mut endpoint = Url::parse(&raw_endpoint)
        .map_err(|err| LoadError::invalid("site.endpoint", format!("failed to parse: {err}")))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "site.endpoint",
            format!("unsupported scheme `{}`", endpoint.scheme()),
        ));
    }
    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }

    let auth_token = site.auth_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_secs = site.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "site.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SiteSettings {
        endpoint,
        auth_token,
        timeout: Duration::from_secs(timeout_secs),
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

fn build_resource_registry(
    resources: BTreeMap<String, RawResourceSettings>,
) -> Result<ResourceRegistry, LoadError> {
    let mut registry = ResourceRegistry::builtin();

    for (name, raw) in resources {
        let builtin = registry.get(&name);

        let path = match (raw.path, builtin.as_deref()) {
            (Some(path), _) => path.trim().to_string(),
            (None, Some(kind)) => kind.path().to_string(),
            (None, None) => String::new(),
        };
        if path.is_empty() {
            return Err(LoadError::invalid(
                format!("resources.{name}.path"),
                "a REST path is required for custom resources",
            ));
        }

        let defaults = match (raw.defaults, builtin.as_deref()) {
            (Some(defaults), _) => defaults,
            (None, Some(kind)) => kind.defaults().clone(),
            (None, None) => Query::new(),
        };

        let shape = builtin
            .as_deref()
            .map(|kind| kind.shape().clone())
            .unwrap_or_default();

        registry.insert(ResourceKind::new(name, path, defaults).with_shape(shape));
    }

    Ok(registry)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    endpoint: Option<String>,
    auth_token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResourceSettings {
    path: Option<String>,
    defaults: Option<Query>,
}
