//! Layered configuration: CLI flags over environment variables over the
//! config file over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use diaglog_store::{Environment, StoreConfig};

pub const ENV_ENVIRONMENT: &str = "DIAGLOG_ENV";
pub const ENV_ENDPOINT: &str = "DIAGLOG_ENDPOINT";
pub const ENV_MAX_LOGS: &str = "DIAGLOG_MAX_LOGS";

/// Contents of the TOML config file
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub max_logs: Option<usize>,
    #[serde(default)]
    pub remote_endpoint: Option<String>,
    #[serde(default)]
    pub console: Option<bool>,
    #[serde(default)]
    pub remote: Option<bool>,
    /// Unset means no timeout
    #[serde(default)]
    pub remote_timeout_ms: Option<u64>,
    #[serde(default)]
    pub capture_traces: Option<bool>,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Values taken from `DIAGLOG_*` environment variables
#[derive(Debug, Default, PartialEq)]
pub struct EnvConfig {
    pub environment: Option<Environment>,
    pub remote_endpoint: Option<String>,
    pub max_logs: Option<usize>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the variables through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = get(ENV_ENVIRONMENT)
            .map(|v| parse_environment(&v).with_context(|| format!("Invalid {}", ENV_ENVIRONMENT)))
            .transpose()?;

        let max_logs = get(ENV_MAX_LOGS)
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {}: {:?}", ENV_MAX_LOGS, v))
            })
            .transpose()?;

        Ok(Self {
            environment,
            remote_endpoint: get(ENV_ENDPOINT),
            max_logs,
        })
    }
}

/// Values given on the command line
#[derive(Debug, Default, PartialEq)]
pub struct CliConfig {
    pub environment: Option<Environment>,
    pub max_logs: Option<usize>,
    pub remote_endpoint: Option<String>,
    pub export_dir: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, PartialEq)]
pub struct Settings {
    pub store: StoreConfig,
    pub export_dir: PathBuf,
}

impl Settings {
    pub fn resolve(file: FileConfig, env: EnvConfig, cli: CliConfig) -> Self {
        let defaults = StoreConfig::default();

        let store = StoreConfig {
            max_logs: cli
                .max_logs
                .or(env.max_logs)
                .or(file.max_logs)
                .unwrap_or(defaults.max_logs),
            environment: cli
                .environment
                .or(env.environment)
                .or(file.environment)
                .unwrap_or(defaults.environment),
            console: file.console,
            remote: file.remote,
            remote_endpoint: cli
                .remote_endpoint
                .or(env.remote_endpoint)
                .or(file.remote_endpoint)
                .unwrap_or(defaults.remote_endpoint),
            remote_timeout: file.remote_timeout_ms.map(Duration::from_millis),
            capture_traces: file.capture_traces.unwrap_or(defaults.capture_traces),
        };

        let export_dir = cli
            .export_dir
            .or(file.export_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self { store, export_dir }
    }
}

/// Parse an environment name for clap and the env layer
pub fn parse_environment(s: &str) -> Result<Environment> {
    match Environment::parse(s) {
        Some(env) => Ok(env),
        None => bail!("unknown environment {:?} (expected development or production)", s),
    }
}
