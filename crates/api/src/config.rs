//! Process configuration read from environment variables.

use std::time::Duration;

use relay_jobs::{WorkerConfig, WorkerConfigError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    Invalid { var: &'static str, value: String },
}

impl From<WorkerConfigError> for ConfigError {
    fn from(e: WorkerConfigError) -> Self {
        ConfigError::Invalid {
            var: e.var,
            value: e.value,
        }
    }
}

/// API server configuration.
///
/// | Env Var              | Default     |
/// |----------------------|-------------|
/// | `HOST`               | `0.0.0.0`   |
/// | `PORT`               | `7878`      |
/// | `REDIS_URL`          | unset (in-memory collaborators) |
/// | `EMBEDDED_WORKER`    | `true`      |
/// | `STATUS_TTL_SECS`    | `3600`      |
/// | `SVG_CACHE_TTL_SECS` | `3600`      |
///
/// Worker settings (`WORKER_COUNT`, `WORKER_POLL_MS`, `UNIT_TIMEOUT_SECS`,
/// `JOB_LATENCY_SCALE`) are read by [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub redis_url: Option<String>,
    /// Run workers inside the API process.
    pub embedded_worker: bool,
    pub status_ttl: Duration,
    pub svg_cache_ttl: Duration,
    pub worker: WorkerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7878,
            redis_url: None,
            embedded_worker: true,
            status_ttl: Duration::from_secs(3600),
            svg_cache_ttl: Duration::from_secs(3600),
            worker: WorkerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = parse(&lookup, "PORT")?.unwrap_or(defaults.port);
        let redis_url = lookup("REDIS_URL").filter(|u| !u.trim().is_empty());
        let embedded_worker = match lookup("EMBEDDED_WORKER") {
            None => defaults.embedded_worker,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                var: "EMBEDDED_WORKER",
                value: raw,
            })?,
        };
        let status_ttl = parse(&lookup, "STATUS_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.status_ttl);
        let svg_cache_ttl = parse(&lookup, "SVG_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.svg_cache_ttl);
        let worker = WorkerConfig::from_lookup(&lookup)?;

        Ok(Self {
            host,
            port,
            redis_url,
            embedded_worker,
            status_ttl,
            svg_cache_ttl,
            worker,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
