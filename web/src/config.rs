//! Configuration management for the Walkup server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unlike a plain `unwrap_or(default)`, a variable that is *set* but cannot
//! be parsed is reported as a [`ConfigError`].

use chrono::FixedOffset;
use chrono_tz::Tz;
use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use walkup_core::catalog::Catalog;
use walkup_core::report::{ReportOptions, ReportZone};
use walkup_runtime::StoreConfig;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable is set to a value that cannot be used
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// A variable required by the chosen setup is not set
    #[error("{0} must be set")]
    Missing(&'static str),

    /// The catalog file could not be read or is not a valid catalog
    #[error("Failed to load catalog from {path}: {message}")]
    Catalog {
        /// Catalog file
        path: PathBuf,
        /// Underlying problem
        message: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Where the queue is persisted
    pub storage: StorageConfig,
    /// Queue behaviour
    pub queue: QueueConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Prometheus endpoint address; `None` when `METRICS_PORT=0`
    pub metrics_addr: Option<SocketAddr>,
    /// How long to wait for open connections after a shutdown signal
    pub shutdown_timeout: Duration,
}

/// Persistence backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Single JSON document on disk
    File {
        /// Document path
        path: PathBuf,
    },
    /// `PostgreSQL` key/value table
    Postgres {
        /// Connection URL
        url: String,
        /// Pool size
        max_connections: u32,
    },
}

/// Queue behaviour
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// JSON catalog to use instead of the built-in reference catalog
    pub catalog_file: Option<PathBuf>,
    /// Zone used to bucket tickets by local hour in reports
    pub report_zone: ReportZone,
    /// Earlier calls shown on the display
    pub display_history: usize,
    /// Events buffered per WebSocket subscriber
    pub event_buffer: usize,
}

impl QueueConfig {
    /// Store settings derived from this configuration
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig {
            event_buffer: self.event_buffer,
            display_history: self.display_history,
            report_options: ReportOptions::in_zone(self.report_zone),
        }
    }

    /// Loads the configured catalog, or the reference catalog if none is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Catalog`] if the file cannot be read or does
    /// not describe a valid catalog.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        let Some(path) = &self.catalog_file else {
            return Ok(Catalog::reference());
        };

        let catalog_error = |message: String| ConfigError::Catalog {
            path: path.clone(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| catalog_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| catalog_error(e.to_string()))
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value or
    /// `DATABASE_URL` is missing for `WALKUP_STORAGE=postgres`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metrics_host: IpAddr = parse_or(&lookup, "METRICS_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let metrics_port: u16 = parse_or(&lookup, "METRICS_PORT", 9090)?;

        let server = ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            metrics_addr: (metrics_port != 0).then(|| SocketAddr::new(metrics_host, metrics_port)),
            shutdown_timeout: Duration::from_secs(parse_or(&lookup, "SHUTDOWN_TIMEOUT", 30)?),
        };

        let storage = match lookup("WALKUP_STORAGE").as_deref() {
            None | Some("file") => StorageConfig::File {
                path: lookup("WALKUP_DATA_FILE")
                    .map_or_else(|| PathBuf::from("walkup-data.json"), PathBuf::from),
            },
            Some("postgres") => StorageConfig::Postgres {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "WALKUP_STORAGE",
                    value: other.to_string(),
                    reason: "expected `file` or `postgres`".to_string(),
                });
            }
        };

        let report_tz: Option<Tz> = parse_opt(&lookup, "WALKUP_REPORT_TZ")?;
        let offset_minutes: Option<i32> = parse_opt(&lookup, "WALKUP_REPORT_UTC_OFFSET_MINUTES")?;
        let report_zone = match (report_tz, offset_minutes) {
            (Some(_), Some(minutes)) => {
                return Err(ConfigError::Invalid {
                    var: "WALKUP_REPORT_UTC_OFFSET_MINUTES",
                    value: minutes.to_string(),
                    reason: "cannot be combined with WALKUP_REPORT_TZ".to_string(),
                });
            }
            (Some(tz), None) => ReportZone::Named(tz),
            (None, Some(minutes)) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(ReportZone::Fixed)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "WALKUP_REPORT_UTC_OFFSET_MINUTES",
                    value: minutes.to_string(),
                    reason: "offset must lie within ±24h".to_string(),
                })?,
            (None, None) => ReportZone::Local,
        };

        let queue = QueueConfig {
            catalog_file: lookup("WALKUP_CATALOG_FILE").map(PathBuf::from),
            report_zone,
            display_history: parse_or(&lookup, "WALKUP_DISPLAY_HISTORY", 5)?,
            event_buffer: parse_or(&lookup, "WALKUP_EVENT_BUFFER", 64)?,
        };

        Ok(Self {
            server,
            storage,
            queue,
        })
    }
}

fn parse_opt<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, var)?.unwrap_or(default))
}
