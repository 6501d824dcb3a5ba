//! Configuration loading and representation.
//!
//! Values are read once at startup and handed to the components that need
//! them; nothing below reads the environment on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_observability::LogFormat;

pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Longest recent-activity window accepted from configuration (one leap year).
pub const MAX_RECENT_ACTIVITY_HOURS: u32 = 24 * 366;
/// Longest movement chart accepted from configuration.
pub const MAX_MOVEMENT_CHART_DAYS: u32 = 366;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid value: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where stock rows and movements are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// Settings for the stock services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Extra attempts after a transient commit failure (0 disables retrying).
    pub max_commit_retries: u32,
    pub storage: StorageBackend,
    pub log_format: LogFormat,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            storage: StorageBackend::InMemory,
            log_format: LogFormat::default(),
        }
    }
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// | key | default |
    /// |-----|---------|
    /// | `STOCKLEDGER_MAX_COMMIT_RETRIES` | 3 |
    /// | `STOCKLEDGER_LOG_FORMAT` | `json` |
    /// | `USE_PERSISTENT_STORES` | `false` |
    /// | `DATABASE_URL` | required when persistent |
    /// | `STOCKLEDGER_DB_MAX_CONNECTIONS` | 10 |
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_commit_retries = parse_or(&lookup, "STOCKLEDGER_MAX_COMMIT_RETRIES", DEFAULT_MAX_COMMIT_RETRIES)?;

        let log_format = match lookup("STOCKLEDGER_LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e: stockledger_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    key: "STOCKLEDGER_LOG_FORMAT",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => LogFormat::default(),
        };

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            Some(raw) => parse_flag("USE_PERSISTENT_STORES", &raw)?,
            None => false,
        };

        let storage = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = parse_or(&lookup, "STOCKLEDGER_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
            if max_connections == 0 {
                return Err(ConfigError::Invalid {
                    key: "STOCKLEDGER_DB_MAX_CONNECTIONS",
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            StorageBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageBackend::InMemory
        };

        Ok(Self {
            max_commit_retries,
            storage,
            log_format,
        })
    }
}

/// Dashboard thresholds, passed explicitly to the reporting queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingThresholds {
    /// A stock at or below this quantity is "low".
    pub low_stock_threshold: u64,
    /// A stock at or below this quantity is "critical".
    pub critical_stock_threshold: u64,
    pub low_stock_list_limit: usize,
    pub recent_activity_hours: u32,
    pub movement_chart_days: u32,
}

impl Default for ReportingThresholds {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
            low_stock_list_limit: 10,
            recent_activity_hours: 24,
            movement_chart_days: 7,
        }
    }
}

impl ReportingThresholds {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `STOCKLEDGER_LOW_STOCK_THRESHOLD`, `STOCKLEDGER_CRITICAL_STOCK_THRESHOLD`,
    /// `STOCKLEDGER_LOW_STOCK_LIST_LIMIT`, `STOCKLEDGER_RECENT_ACTIVITY_HOURS`,
    /// `STOCKLEDGER_MOVEMENT_CHART_DAYS`; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let thresholds = Self {
            low_stock_threshold: parse_or(&lookup, "STOCKLEDGER_LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
            critical_stock_threshold: parse_or(
                &lookup,
                "STOCKLEDGER_CRITICAL_STOCK_THRESHOLD",
                defaults.critical_stock_threshold,
            )?,
            low_stock_list_limit: parse_or(&lookup, "STOCKLEDGER_LOW_STOCK_LIST_LIMIT", defaults.low_stock_list_limit)?,
            recent_activity_hours: parse_or(
                &lookup,
                "STOCKLEDGER_RECENT_ACTIVITY_HOURS",
                defaults.recent_activity_hours,
            )?,
            movement_chart_days: parse_or(&lookup, "STOCKLEDGER_MOVEMENT_CHART_DAYS", defaults.movement_chart_days)?,
        };

        if thresholds.critical_stock_threshold > thresholds.low_stock_threshold {
            return Err(ConfigError::Invalid {
                key: "STOCKLEDGER_CRITICAL_STOCK_THRESHOLD",
                value: thresholds.critical_stock_threshold.to_string(),
                reason: format!("cannot exceed the low stock threshold ({})", thresholds.low_stock_threshold),
            });
        }
        if thresholds.recent_activity_hours > MAX_RECENT_ACTIVITY_HOURS {
            return Err(ConfigError::Invalid {
                key: "STOCKLEDGER_RECENT_ACTIVITY_HOURS",
                value: thresholds.recent_activity_hours.to_string(),
                reason: format!("cannot exceed {MAX_RECENT_ACTIVITY_HOURS}"),
            });
        }
        if thresholds.movement_chart_days > MAX_MOVEMENT_CHART_DAYS {
            return Err(ConfigError::Invalid {
                key: "STOCKLEDGER_MOVEMENT_CHART_DAYS",
                value: thresholds.movement_chart_days.to_string(),
                reason: format!("cannot exceed {MAX_MOVEMENT_CHART_DAYS}"),
            });
        }
        Ok(thresholds)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
