//! Engine selection and connection configuration.
//!
//! # Responsibility
//! - Describe which relational engine backs a repository and how to
//!   reach it.
//! - Parse the recognized-options dictionary used by upstream callers.
//!
//! # Invariants
//! - Configuration is consumed once at adapter construction and never
//!   re-read per call.
//! - An unrecognized engine identifier fails before any engine access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Selects the relational engine and its connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum EngineConfig {
    /// In-process SQLite whose backing store lives as long as the handle.
    SqliteMemory,
    /// File-backed SQLite; the file is created on first use if absent.
    SqliteFile { path: String },
    /// Networked PostgreSQL server; the connection opens lazily per call.
    Postgres {
        host: String,
        port: u16,
        username: String,
        password: String,
        dbname: String,
    },
}

impl EngineConfig {
    /// Builds a configuration from the recognized-options mapping used by
    /// the construction contract, e.g. `{engine: "sqlite_file", path: ...}`.
    ///
    /// # Errors
    /// - `ConfigError::UnknownEngine` for an unrecognized `engine` value.
    /// - `ConfigError::MissingOption` when a required parameter is absent.
    /// - `ConfigError::InvalidOption` when a parameter fails to parse.
    pub fn from_options(options: &BTreeMap<String, String>) -> ConfigResult<Self> {
        let engine = options.get("engine").ok_or(ConfigError::MissingOption {
            engine: "<unspecified>",
            option: "engine",
        })?;

        match engine.trim().to_ascii_lowercase().as_str() {
            "sqlite_memory" => Ok(Self::SqliteMemory),
            "sqlite_file" => Ok(Self::SqliteFile {
                path: required(options, "sqlite_file", "path")?.to_string(),
            }),
            "postgres" => {
                let port_text = required(options, "postgres", "port")?;
                let port = port_text
                    .parse::<u16>()
                    .map_err(|err| ConfigError::InvalidOption {
                        option: "port",
                        reason: format!("`{port_text}` is not a valid port: {err}"),
                    })?;
                Ok(Self::Postgres {
                    host: required(options, "postgres", "host")?.to_string(),
                    port,
                    username: required(options, "postgres", "username")?.to_string(),
                    password: required(options, "postgres", "password")?.to_string(),
                    dbname: required(options, "postgres", "dbname")?.to_string(),
                })
            }
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }

    /// Stable engine identifier, matching the `from_options` spelling.
    pub fn engine_name(&self) -> &'static str {
        match self {
            Self::SqliteMemory => "sqlite_memory",
            Self::SqliteFile { .. } => "sqlite_file",
            Self::Postgres { .. } => "postgres",
        }
    }
}

fn required<'a>(
    options: &'a BTreeMap<String, String>,
    engine: &'static str,
    option: &'static str,
) -> ConfigResult<&'a str> {
    options
        .get(option)
        .map(String::as_str)
        .ok_or(ConfigError::MissingOption { engine, option })
}

/// Construction-time configuration failure. Fatal: the adapter is never
/// built from a bad configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnknownEngine(String),
    MissingOption {
        engine: &'static str,
        option: &'static str,
    },
    InvalidOption {
        option: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEngine(engine) => write!(f, "unknown engine type: {engine}"),
            Self::MissingOption { engine, option } => {
                write!(f, "engine `{engine}` requires the `{option}` option")
            }
            Self::InvalidOption { option, reason } => {
                write!(f, "invalid value for option `{option}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}
