//! Storage-agnostic repository core.
//! This crate is the single source of truth for the repository contract
//! and its translation into engine-native SQL.

pub mod config;
pub mod engine;
pub mod logging;
pub mod mapping;
pub mod query;
pub mod record;
pub mod repo;
pub mod session;

pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mapping::{ColumnDef, DecodeError, MappingError, ScalarType, TableMapping};
pub use query::{Criteria, Criterion, Page, QueryError, Sort};
pub use record::{Record, RecordId, Value};
pub use repo::{RepoError, RepoResult, SqlRepository};
pub use session::with_session;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
