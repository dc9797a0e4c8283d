//! Public repository contract and error taxonomy.
//!
//! # Responsibility
//! - Surface every failure as exactly one of the typed kinds below.
//! - Keep the conversion from module-level errors in one place.
//!
//! # Invariants
//! - No failure is swallowed: anything that goes wrong inside a call
//!   reaches the caller as a `RepoError`.
//! - `NotFound` is an expected outcome, not a defect.

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::mapping::{DecodeError, MappingError};
use crate::query::QueryError;
use crate::record::RecordId;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sql_repo;

pub use sql_repo::SqlRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Typed outcome of every repository call.
#[derive(Debug)]
pub enum RepoError {
    /// Bad or missing setup. Fatal at construction.
    Configuration(ConfigError),
    /// Malformed record. Recoverable with corrected input.
    Validation(MappingError),
    /// No row matches the identifier. Expected outcome.
    NotFound(RecordId),
    /// Criteria the mapper cannot translate. Recoverable by adjusting
    /// the query; raised before the engine is touched.
    UnsupportedQuery(QueryError),
    /// Connection or engine failure. Recoverable by retrying the whole
    /// call after backoff.
    PersistenceFailure(EngineError),
    /// A decoded row violates the mapped shape. Fatal schema drift,
    /// never retried.
    SchemaMismatch(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "no record found for id: {id}"),
            Self::UnsupportedQuery(err) => write!(f, "{err}"),
            Self::PersistenceFailure(err) => write!(f, "persistence failure: {err}"),
            Self::SchemaMismatch(detail) => write!(f, "schema mismatch: {detail}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::UnsupportedQuery(err) => Some(err),
            Self::PersistenceFailure(err) => Some(err),
            Self::NotFound(_) | Self::SchemaMismatch(_) => None,
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<MappingError> for RepoError {
    fn from(value: MappingError) -> Self {
        Self::Validation(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::UnsupportedQuery(value)
    }
}

impl From<DecodeError> for RepoError {
    fn from(value: DecodeError) -> Self {
        Self::SchemaMismatch(value.to_string())
    }
}

impl From<EngineError> for RepoError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::ValueOutOfModel { .. } => Self::SchemaMismatch(value.to_string()),
            other => Self::PersistenceFailure(other),
        }
    }
}
