//! Engine capability surface and resolver.
//!
//! # Responsibility
//! - Define the narrow `Engine`/`Session` interface every backend
//!   implements, so call sites never branch on engine identifiers.
//! - Resolve a parsed configuration into a live engine handle.
//!
//! # Invariants
//! - A session owns at most one in-flight transaction.
//! - File and networked engines open their connection lazily; an
//!   unreachable target surfaces on first use, not at resolve time.

use crate::config::EngineConfig;
use crate::record::Value;
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod postgres;
pub mod sqlite;

/// One row as returned by an engine, keyed by column name.
pub type NativeRow = BTreeMap<String, Value>;

pub type EngineResult<T> = Result<T, EngineError>;

/// SQL flavor spoken by an engine. Statement builders consult this for
/// placeholder syntax and column types; nothing else may branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Placeholder for the parameter at 1-based `position`.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Sqlite => format!("?{position}"),
            Self::Postgres => format!("${position}"),
        }
    }
}

/// A resolved relational backend.
pub trait Engine: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Opens one unit-of-work session. For lazy backends this is where
    /// the underlying connection is established.
    fn open_session(&self) -> EngineResult<Box<dyn Session + '_>>;
}

/// One unit-of-work bound to a single connection.
///
/// Callers drive the transaction explicitly via `begin`/`commit`/
/// `rollback`; dropping a session with an open transaction rolls it
/// back when the connection closes.
pub trait Session {
    fn begin(&mut self) -> EngineResult<()>;
    fn commit(&mut self) -> EngineResult<()>;
    fn rollback(&mut self) -> EngineResult<()>;

    /// Runs a statement that returns no rows; yields the affected count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> EngineResult<u64>;

    /// Runs a query and decodes every row into the scalar value model.
    fn query(&mut self, sql: &str, params: &[Value]) -> EngineResult<Vec<NativeRow>>;

    /// Runs an insert and yields the engine-assigned surrogate key.
    fn insert_returning_id(&mut self, sql: &str, params: &[Value]) -> EngineResult<i64>;
}

/// Produces a live engine handle for the selected backend.
///
/// In-memory engines open their connection here so the backing store
/// lives exactly as long as the returned handle. File and networked
/// engines only record their target.
pub fn resolve(config: &EngineConfig) -> EngineResult<Box<dyn Engine>> {
    let engine: Box<dyn Engine> = match config {
        EngineConfig::SqliteMemory => Box::new(sqlite::MemorySqliteEngine::open()?),
        EngineConfig::SqliteFile { path } => Box::new(sqlite::FileSqliteEngine::new(path)),
        EngineConfig::Postgres {
            host,
            port,
            username,
            password,
            dbname,
        } => Box::new(postgres::PostgresEngine::new(
            host, *port, username, password, dbname,
        )),
    };
    info!(
        "event=engine_resolve module=engine status=ok engine={}",
        config.engine_name()
    );
    Ok(engine)
}

#[derive(Debug)]
pub enum EngineError {
    Sqlite(rusqlite::Error),
    Postgres(::postgres::Error),
    /// The engine returned a value outside the scalar model. Indicates
    /// schema drift rather than a connection failure.
    ValueOutOfModel { column: String, found: String },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Postgres(err) => write!(f, "{err}"),
            Self::ValueOutOfModel { column, found } => write!(
                f,
                "column `{column}` holds a `{found}` value outside the scalar model"
            ),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Postgres(err) => Some(err),
            Self::ValueOutOfModel { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<::postgres::Error> for EngineError {
    fn from(value: ::postgres::Error) -> Self {
        Self::Postgres(value)
    }
}
