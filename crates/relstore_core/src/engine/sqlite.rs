//! SQLite engines: in-memory and file-backed.
//!
//! # Responsibility
//! - Keep the in-memory store alive for the lifetime of its handle.
//! - Open file connections lazily, one per session.
//! - Bridge scalar values to rusqlite parameters and back.
//!
//! # Invariants
//! - Sessions left with an open transaction roll back on drop.
//! - Connections run with `foreign_keys=ON` and a 5s busy timeout.

use super::{Dialect, Engine, EngineError, EngineResult, NativeRow, Session};
use crate::record::Value;
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params_from_iter, Connection};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-process engine whose backing store lives exactly as long as this
/// handle. The single connection is shared across sessions; the mutex
/// serializes them.
pub struct MemorySqliteEngine {
    conn: Mutex<Connection>,
}

impl MemorySqliteEngine {
    pub fn open() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Engine for MemorySqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn open_session(&self) -> EngineResult<Box<dyn Session + '_>> {
        // A poisoned lock only means another session panicked; the
        // connection itself is still usable and any open transaction is
        // rolled back below on drop of that session.
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Box::new(SqliteSession::new(ConnRef::Shared(guard))))
    }
}

/// File-backed engine. Only the path is held; every session opens its
/// own connection, creating the file on first use.
pub struct FileSqliteEngine {
    path: PathBuf,
}

impl FileSqliteEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Engine for FileSqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn open_session(&self) -> EngineResult<Box<dyn Session + '_>> {
        let conn = Connection::open(&self.path)?;
        bootstrap(&conn)?;
        Ok(Box::new(SqliteSession::new(ConnRef::Owned(conn))))
    }
}

fn bootstrap(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

enum ConnRef<'a> {
    Shared(MutexGuard<'a, Connection>),
    Owned(Connection),
}

impl ConnRef<'_> {
    fn get(&self) -> &Connection {
        match self {
            Self::Shared(guard) => guard,
            Self::Owned(conn) => conn,
        }
    }
}

pub struct SqliteSession<'a> {
    conn: ConnRef<'a>,
    in_transaction: bool,
}

impl<'a> SqliteSession<'a> {
    fn new(conn: ConnRef<'a>) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }
}

impl Session for SqliteSession<'_> {
    fn begin(&mut self) -> EngineResult<()> {
        self.conn.get().execute_batch("BEGIN;")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.conn.get().execute_batch("COMMIT;")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.conn.get().execute_batch("ROLLBACK;")?;
        self.in_transaction = false;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> EngineResult<u64> {
        let changed = self
            .conn
            .get()
            .execute(sql, params_from_iter(bind(params)))?;
        Ok(changed as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> EngineResult<Vec<NativeRow>> {
        let mut stmt = self.conn.get().prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(bind(params)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut native = NativeRow::new();
            for (index, name) in names.iter().enumerate() {
                let value = match row.get::<_, SqliteValue>(index)? {
                    SqliteValue::Null => Value::Null,
                    SqliteValue::Integer(v) => Value::Integer(v),
                    SqliteValue::Real(v) => Value::Real(v),
                    SqliteValue::Text(v) => Value::Text(v),
                    SqliteValue::Blob(_) => {
                        return Err(EngineError::ValueOutOfModel {
                            column: name.clone(),
                            found: "blob".to_string(),
                        });
                    }
                };
                native.insert(name.clone(), value);
            }
            out.push(native);
        }
        Ok(out)
    }

    fn insert_returning_id(&mut self, sql: &str, params: &[Value]) -> EngineResult<i64> {
        self.execute(sql, params)?;
        Ok(self.conn.get().last_insert_rowid())
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        // The shared in-memory connection outlives the session, so an
        // abandoned transaction must not leak into the next session.
        if self.in_transaction {
            let _ = self.conn.get().execute_batch("ROLLBACK;");
        }
    }
}

fn bind(params: &[Value]) -> impl Iterator<Item = SqliteValue> + '_ {
    params.iter().map(|value| match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(v) => SqliteValue::Integer(i64::from(*v)),
        Value::Integer(v) => SqliteValue::Integer(*v),
        Value::Real(v) => SqliteValue::Real(*v),
        Value::Text(v) => SqliteValue::Text(v.clone()),
    })
}
