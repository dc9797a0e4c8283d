//! SQL-backed implementation of the repository contract.
//!
//! # Responsibility
//! - Compose engine, mapping, query builder and session scope into the
//!   five public operations plus the maintenance helpers.
//! - Keep SQL and engine details behind the persistence boundary.
//!
//! # Invariants
//! - Every public operation runs inside exactly one session scope.
//! - Record validation and statement building happen before any engine
//!   contact, so an unsupported input never opens a session.
//! - The managed table is ensured once per handle, inside the first
//!   successful operation's transaction.

use super::{RepoError, RepoResult};
use crate::config::EngineConfig;
use crate::engine::{resolve, Engine, Session};
use crate::mapping::TableMapping;
use crate::query::{self, Criteria, Page, Sort};
use crate::record::{Record, RecordId, Value};
use crate::session::with_session;
use log::{error, info};
use once_cell::sync::OnceCell;
use std::time::Instant;

/// Storage-agnostic repository over one managed table.
///
/// Owns its engine handle and table mapping for its whole lifetime;
/// every call creates and destroys its own session.
pub struct SqlRepository {
    engine: Box<dyn Engine>,
    mapping: TableMapping,
    schema_ready: OnceCell<()>,
}

impl SqlRepository {
    /// Resolves the configured engine and binds the table mapping.
    ///
    /// Construction does not touch file or networked backends; an
    /// unreachable target surfaces on the first operation instead.
    pub fn connect(config: &EngineConfig, mapping: TableMapping) -> RepoResult<Self> {
        let engine = resolve(config)?;
        Ok(Self {
            engine,
            mapping,
            schema_ready: OnceCell::new(),
        })
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    pub fn table(&self) -> &str {
        self.mapping.table()
    }

    /// The resolved engine handle, shared by all sessions of this
    /// repository. Exposed for callers that need a raw session scope.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Persists a new record and returns it with the engine-assigned
    /// identifier.
    pub fn insert(&self, record: &Record) -> RepoResult<Record> {
        let pairs = self.mapping.encode_insert(record)?;
        let statement = query::build_insert(&self.mapping, self.engine.dialect(), &pairs);

        self.run("insert", |session| {
            let id = session.insert_returning_id(&statement.sql, &statement.params)?;
            self.fetch_by_id(session, id)?
                .ok_or_else(|| invisible_row(self.mapping.table(), id))
        })
    }

    /// Loads the record with the given identifier.
    pub fn find_by_id(&self, id: RecordId) -> RepoResult<Record> {
        self.run("find_by_id", |session| {
            self.fetch_by_id(session, id)?
                .ok_or(RepoError::NotFound(id))
        })
    }

    /// Loads every record matching `criteria`, paginated and optionally
    /// sorted. Order is the engine default unless `sort` is given. An
    /// unsupported criterion fails before the engine is touched.
    pub fn find(
        &self,
        criteria: &Criteria,
        page: &Page,
        sort: Option<&Sort>,
    ) -> RepoResult<Vec<Record>> {
        let statement =
            query::build_select(&self.mapping, self.engine.dialect(), criteria, page, sort)?;

        self.run("find", |session| {
            let rows = session.query(&statement.sql, &statement.params)?;
            rows.iter()
                .map(|row| self.mapping.decode(row).map_err(RepoError::from))
                .collect()
        })
    }

    /// Applies a full or partial record to the row with the given
    /// identifier and returns the updated record.
    pub fn update(&self, id: RecordId, changes: &Record) -> RepoResult<Record> {
        let pairs = self.mapping.encode_update(changes)?;
        let statement = query::build_update(&self.mapping, self.engine.dialect(), id, &pairs);

        self.run("update", |session| {
            let changed = session.execute(&statement.sql, &statement.params)?;
            if changed == 0 {
                return Err(RepoError::NotFound(id));
            }
            self.fetch_by_id(session, id)?
                .ok_or_else(|| invisible_row(self.mapping.table(), id))
        })
    }

    /// Deletes the row with the given identifier. Deleting an absent
    /// identifier fails with `NotFound`, including repeated deletes.
    pub fn delete(&self, id: RecordId) -> RepoResult<()> {
        let statement = query::build_delete(&self.mapping, self.engine.dialect(), id);

        self.run("delete", |session| {
            let changed = session.execute(&statement.sql, &statement.params)?;
            if changed == 0 {
                return Err(RepoError::NotFound(id));
            }
            Ok(())
        })
    }

    /// Counts all rows of the managed table.
    pub fn count(&self) -> RepoResult<u64> {
        let statement = query::build_count(&self.mapping);

        self.run("count", |session| {
            let rows = session.query(&statement.sql, &statement.params)?;
            let row = rows
                .first()
                .ok_or_else(|| RepoError::SchemaMismatch("count query returned no row".into()))?;
            match row.get("row_count") {
                Some(Value::Integer(value)) if *value >= 0 => Ok(*value as u64),
                other => Err(RepoError::SchemaMismatch(format!(
                    "count query returned {other:?}"
                ))),
            }
        })
    }

    /// Loads a column projection of the table, optionally limited.
    pub fn summary(&self, projection: &[&str], limit: Option<u32>) -> RepoResult<Vec<Record>> {
        let statement =
            query::build_summary(&self.mapping, self.engine.dialect(), projection, limit)?;

        self.run("summary", |session| {
            let rows = session.query(&statement.sql, &statement.params)?;
            rows.iter()
                .map(|row| self.mapping.decode_columns(row).map_err(RepoError::from))
                .collect()
        })
    }

    /// Removes every row of the managed table in one transaction.
    pub fn truncate(&self) -> RepoResult<()> {
        let statement = query::build_truncate(&self.mapping);

        self.run("truncate", |session| {
            session.execute(&statement.sql, &statement.params)?;
            Ok(())
        })
    }

    fn fetch_by_id(
        &self,
        session: &mut dyn Session,
        id: RecordId,
    ) -> RepoResult<Option<Record>> {
        let lookup = query::build_select_by_id(&self.mapping, self.engine.dialect(), id);
        let rows = session.query(&lookup.sql, &lookup.params)?;
        match rows.first() {
            Some(row) => Ok(Some(self.mapping.decode(row)?)),
            None => Ok(None),
        }
    }

    /// Wraps one operation in a session scope, ensuring the table on
    /// the first successful pass and logging the outcome.
    fn run<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&mut dyn Session) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let bootstrap = self.schema_ready.get().is_none();

        let result = with_session(self.engine.as_ref(), |session| {
            if bootstrap {
                let ddl = self.mapping.create_table_sql(self.engine.dialect());
                session.execute(&ddl, &[])?;
            }
            body(session)
        });

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => {
                if bootstrap {
                    // Only after the creating transaction committed.
                    let _ = self.schema_ready.set(());
                }
                info!(
                    "event={operation} module=repo table={} status=ok duration_ms={duration_ms}",
                    self.mapping.table()
                );
            }
            Err(RepoError::NotFound(id)) => {
                info!(
                    "event={operation} module=repo table={} status=not_found id={id} duration_ms={duration_ms}",
                    self.mapping.table()
                );
            }
            Err(err) => {
                error!(
                    "event={operation} module=repo table={} status=error duration_ms={duration_ms} error={err}",
                    self.mapping.table()
                );
            }
        }
        result
    }
}

fn invisible_row(table: &str, id: RecordId) -> RepoError {
    RepoError::SchemaMismatch(format!(
        "row {id} written to `{table}` is not visible in its own transaction"
    ))
}
