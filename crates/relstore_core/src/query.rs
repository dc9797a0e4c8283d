//! Criteria model and dialect-aware statement builders.
//!
//! # Responsibility
//! - Translate equality/range criteria, pagination and sorting into
//!   parameterized SQL for the engine's dialect.
//! - Fail fast: an unsupported criterion aborts before any engine
//!   contact, so no filter is ever partially applied.
//!
//! # Invariants
//! - Column names in generated SQL come from the validated mapping,
//!   never raw from the caller.
//! - Null never travels as a bound parameter; it becomes `IS NULL`,
//!   `IS NOT NULL` or a literal `NULL` assignment.

use crate::engine::Dialect;
use crate::mapping::{coerce_value, ColumnDef, TableMapping};
use crate::record::{RecordId, Value};
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type QueryResult<T> = Result<T, QueryError>;

/// One filter applied to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Equals(Value),
    NotEquals(Value),
    LessThan(Value),
    GreaterThan(Value),
    Between(Value, Value),
}

/// Column-keyed filter set, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct Criteria(BTreeMap<String, Criterion>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, criterion: Criterion) -> Self {
        self.0.insert(column.into(), criterion);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, Criterion> {
        self.0.iter()
    }
}

/// Offset/limit pagination window.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Explicit result ordering; without one the engine default applies.
#[derive(Debug, Clone)]
pub struct Sort {
    pub column: String,
    pub descending: bool,
}

impl Sort {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Parameterized SQL ready for a session.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds the filtered select for `find`.
pub fn build_select(
    mapping: &TableMapping,
    dialect: Dialect,
    criteria: &Criteria,
    page: &Page,
    sort: Option<&Sort>,
) -> QueryResult<Statement> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE 1 = 1",
        column_list(mapping),
        mapping.table()
    );
    let mut params = Vec::new();

    for (name, criterion) in criteria.iter() {
        let column = resolve_column(mapping, name)?;
        append_criterion(&mut sql, &mut params, dialect, column, criterion)?;
    }

    if let Some(sort) = sort {
        let column = resolve_column(mapping, &sort.column)?;
        let direction = if sort.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {direction}", column.name));
    }

    append_page(&mut sql, &mut params, dialect, page);
    Ok(Statement { sql, params })
}

pub fn build_select_by_id(mapping: &TableMapping, dialect: Dialect, id: RecordId) -> Statement {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(mapping),
        mapping.table(),
        mapping.key_column().name,
        dialect.placeholder(1)
    );
    Statement {
        sql,
        params: vec![Value::Integer(id)],
    }
}

/// Builds the insert for pre-encoded `(column, value)` pairs. Postgres
/// carries a `RETURNING` clause for the surrogate key; SQLite reads
/// `last_insert_rowid` instead.
pub fn build_insert(mapping: &TableMapping, dialect: Dialect, pairs: &[(String, Value)]) -> Statement {
    let mut params = Vec::with_capacity(pairs.len());

    let mut sql = if pairs.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", mapping.table())
    } else {
        let mut columns = Vec::with_capacity(pairs.len());
        let mut placeholders = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            params.push(value.clone());
            columns.push(name.as_str());
            placeholders.push(dialect.placeholder(params.len()));
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            mapping.table(),
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    if dialect == Dialect::Postgres {
        sql.push_str(&format!(" RETURNING {}", mapping.key_column().name));
    }
    Statement { sql, params }
}

pub fn build_update(
    mapping: &TableMapping,
    dialect: Dialect,
    id: RecordId,
    pairs: &[(String, Value)],
) -> Statement {
    let mut params = Vec::with_capacity(pairs.len() + 1);
    let mut assignments = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        if value.is_null() {
            assignments.push(format!("{name} = NULL"));
        } else {
            params.push(value.clone());
            assignments.push(format!("{name} = {}", dialect.placeholder(params.len())));
        }
    }

    params.push(Value::Integer(id));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        mapping.table(),
        assignments.join(", "),
        mapping.key_column().name,
        dialect.placeholder(params.len())
    );
    Statement { sql, params }
}

pub fn build_delete(mapping: &TableMapping, dialect: Dialect, id: RecordId) -> Statement {
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        mapping.table(),
        mapping.key_column().name,
        dialect.placeholder(1)
    );
    Statement {
        sql,
        params: vec![Value::Integer(id)],
    }
}

pub fn build_count(mapping: &TableMapping) -> Statement {
    Statement {
        sql: format!("SELECT COUNT(*) AS row_count FROM {}", mapping.table()),
        params: Vec::new(),
    }
}

/// Builds the projected summary select.
pub fn build_summary(
    mapping: &TableMapping,
    dialect: Dialect,
    projection: &[&str],
    limit: Option<u32>,
) -> QueryResult<Statement> {
    if projection.is_empty() {
        return Err(QueryError::EmptyProjection);
    }

    let mut columns = Vec::with_capacity(projection.len());
    for name in projection {
        columns.push(resolve_column(mapping, name)?.name.as_str());
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), mapping.table());
    let mut params = Vec::new();
    if let Some(limit) = limit {
        params.push(Value::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT {}", dialect.placeholder(params.len())));
    }
    Ok(Statement { sql, params })
}

pub fn build_truncate(mapping: &TableMapping) -> Statement {
    Statement {
        sql: format!("DELETE FROM {}", mapping.table()),
        params: Vec::new(),
    }
}

fn append_criterion(
    sql: &mut String,
    params: &mut Vec<Value>,
    dialect: Dialect,
    column: &ColumnDef,
    criterion: &Criterion,
) -> QueryResult<()> {
    let name = column.name.as_str();
    match criterion {
        Criterion::Equals(Value::Null) => sql.push_str(&format!(" AND {name} IS NULL")),
        Criterion::NotEquals(Value::Null) => sql.push_str(&format!(" AND {name} IS NOT NULL")),
        Criterion::Equals(value) => {
            push_operand(sql, params, dialect, column, "=", value)?;
        }
        Criterion::NotEquals(value) => {
            push_operand(sql, params, dialect, column, "<>", value)?;
        }
        Criterion::LessThan(value) => {
            reject_null(column, value)?;
            push_operand(sql, params, dialect, column, "<", value)?;
        }
        Criterion::GreaterThan(value) => {
            reject_null(column, value)?;
            push_operand(sql, params, dialect, column, ">", value)?;
        }
        Criterion::Between(lower, upper) => {
            reject_null(column, lower)?;
            reject_null(column, upper)?;
            params.push(coerced(column, lower)?);
            let lower_ph = dialect.placeholder(params.len());
            params.push(coerced(column, upper)?);
            let upper_ph = dialect.placeholder(params.len());
            sql.push_str(&format!(" AND {name} BETWEEN {lower_ph} AND {upper_ph}"));
        }
    }
    Ok(())
}

fn push_operand(
    sql: &mut String,
    params: &mut Vec<Value>,
    dialect: Dialect,
    column: &ColumnDef,
    operator: &str,
    value: &Value,
) -> QueryResult<()> {
    params.push(coerced(column, value)?);
    sql.push_str(&format!(
        " AND {} {operator} {}",
        column.name,
        dialect.placeholder(params.len())
    ));
    Ok(())
}

fn append_page(sql: &mut String, params: &mut Vec<Value>, dialect: Dialect, page: &Page) {
    if let Some(limit) = page.limit {
        params.push(Value::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT {}", dialect.placeholder(params.len())));
        if page.offset > 0 {
            params.push(Value::Integer(i64::from(page.offset)));
            sql.push_str(&format!(" OFFSET {}", dialect.placeholder(params.len())));
        }
    } else if page.offset > 0 {
        // SQLite requires a LIMIT clause to accept OFFSET.
        if dialect == Dialect::Sqlite {
            sql.push_str(" LIMIT -1");
        }
        params.push(Value::Integer(i64::from(page.offset)));
        sql.push_str(&format!(" OFFSET {}", dialect.placeholder(params.len())));
    }
}

fn resolve_column<'a>(mapping: &'a TableMapping, name: &str) -> QueryResult<&'a ColumnDef> {
    mapping
        .column(name)
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
}

fn coerced(column: &ColumnDef, value: &Value) -> QueryResult<Value> {
    coerce_value(column, value).map_err(|err| QueryError::InvalidValue {
        column: column.name.clone(),
        detail: err.to_string(),
    })
}

fn reject_null(column: &ColumnDef, value: &Value) -> QueryResult<()> {
    if value.is_null() {
        return Err(QueryError::UnorderedNull {
            column: column.name.clone(),
        });
    }
    Ok(())
}

fn column_list(mapping: &TableMapping) -> String {
    mapping
        .columns()
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Criteria the builder cannot translate. Recoverable by adjusting the
/// query; raised before any engine contact.
#[derive(Debug, PartialEq, Eq)]
pub enum QueryError {
    UnknownColumn(String),
    EmptyProjection,
    UnorderedNull { column: String },
    InvalidValue { column: String, detail: String },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownColumn(name) => {
                write!(f, "criteria references unmapped column `{name}`")
            }
            Self::EmptyProjection => write!(f, "a summary requires at least one column"),
            Self::UnorderedNull { column } => {
                write!(f, "null cannot be ordered against column `{column}`")
            }
            Self::InvalidValue { column, detail } => {
                write!(f, "criteria value rejected for column `{column}`: {detail}")
            }
        }
    }
}

impl Error for QueryError {}
