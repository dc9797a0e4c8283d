//! Table metadata and record/row translation.
//!
//! # Responsibility
//! - Hold the fixed column layout of the managed table.
//! - Validate and coerce caller records into engine-bindable values.
//! - Decode engine rows back into records, rejecting schema drift.
//!
//! # Invariants
//! - Exactly one primary-key column, integer typed, engine-assigned.
//! - Coercion is exact: out-of-range values fail validation instead of
//!   being truncated or clamped.
//! - Decode only widens what engines natively widen (SQLite integers
//!   standing in for booleans and whole reals).

use crate::engine::{Dialect, NativeRow};
use crate::record::{Record, Value};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declared scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
        }
    }
}

/// One column of the managed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub scalar_type: ScalarType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    /// Engine-assigned integer surrogate key.
    pub fn surrogate_key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scalar_type: ScalarType::Integer,
            nullable: false,
            primary_key: true,
        }
    }

    /// Mandatory column: every write must provide a non-null value.
    pub fn required(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: false,
            primary_key: false,
        }
    }

    /// Optional column: absent or null values persist as SQL NULL.
    pub fn nullable(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: true,
            primary_key: false,
        }
    }
}

/// Fixed metadata for the managed table: name, ordered columns and the
/// single surrogate primary key. Built once at adapter construction,
/// immutable for the adapter's lifetime.
#[derive(Debug, Clone)]
pub struct TableMapping {
    table: String,
    columns: Vec<ColumnDef>,
    key_index: usize,
}

impl TableMapping {
    /// Validates and freezes the column layout.
    ///
    /// # Errors
    /// Returns `MappingError::InvalidMapping` when the table or a column
    /// name is not a plain identifier, names repeat, or the layout does
    /// not carry exactly one integer, non-nullable primary key.
    pub fn new(table: impl Into<String>, columns: Vec<ColumnDef>) -> MappingResult<Self> {
        let table = table.into();
        check_identifier("table", &table)?;

        if columns.is_empty() {
            return Err(MappingError::InvalidMapping(
                "a table mapping requires at least one column".to_string(),
            ));
        }

        let mut key_index = None;
        for (index, column) in columns.iter().enumerate() {
            check_identifier("column", &column.name)?;

            if columns[..index].iter().any(|c| c.name == column.name) {
                return Err(MappingError::InvalidMapping(format!(
                    "duplicate column name `{}`",
                    column.name
                )));
            }

            if !column.primary_key {
                continue;
            }
            if key_index.is_some() {
                return Err(MappingError::InvalidMapping(
                    "a table mapping allows exactly one primary-key column".to_string(),
                ));
            }
            if column.scalar_type != ScalarType::Integer || column.nullable {
                return Err(MappingError::InvalidMapping(format!(
                    "primary-key column `{}` must be a non-nullable integer",
                    column.name
                )));
            }
            key_index = Some(index);
        }

        let key_index = key_index.ok_or_else(|| {
            MappingError::InvalidMapping("a table mapping requires a primary-key column".to_string())
        })?;

        Ok(Self {
            table,
            columns,
            key_index,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn key_column(&self) -> &ColumnDef {
        &self.columns[self.key_index]
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Validates an insert record and yields `(column, value)` pairs in
    /// declaration order. Null and absent optional columns are omitted
    /// so the engine applies SQL NULL itself.
    ///
    /// # Errors
    /// - `KeyNotAssignable` when the record carries the primary key.
    /// - `UnknownField` for fields outside the mapping.
    /// - `MissingField` for an absent mandatory column.
    /// - `NotNullable`/`TypeMismatch`/`OutOfRange` per column value.
    pub fn encode_insert(&self, record: &Record) -> MappingResult<Vec<(String, Value)>> {
        self.reject_unmapped_fields(record)?;

        let mut pairs = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.primary_key {
                continue;
            }
            match record.get(&column.name) {
                None => {
                    if !column.nullable {
                        return Err(MappingError::MissingField(column.name.clone()));
                    }
                }
                Some(Value::Null) => {
                    if !column.nullable {
                        return Err(MappingError::NotNullable(column.name.clone()));
                    }
                }
                Some(value) => {
                    pairs.push((column.name.clone(), coerce_value(column, value)?));
                }
            }
        }
        Ok(pairs)
    }

    /// Validates a partial update record. Explicit nulls are kept as
    /// pairs so the statement builder can emit `column = NULL`.
    pub fn encode_update(&self, record: &Record) -> MappingResult<Vec<(String, Value)>> {
        self.reject_unmapped_fields(record)?;

        if record.is_empty() {
            return Err(MappingError::EmptyUpdate);
        }

        let mut pairs = Vec::with_capacity(record.len());
        for column in &self.columns {
            if column.primary_key {
                continue;
            }
            let Some(value) = record.get(&column.name) else {
                continue;
            };
            if value.is_null() {
                if !column.nullable {
                    return Err(MappingError::NotNullable(column.name.clone()));
                }
                pairs.push((column.name.clone(), Value::Null));
            } else {
                pairs.push((column.name.clone(), coerce_value(column, value)?));
            }
        }
        Ok(pairs)
    }

    /// Decodes a full engine row into a record. Any deviation from the
    /// mapped layout is schema drift and fails with `DecodeError`.
    pub fn decode(&self, row: &NativeRow) -> Result<Record, DecodeError> {
        for column in &self.columns {
            if !row.contains_key(&column.name) {
                return Err(DecodeError::MissingColumn(column.name.clone()));
            }
        }
        self.decode_columns(row)
    }

    /// Decodes a projected row: every present column must belong to the
    /// mapping, but the row may cover a subset of it.
    pub fn decode_columns(&self, row: &NativeRow) -> Result<Record, DecodeError> {
        let mut record = Record::new();
        for (name, value) in row {
            let column = self
                .column(name)
                .ok_or_else(|| DecodeError::UnexpectedColumn(name.clone()))?;
            record.insert(name.clone(), decode_value(column, value)?);
        }
        Ok(record)
    }

    /// Idempotent DDL for the managed table in the engine's dialect.
    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut defs = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.primary_key {
                defs.push(match dialect {
                    Dialect::Sqlite => {
                        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column.name)
                    }
                    Dialect::Postgres => format!("{} BIGSERIAL PRIMARY KEY", column.name),
                });
                continue;
            }
            let nullability = if column.nullable { "" } else { " NOT NULL" };
            defs.push(format!(
                "{} {}{nullability}",
                column.name,
                sql_type(dialect, column.scalar_type)
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            defs.join(", ")
        )
    }

    fn reject_unmapped_fields(&self, record: &Record) -> MappingResult<()> {
        for name in record.keys() {
            let column = self
                .column(name)
                .ok_or_else(|| MappingError::UnknownField(name.clone()))?;
            if column.primary_key {
                return Err(MappingError::KeyNotAssignable(name.clone()));
            }
        }
        Ok(())
    }
}

fn sql_type(dialect: Dialect, scalar_type: ScalarType) -> &'static str {
    match (dialect, scalar_type) {
        (Dialect::Sqlite, ScalarType::Text) => "TEXT",
        (Dialect::Sqlite, ScalarType::Integer) => "INTEGER",
        (Dialect::Sqlite, ScalarType::Real) => "REAL",
        (Dialect::Sqlite, ScalarType::Boolean) => "INTEGER",
        (Dialect::Postgres, ScalarType::Text) => "TEXT",
        (Dialect::Postgres, ScalarType::Integer) => "BIGINT",
        (Dialect::Postgres, ScalarType::Real) => "DOUBLE PRECISION",
        (Dialect::Postgres, ScalarType::Boolean) => "BOOLEAN",
    }
}

/// Coerces a non-null caller value into the column's declared type.
/// Exact only: a real fits an integer column when integral and in
/// range, an integer fits a real column when exactly representable,
/// and 0/1 integers fit boolean columns.
pub(crate) fn coerce_value(column: &ColumnDef, value: &Value) -> MappingResult<Value> {
    match (column.scalar_type, value) {
        (ScalarType::Text, Value::Text(v)) => Ok(Value::Text(v.clone())),
        (ScalarType::Integer, Value::Integer(v)) => Ok(Value::Integer(*v)),
        (ScalarType::Integer, Value::Real(v)) => {
            let wide = *v as i128;
            if v.is_finite()
                && v.fract() == 0.0
                && wide >= i128::from(i64::MIN)
                && wide <= i128::from(i64::MAX)
            {
                Ok(Value::Integer(wide as i64))
            } else {
                Err(MappingError::OutOfRange {
                    column: column.name.clone(),
                    detail: format!("real value {v} is not an exact integer"),
                })
            }
        }
        (ScalarType::Real, Value::Real(v)) => {
            if v.is_finite() {
                Ok(Value::Real(*v))
            } else {
                Err(MappingError::OutOfRange {
                    column: column.name.clone(),
                    detail: format!("non-finite real value {v}"),
                })
            }
        }
        (ScalarType::Real, Value::Integer(v)) => {
            // Compare through i128: an i64 cast saturates and would let
            // 2^63-1 slip through as "exact".
            if (*v as f64) as i128 == i128::from(*v) {
                Ok(Value::Real(*v as f64))
            } else {
                Err(MappingError::OutOfRange {
                    column: column.name.clone(),
                    detail: format!("integer value {v} is not exactly representable as a real"),
                })
            }
        }
        (ScalarType::Boolean, Value::Bool(v)) => Ok(Value::Bool(*v)),
        (ScalarType::Boolean, Value::Integer(0)) => Ok(Value::Bool(false)),
        (ScalarType::Boolean, Value::Integer(1)) => Ok(Value::Bool(true)),
        (ScalarType::Boolean, Value::Integer(v)) => Err(MappingError::OutOfRange {
            column: column.name.clone(),
            detail: format!("integer value {v} is not a valid boolean"),
        }),
        (expected, found) => Err(MappingError::TypeMismatch {
            column: column.name.clone(),
            expected,
            found: found.kind(),
        }),
    }
}

fn decode_value(column: &ColumnDef, value: &Value) -> Result<Value, DecodeError> {
    let incompatible = || DecodeError::IncompatibleValue {
        column: column.name.clone(),
        expected: column.scalar_type,
        found: value.kind(),
    };

    match (column.scalar_type, value) {
        (_, Value::Null) => {
            if column.nullable {
                Ok(Value::Null)
            } else {
                Err(incompatible())
            }
        }
        (ScalarType::Text, Value::Text(v)) => Ok(Value::Text(v.clone())),
        (ScalarType::Integer, Value::Integer(v)) => Ok(Value::Integer(*v)),
        (ScalarType::Real, Value::Real(v)) => Ok(Value::Real(*v)),
        // SQLite has no boolean or strict real affinity; integers stand
        // in for both on the way back out.
        (ScalarType::Real, Value::Integer(v)) => Ok(Value::Real(*v as f64)),
        (ScalarType::Boolean, Value::Bool(v)) => Ok(Value::Bool(*v)),
        (ScalarType::Boolean, Value::Integer(0)) => Ok(Value::Bool(false)),
        (ScalarType::Boolean, Value::Integer(1)) => Ok(Value::Bool(true)),
        _ => Err(incompatible()),
    }
}

fn check_identifier(what: &'static str, name: &str) -> MappingResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(MappingError::InvalidMapping(format!(
            "{what} name `{name}` is not a plain identifier"
        )))
    }
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Malformed record or mapping. Recoverable: the caller may retry with
/// corrected input. Every variant names the offending column.
#[derive(Debug, PartialEq, Eq)]
pub enum MappingError {
    InvalidMapping(String),
    UnknownField(String),
    MissingField(String),
    KeyNotAssignable(String),
    NotNullable(String),
    EmptyUpdate,
    TypeMismatch {
        column: String,
        expected: ScalarType,
        found: &'static str,
    },
    OutOfRange {
        column: String,
        detail: String,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMapping(detail) => write!(f, "invalid table mapping: {detail}"),
            Self::UnknownField(name) => write!(f, "field `{name}` is not a mapped column"),
            Self::MissingField(name) => {
                write!(f, "mandatory column `{name}` is missing from the record")
            }
            Self::KeyNotAssignable(name) => {
                write!(f, "primary-key column `{name}` is assigned by the engine")
            }
            Self::NotNullable(name) => write!(f, "column `{name}` does not accept null"),
            Self::EmptyUpdate => write!(f, "an update record requires at least one field"),
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column `{column}` expects {} but the record holds {found}",
                expected.name()
            ),
            Self::OutOfRange { column, detail } => {
                write!(f, "value out of range for column `{column}`: {detail}")
            }
        }
    }
}

impl Error for MappingError {}

/// A well-formed engine row no longer matches the mapping. Fatal: this
/// is out-of-band schema drift, never retried.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    MissingColumn(String),
    UnexpectedColumn(String),
    IncompatibleValue {
        column: String,
        expected: ScalarType,
        found: &'static str,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(name) => {
                write!(f, "engine row is missing mapped column `{name}`")
            }
            Self::UnexpectedColumn(name) => {
                write!(f, "engine row carries unmapped column `{name}`")
            }
            Self::IncompatibleValue {
                column,
                expected,
                found,
            } => write!(
                f,
                "column `{column}` decoded as {found} where {} was mapped",
                expected.name()
            ),
        }
    }
}

impl Error for DecodeError {}
