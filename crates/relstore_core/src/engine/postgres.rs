//! Networked PostgreSQL engine.
//!
//! # Responsibility
//! - Hold connection parameters and connect lazily, one client per
//!   session, so an unreachable server fails on first use only.
//! - Bridge scalar values to postgres parameters and decode rows by
//!   declared column type.

use super::{Dialect, Engine, EngineError, EngineResult, NativeRow, Session};
use crate::record::Value;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls, Row};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PostgresEngine {
    config: Config,
}

impl PostgresEngine {
    pub fn new(host: &str, port: u16, username: &str, password: &str, dbname: &str) -> Self {
        let mut config = Config::new();
        config
            .host(host)
            .port(port)
            .user(username)
            .password(password)
            .dbname(dbname)
            .connect_timeout(CONNECT_TIMEOUT);
        Self { config }
    }
}

impl Engine for PostgresEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn open_session(&self) -> EngineResult<Box<dyn Session + '_>> {
        let client = self.config.connect(NoTls)?;
        Ok(Box::new(PostgresSession { client }))
    }
}

pub struct PostgresSession {
    client: Client,
}

impl Session for PostgresSession {
    fn begin(&mut self) -> EngineResult<()> {
        self.client.batch_execute("BEGIN;")?;
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.client.batch_execute("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.client.batch_execute("ROLLBACK;")?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> EngineResult<u64> {
        let owned = bind(params);
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(Box::as_ref).collect();
        let changed = self.client.execute(sql, &refs)?;
        Ok(changed)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> EngineResult<Vec<NativeRow>> {
        let owned = bind(params);
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(Box::as_ref).collect();
        let rows = self.client.query(sql, &refs)?;
        rows.iter().map(decode_row).collect()
    }

    fn insert_returning_id(&mut self, sql: &str, params: &[Value]) -> EngineResult<i64> {
        let owned = bind(params);
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(Box::as_ref).collect();
        let rows = self.client.query(sql, &refs)?;
        let row = rows.first().ok_or_else(|| EngineError::ValueOutOfModel {
            column: "<returning>".to_string(),
            found: "no row from RETURNING clause".to_string(),
        })?;
        let id: i64 = row.try_get(0)?;
        Ok(id)
    }
}

// The statement builders never bind Null (they emit IS NULL / literal
// NULL instead), so the Null arm exists only to keep this total.
fn bind(params: &[Value]) -> Vec<Box<dyn ToSql + Sync>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync> {
            match value {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(v) => Box::new(*v),
                Value::Integer(v) => Box::new(*v),
                Value::Real(v) => Box::new(*v),
                Value::Text(v) => Box::new(v.clone()),
            }
        })
        .collect()
}

fn decode_row(row: &Row) -> EngineResult<NativeRow> {
    let mut native = NativeRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = match column.type_().name() {
            "bool" => row
                .try_get::<_, Option<bool>>(index)?
                .map_or(Value::Null, Value::Bool),
            "int2" => row
                .try_get::<_, Option<i16>>(index)?
                .map_or(Value::Null, |v| Value::Integer(v.into())),
            "int4" => row
                .try_get::<_, Option<i32>>(index)?
                .map_or(Value::Null, |v| Value::Integer(v.into())),
            "int8" => row
                .try_get::<_, Option<i64>>(index)?
                .map_or(Value::Null, Value::Integer),
            "float4" => row
                .try_get::<_, Option<f32>>(index)?
                .map_or(Value::Null, |v| Value::Real(v.into())),
            "float8" => row
                .try_get::<_, Option<f64>>(index)?
                .map_or(Value::Null, Value::Real),
            "text" | "varchar" | "bpchar" => row
                .try_get::<_, Option<String>>(index)?
                .map_or(Value::Null, Value::Text),
            other => {
                return Err(EngineError::ValueOutOfModel {
                    column: name,
                    found: other.to_string(),
                });
            }
        };
        native.insert(name, value);
    }
    Ok(native)
}
