//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `relstore_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use relstore_core::{
    ColumnDef, EngineConfig, Record, RepoError, ScalarType, SqlRepository, TableMapping, Value,
};

fn main() {
    println!("relstore_core ping={}", relstore_core::ping());
    println!("relstore_core version={}", relstore_core::core_version());

    match smoke() {
        Ok(line) => println!("{line}"),
        Err(err) => {
            eprintln!("smoke check failed: {err}");
            std::process::exit(1);
        }
    }
}

// Exercises one full insert/read cycle against an in-memory engine so a
// broken core shows up before any real wiring does.
fn smoke() -> Result<String, RepoError> {
    let mapping = TableMapping::new(
        "users",
        vec![
            ColumnDef::surrogate_key("id"),
            ColumnDef::required("name", ScalarType::Text),
            ColumnDef::required("password", ScalarType::Text),
        ],
    )?;
    let repo = SqlRepository::connect(&EngineConfig::SqliteMemory, mapping)?;

    let mut record = Record::new();
    record.insert("name".to_string(), Value::from("smoke"));
    record.insert("password".to_string(), Value::from("check"));

    let stored = repo.insert(&record)?;
    let id = match stored.get("id") {
        Some(Value::Integer(id)) => *id,
        _ => return Err(RepoError::SchemaMismatch("missing id after insert".into())),
    };
    let loaded = repo.find_by_id(id)?;

    Ok(format!(
        "relstore_core smoke table=users id={id} fields={}",
        loaded.len()
    ))
}
