use relstore_core::{
    ColumnDef, ConfigError, EngineConfig, Record, RepoError, ScalarType, SqlRepository,
    TableMapping, Value,
};
use std::collections::BTreeMap;

fn users_mapping() -> TableMapping {
    TableMapping::new(
        "users",
        vec![
            ColumnDef::surrogate_key("id"),
            ColumnDef::required("name", ScalarType::Text),
            ColumnDef::required("password", ScalarType::Text),
        ],
    )
    .unwrap()
}

fn user(name: &str, password: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".to_string(), Value::from(name));
    record.insert("password".to_string(), Value::from(password));
    record
}

fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn unknown_engine_fails_before_any_table_access() {
    let err = EngineConfig::from_options(&options(&[("engine", "unknown_engine")])).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownEngine(engine) if engine == "unknown_engine"));
}

#[test]
fn engine_option_is_mandatory() {
    let err = EngineConfig::from_options(&options(&[("path", "/tmp/db")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingOption { option: "engine", .. }
    ));
}

#[test]
fn engine_identifier_is_case_insensitive() {
    let config = EngineConfig::from_options(&options(&[("engine", " SQLITE_MEMORY ")])).unwrap();
    assert_eq!(config, EngineConfig::SqliteMemory);
}

#[test]
fn sqlite_file_requires_a_path() {
    let err = EngineConfig::from_options(&options(&[("engine", "sqlite_file")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingOption {
            engine: "sqlite_file",
            option: "path",
        }
    ));
}

#[test]
fn postgres_requires_every_connection_parameter() {
    let err = EngineConfig::from_options(&options(&[
        ("engine", "postgres"),
        ("host", "localhost"),
        ("port", "5432"),
        ("username", "svc"),
        ("password", "secret"),
    ]))
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingOption {
            engine: "postgres",
            option: "dbname",
        }
    ));
}

#[test]
fn postgres_rejects_a_malformed_port() {
    let err = EngineConfig::from_options(&options(&[
        ("engine", "postgres"),
        ("host", "localhost"),
        ("port", "not-a-port"),
        ("username", "svc"),
        ("password", "secret"),
        ("dbname", "app"),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOption { option: "port", .. }));
}

#[test]
fn recognized_options_build_a_full_postgres_config() {
    let config = EngineConfig::from_options(&options(&[
        ("engine", "postgres"),
        ("host", "db.internal"),
        ("port", "5433"),
        ("username", "svc"),
        ("password", "secret"),
        ("dbname", "app"),
    ]))
    .unwrap();

    assert_eq!(
        config,
        EngineConfig::Postgres {
            host: "db.internal".to_string(),
            port: 5433,
            username: "svc".to_string(),
            password: "secret".to_string(),
            dbname: "app".to_string(),
        }
    );
    assert_eq!(config.engine_name(), "postgres");
}

#[test]
fn engine_config_serde_round_trip() {
    let config = EngineConfig::SqliteFile {
        path: "/var/lib/app/data.db".to_string(),
    };

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"engine\":\"sqlite_file\""));

    let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn memory_engines_do_not_share_a_backing_store() {
    let first = SqlRepository::connect(&EngineConfig::SqliteMemory, users_mapping()).unwrap();
    let second = SqlRepository::connect(&EngineConfig::SqliteMemory, users_mapping()).unwrap();

    first.insert(&user("jao", "batata")).unwrap();

    assert_eq!(first.count().unwrap(), 1);
    assert_eq!(second.count().unwrap(), 0);
}

#[test]
fn file_engine_resolve_is_idempotent_over_the_same_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("store.db")
        .to_str()
        .unwrap()
        .to_string();
    let config = EngineConfig::SqliteFile { path };

    let first = SqlRepository::connect(&config, users_mapping()).unwrap();
    let stored = first.insert(&user("jao", "batata")).unwrap();
    drop(first);

    // A second resolve over the identical configuration sees the same
    // rows; nothing is duplicated or recreated.
    let second = SqlRepository::connect(&config, users_mapping()).unwrap();
    assert_eq!(second.count().unwrap(), 1);

    let id = match stored.get("id") {
        Some(Value::Integer(id)) => *id,
        other => panic!("expected integer id, got {other:?}"),
    };
    let loaded = second.find_by_id(id).unwrap();
    assert_eq!(loaded.get("name"), Some(&Value::from("jao")));
}

#[test]
fn unreachable_postgres_fails_on_first_use_not_at_construction() {
    let config = EngineConfig::Postgres {
        host: "127.0.0.1".to_string(),
        // Discard port: nothing listens here, so the connect attempt
        // fails immediately instead of hanging.
        port: 9,
        username: "svc".to_string(),
        password: "secret".to_string(),
        dbname: "app".to_string(),
    };

    let repo = SqlRepository::connect(&config, users_mapping())
        .expect("construction must not reach the network");

    let err = repo.find_by_id(1).unwrap_err();
    assert!(matches!(err, RepoError::PersistenceFailure(_)));
}
