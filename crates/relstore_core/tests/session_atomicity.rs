use relstore_core::{
    with_session, ColumnDef, EngineConfig, Record, RepoError, ScalarType, SqlRepository,
    TableMapping, Value,
};

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

fn memory_repo() -> SqlRepository {
    SqlRepository::connect(&EngineConfig::SqliteMemory, users_mapping()).unwrap()
}

fn user(name: &str, password: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".to_string(), Value::from(name));
    record.insert("password".to_string(), Value::from(password));
    record
}

#[test]
fn body_failure_after_a_write_rolls_everything_back() {
    let repo = memory_repo();
    let stored = repo.insert(&user("jao", "batata")).unwrap();
    let id = match stored.get("id") {
        Some(Value::Integer(id)) => *id,
        other => panic!("expected integer id, got {other:?}"),
    };

    // Simulated engine failure after a partial write: the update lands,
    // then the unit of work fails before commit.
    let result: Result<(), RepoError> = with_session(repo.engine(), |session| {
        let changed = session.execute(
            "UPDATE users SET name = ?1 WHERE id = ?2",
            &[Value::from("mutated"), Value::Integer(id)],
        )?;
        assert_eq!(changed, 1);
        Err(RepoError::SchemaMismatch("simulated failure".to_string()))
    });
    assert!(matches!(result, Err(RepoError::SchemaMismatch(_))));

    // The pre-update record is what later calls observe.
    let loaded = repo.find_by_id(id).unwrap();
    assert_eq!(loaded.get("name"), Some(&Value::from("jao")));
}

#[test]
fn body_success_commits_and_is_visible_to_later_calls() {
    let repo = memory_repo();
    repo.insert(&user("jao", "batata")).unwrap();

    with_session(repo.engine(), |session| {
        session.execute(
            "INSERT INTO users (name, password) VALUES (?1, ?2)",
            &[Value::from("ana"), Value::from("s3cret")],
        )?;
        Ok(())
    })
    .unwrap();

    assert_eq!(repo.count().unwrap(), 2);
}

#[test]
fn failed_unit_of_work_leaves_the_session_slot_clean() {
    let repo = memory_repo();
    repo.insert(&user("jao", "batata")).unwrap();

    let result: Result<(), RepoError> = with_session(repo.engine(), |_session| {
        Err(RepoError::SchemaMismatch("aborted before any write".to_string()))
    });
    assert!(result.is_err());

    // The shared in-memory connection accepts a fresh transaction; no
    // dangling session or open transaction remains.
    repo.insert(&user("ana", "s3cret")).unwrap();
    assert_eq!(repo.count().unwrap(), 2);
}

#[test]
fn failed_insert_has_no_effect_at_all() {
    let repo = memory_repo();
    repo.insert(&user("jao", "batata")).unwrap();

    // Violates the NOT NULL constraint at the engine level, bypassing
    // record validation on purpose.
    let result: Result<(), RepoError> = with_session(repo.engine(), |session| {
        session.execute(
            "INSERT INTO users (name) VALUES (?1)",
            &[Value::from("half-written")],
        )?;
        Ok(())
    });
    assert!(matches!(result, Err(RepoError::PersistenceFailure(_))));

    assert_eq!(repo.count().unwrap(), 1);
}
