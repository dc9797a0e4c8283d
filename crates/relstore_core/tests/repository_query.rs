use relstore_core::{
    ColumnDef, Criteria, Criterion, EngineConfig, Page, QueryError, Record, RepoError, ScalarType,
    Sort, SqlRepository, TableMapping, Value,
};

fn people_mapping() -> TableMapping {
    TableMapping::new(
        "people",
        vec![
            ColumnDef::surrogate_key("id"),
            ColumnDef::required("name", ScalarType::Text),
            ColumnDef::nullable("age", ScalarType::Integer),
        ],
    )
    .unwrap()
}

fn memory_repo() -> SqlRepository {
    SqlRepository::connect(&EngineConfig::SqliteMemory, people_mapping()).unwrap()
}

fn person(name: &str, age: Option<i64>) -> Record {
    let mut record = Record::new();
    record.insert("name".to_string(), Value::from(name));
    if let Some(age) = age {
        record.insert("age".to_string(), Value::Integer(age));
    }
    record
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| match record.get("name") {
            Some(Value::Text(name)) => name.clone(),
            other => panic!("expected text name, got {other:?}"),
        })
        .collect()
}

#[test]
fn equality_criteria_returns_exactly_the_matching_record() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();
    repo.insert(&person("ana", Some(25))).unwrap();

    let criteria = Criteria::new().with("name", Criterion::Equals(Value::from("jao")));
    let page = Page {
        limit: Some(10),
        offset: 0,
    };
    let found = repo.find(&criteria, &page, None).unwrap();

    assert_eq!(names(&found), vec!["jao"]);
}

#[test]
fn empty_criteria_returns_every_record() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();
    repo.insert(&person("ana", Some(25))).unwrap();

    let found = repo.find(&Criteria::new(), &Page::default(), None).unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
fn no_match_returns_empty_sequence_not_an_error() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();

    let criteria = Criteria::new().with("name", Criterion::Equals(Value::from("nobody")));
    let found = repo.find(&criteria, &Page::default(), None).unwrap();
    assert!(found.is_empty());
}

#[test]
fn range_criteria_filter_on_integer_column() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();
    repo.insert(&person("ana", Some(25))).unwrap();
    repo.insert(&person("rei", Some(40))).unwrap();

    let sort = Sort::ascending("name");

    let older = repo
        .find(
            &Criteria::new().with("age", Criterion::GreaterThan(Value::Integer(26))),
            &Page::default(),
            Some(&sort),
        )
        .unwrap();
    assert_eq!(names(&older), vec!["jao", "rei"]);

    let younger = repo
        .find(
            &Criteria::new().with("age", Criterion::LessThan(Value::Integer(30))),
            &Page::default(),
            None,
        )
        .unwrap();
    assert_eq!(names(&younger), vec!["ana"]);

    let between = repo
        .find(
            &Criteria::new().with(
                "age",
                Criterion::Between(Value::Integer(25), Value::Integer(30)),
            ),
            &Page::default(),
            Some(&sort),
        )
        .unwrap();
    assert_eq!(names(&between), vec!["ana", "jao"]);
}

#[test]
fn not_equals_and_null_criteria() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();
    repo.insert(&person("ana", None)).unwrap();

    let not_jao = repo
        .find(
            &Criteria::new().with("name", Criterion::NotEquals(Value::from("jao"))),
            &Page::default(),
            None,
        )
        .unwrap();
    assert_eq!(names(&not_jao), vec!["ana"]);

    let unknown_age = repo
        .find(
            &Criteria::new().with("age", Criterion::Equals(Value::Null)),
            &Page::default(),
            None,
        )
        .unwrap();
    assert_eq!(names(&unknown_age), vec!["ana"]);

    let known_age = repo
        .find(
            &Criteria::new().with("age", Criterion::NotEquals(Value::Null)),
            &Page::default(),
            None,
        )
        .unwrap();
    assert_eq!(names(&known_age), vec!["jao"]);
}

#[test]
fn sorted_pagination_is_stable() {
    let repo = memory_repo();
    for name in ["delta", "alpha", "echo", "bravo", "charlie"] {
        repo.insert(&person(name, None)).unwrap();
    }
    let sort = Sort::ascending("name");

    let first = repo
        .find(
            &Criteria::new(),
            &Page {
                limit: Some(2),
                offset: 0,
            },
            Some(&sort),
        )
        .unwrap();
    assert_eq!(names(&first), vec!["alpha", "bravo"]);

    let second = repo
        .find(
            &Criteria::new(),
            &Page {
                limit: Some(2),
                offset: 2,
            },
            Some(&sort),
        )
        .unwrap();
    assert_eq!(names(&second), vec!["charlie", "delta"]);

    let rest = repo
        .find(
            &Criteria::new(),
            &Page {
                limit: None,
                offset: 4,
            },
            Some(&sort),
        )
        .unwrap();
    assert_eq!(names(&rest), vec!["echo"]);
}

#[test]
fn descending_sort_reverses_order() {
    let repo = memory_repo();
    repo.insert(&person("ana", Some(25))).unwrap();
    repo.insert(&person("jao", Some(30))).unwrap();

    let found = repo
        .find(
            &Criteria::new(),
            &Page::default(),
            Some(&Sort::descending("name")),
        )
        .unwrap();
    assert_eq!(names(&found), vec!["jao", "ana"]);
}

#[test]
fn unknown_criteria_column_fails_without_querying() {
    let repo = memory_repo();

    let criteria = Criteria::new().with("nickname", Criterion::Equals(Value::from("jj")));
    let err = repo.find(&criteria, &Page::default(), None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::UnknownColumn(column)) if column == "nickname"
    ));
}

#[test]
fn unknown_sort_column_is_rejected() {
    let repo = memory_repo();

    let err = repo
        .find(
            &Criteria::new(),
            &Page::default(),
            Some(&Sort::ascending("height")),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::UnknownColumn(column)) if column == "height"
    ));
}

#[test]
fn criteria_value_of_wrong_type_is_rejected() {
    let repo = memory_repo();

    let criteria = Criteria::new().with("age", Criterion::Equals(Value::from("thirty")));
    let err = repo.find(&criteria, &Page::default(), None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::InvalidValue { column, .. }) if column == "age"
    ));
}

#[test]
fn null_cannot_be_ordered() {
    let repo = memory_repo();

    let criteria = Criteria::new().with("age", Criterion::GreaterThan(Value::Null));
    let err = repo.find(&criteria, &Page::default(), None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::UnorderedNull { column }) if column == "age"
    ));
}

#[test]
fn summary_projects_selected_columns() {
    let repo = memory_repo();
    repo.insert(&person("jao", Some(30))).unwrap();
    repo.insert(&person("ana", Some(25))).unwrap();

    let rows = repo.summary(&["id", "name"], None).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.len(), 2);
        assert!(row.contains_key("id"));
        assert!(row.contains_key("name"));
    }
}

#[test]
fn summary_honors_the_limit() {
    let repo = memory_repo();
    for index in 0..5 {
        repo.insert(&person(&format!("user{index}"), None)).unwrap();
    }

    let rows = repo.summary(&["name"], Some(2)).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn summary_rejects_unknown_and_empty_projections() {
    let repo = memory_repo();

    let err = repo.summary(&["name", "shoe_size"], None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::UnknownColumn(column)) if column == "shoe_size"
    ));

    let err = repo.summary(&[], None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UnsupportedQuery(QueryError::EmptyProjection)
    ));
}
