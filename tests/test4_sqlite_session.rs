#![cfg(feature = "sqlite")]

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde_json::json;
use sql_session::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i64,
    last_name: String,
    age: Option<i64>,
}

impl TypeBinding for Person {
    fn slot_count() -> usize {
        3
    }

    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        self.id.write_to(out)?;
        self.last_name.write_to(out)?;
        self.age.write_to(out)
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        Ok(Person {
            id: i64::read_from(&columns[0..1])?,
            last_name: String::read_from(&columns[1..2])?,
            age: Option::<i64>::read_from(&columns[2..3])?,
        })
    }
}

impl KeyExtract for Person {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }
}

async fn memory_session() -> Result<Session, SqlSessionError> {
    Session::sqlite_builder(":memory:".to_string()).build().await
}

#[tokio::test]
async fn dummy_table_is_read_in_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;
    session
        .compose("CREATE TABLE dummy (id INTEGER PRIMARY KEY)")
        .execute_now()
        .await?;

    let ids: Vec<i64> = (1..=100).collect();
    session.begin().await?;
    session
        .compose("INSERT INTO dummy (id) VALUES (?)")
        .bind(use_all(&ids))
        .execute_now()
        .await?;
    session.commit().await?;

    let seen = Mutex::new(BTreeSet::<i64>::new());
    let mut stmt = session
        .compose("SELECT id FROM dummy ORDER BY id")
        .bind(into_shared(&seen))
        .limit(Limit::new(50))
        .build()?;

    assert_eq!(stmt.execute().await?, 50);
    assert_eq!(seen.lock().unwrap().len(), 50);
    assert!(!stmt.is_done());

    assert_eq!(stmt.execute().await?, 50);
    assert_eq!(seen.lock().unwrap().len(), 100);
    assert!(stmt.is_done());

    // A fresh run over the same rows leaves the set unchanged.
    assert_eq!(stmt.execute_all().await?, 100);
    stmt.close().await?;
    assert_eq!(seen.lock().unwrap().iter().next_back(), Some(&100));
    Ok(())
}

#[tokio::test]
async fn aggregates_round_trip_through_named_placeholders()
-> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;
    session
        .compose("CREATE TABLE person (id INTEGER PRIMARY KEY, last_name TEXT NOT NULL, age INTEGER)")
        .execute_now()
        .await?;

    let people = vec![
        Person {
            id: 1,
            last_name: "Ode".into(),
            age: Some(40),
        },
        Person {
            id: 2,
            last_name: "Kim".into(),
            age: None,
        },
    ];
    session
        .compose("INSERT INTO person (id, last_name, age) VALUES (:id, :last_name, :age)")
        .bind(use_all(&people))
        .execute_now()
        .await?;

    let mut by_id: HashMap<i64, Person> = HashMap::new();
    session
        .compose("SELECT id, last_name, age FROM person")
        .bind(into_all(&mut by_id))
        .execute_now()
        .await?;
    assert_eq!(by_id.len(), 2);
    assert_eq!(by_id[&2].age, None);
    assert_eq!(by_id[&1], people[0]);

    let (min_age, mut name) = (30_i64, String::new());
    session
        .compose("SELECT last_name FROM person WHERE age > :min_age")
        .bind(use_value(&min_age).named("min_age"))
        .bind(into_value(&mut name))
        .execute_now()
        .await?;
    assert_eq!(name, "Ode");
    Ok(())
}

#[tokio::test]
async fn rollback_discards_changes() -> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;
    session
        .compose("CREATE TABLE t (n INTEGER)")
        .execute_now()
        .await?;

    session.begin().await?;
    let n = 7_i64;
    session
        .compose("INSERT INTO t (n) VALUES (?)")
        .bind(use_value(&n))
        .execute_now()
        .await?;
    session.rollback().await?;

    let mut count = -1_i64;
    session
        .compose("SELECT count(*) FROM t")
        .bind(into_value(&mut count))
        .execute_now()
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn typed_values_survive_storage() -> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;
    session
        .compose("CREATE TABLE typed (flag BOOLEAN, ts TEXT, doc TEXT, score REAL)")
        .execute_now()
        .await?;

    let flag = true;
    let ts = NaiveDateTime::parse_from_str("2024-01-01 08:00:00", "%Y-%m-%d %H:%M:%S")?;
    let doc = json!({"tags": ["a", "b"]});
    let score = 2.5_f64;
    session
        .compose("INSERT INTO typed VALUES (?, ?, ?, ?)")
        .bind(use_value(&flag))
        .bind(use_value(&ts))
        .bind(use_value(&doc))
        .bind(use_value(&score))
        .execute_now()
        .await?;

    let (mut flag_out, mut ts_out, mut doc_out, mut score_out) =
        (false, NaiveDateTime::default(), serde_json::Value::Null, 0.0_f64);
    session
        .compose("SELECT flag, ts, doc, score FROM typed")
        .bind(into_value(&mut flag_out))
        .bind(into_value(&mut ts_out))
        .bind(into_value(&mut doc_out))
        .bind(into_value(&mut score_out))
        .execute_now()
        .await?;
    assert!(flag_out);
    assert_eq!(ts_out, ts);
    assert_eq!(doc_out, doc);
    assert!((score_out - 2.5).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn capabilities_configure_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;

    assert!(!session.get_feature("foreign_keys").await?);
    session.set_feature("foreign_keys", true).await?;
    assert!(session.get_feature("foreign_keys").await?);

    let mut enforced = 0_i64;
    session
        .compose("PRAGMA foreign_keys")
        .bind(into_value(&mut enforced))
        .execute_now()
        .await?;
    assert_eq!(enforced, 1);

    session
        .set_property("busy_timeout", RowValues::Int(250))
        .await?;
    assert_eq!(
        session.get_property("busy_timeout").await?,
        RowValues::Int(250)
    );
    assert!(matches!(
        session.get_property("sqlite_version").await?,
        RowValues::Text(_)
    ));
    assert!(matches!(
        session
            .set_property("sqlite_version", RowValues::Text("0".into()))
            .await,
        Err(SqlSessionError::UnsupportedCapability(_))
    ));
    assert!(matches!(
        session.get_feature("nonexistent").await,
        Err(SqlSessionError::UnsupportedCapability(_))
    ));
    Ok(())
}

#[tokio::test]
async fn numbered_and_prefixed_parameters_bind_their_own_slots()
-> Result<(), Box<dyn std::error::Error>> {
    let session = memory_session().await?;

    let (ten, three, mut difference) = (10_i64, 3_i64, 0_i64);
    session
        .compose("SELECT $2 - $1")
        .bind(use_value(&ten).at(0))
        .bind(use_value(&three).at(1))
        .bind(into_value(&mut difference))
        .execute_now()
        .await?;
    assert_eq!(difference, -7);

    let (five, mut sum) = (5_i64, None::<i64>);
    session
        .compose("SELECT :a + @a")
        .bind(use_value(&five))
        .bind(into_value(&mut sum))
        .execute_now()
        .await?;
    assert_eq!(sum, Some(10));

    let mut first = 0_i64;
    session
        .compose("SELECT ?2 * 100 + ?1")
        .bind(use_value(&ten))
        .bind(use_value(&three))
        .bind(into_value(&mut first))
        .execute_now()
        .await?;
    assert_eq!(first, 310);
    Ok(())
}

#[tokio::test]
async fn transactions_opened_by_statements_are_tracked() -> Result<(), Box<dyn std::error::Error>>
{
    let session = memory_session().await?;
    session
        .compose("CREATE TABLE t (n INTEGER)")
        .execute_now()
        .await?;

    session.compose("BEGIN").execute_now().await?;
    assert!(session.is_transaction().await?);
    assert!(matches!(
        session.begin().await,
        Err(SqlSessionError::TransactionState(_))
    ));
    session
        .compose("INSERT INTO t (n) VALUES (1)")
        .execute_now()
        .await?;
    session.commit().await?;
    assert!(!session.is_transaction().await?);

    session.begin().await?;
    session.compose("ROLLBACK").execute_now().await?;
    assert!(!session.is_transaction().await?);
    assert!(matches!(
        session.rollback().await,
        Err(SqlSessionError::TransactionState(_))
    ));

    let mut count = 0_i64;
    session
        .compose("SELECT count(*) FROM t")
        .bind(into_value(&mut count))
        .execute_now()
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test]
async fn null_busy_timeout_restores_the_default() -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::sqlite_builder(":memory:".to_string())
        .busy_timeout_ms(50)
        .build()
        .await?;
    assert_eq!(
        session.get_property("busy_timeout").await?,
        RowValues::Int(50)
    );
    session.set_property("busy_timeout", RowValues::Null).await?;
    assert_eq!(
        session.get_property("busy_timeout").await?,
        RowValues::Int(5_000)
    );
    assert!(matches!(
        session
            .set_property("busy_timeout", RowValues::Int(-1))
            .await,
        Err(SqlSessionError::ParameterError(_))
    ));
    Ok(())
}

#[tokio::test]
async fn file_database_is_shared_between_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shared.db").to_string_lossy().into_owned();

    SqliteConnector::register();
    let mut writer = Session::connect("sqlite", &path).await?;
    writer
        .compose("CREATE TABLE t (n INTEGER)")
        .execute_now()
        .await?;
    let values = vec![1_i64, 2, 3];
    writer
        .compose("INSERT INTO t (n) VALUES (?)")
        .bind(use_all(&values))
        .execute_now()
        .await?;
    writer.close().await?;

    let mut reader = Session::sqlite_builder(path.clone())
        .busy_timeout_ms(100)
        .build()
        .await?;
    let mut read: Vec<i64> = Vec::new();
    reader
        .compose("SELECT n FROM t ORDER BY n")
        .bind(into_all(&mut read))
        .execute_now()
        .await?;
    assert_eq!(read, values);
    reader.close().await?;

    assert!(matches!(
        Session::connect("sqlite", "").await,
        Err(SqlSessionError::ConnectionError(_))
    ));
    Ok(())
}
