use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use sql_session::prelude::*;
use sql_session::test_utils::{BackendCall, ScriptHandle, ScriptedBackend};

fn scripted() -> (Session, ScriptHandle) {
    let backend = ScriptedBackend::new();
    let handle = backend.handle();
    (Session::new(Box::new(backend)).expect("session"), handle)
}

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i64,
    first_name: String,
    last_name: String,
}

impl TypeBinding for Person {
    fn slot_count() -> usize {
        3
    }

    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        self.id.write_to(out)?;
        self.first_name.write_to(out)?;
        self.last_name.write_to(out)
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        Ok(Person {
            id: i64::read_from(&columns[0..1])?,
            first_name: String::read_from(&columns[1..2])?,
            last_name: String::read_from(&columns[2..3])?,
        })
    }
}

impl KeyExtract for Person {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }
}

#[tokio::test]
async fn unequal_collections_fail_before_any_backend_call() {
    let (session, handle) = scripted();
    let (ids, names) = (vec![1_i64, 2, 3], vec!["a", "b", "c", "d"]);
    let names: Vec<String> = names.into_iter().map(String::from).collect();

    let err = session
        .compose("INSERT INTO t (id, name) VALUES (?, ?)")
        .bind(use_all(&ids))
        .bind(use_all(&names))
        .execute_now()
        .await
        .unwrap_err();

    assert!(matches!(err, SqlSessionError::BindingMismatch(_)));
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn empty_collection_is_always_a_binding_error() {
    let (session, handle) = scripted();
    let empty: HashSet<i64> = HashSet::new();

    let err = session
        .compose("DELETE FROM t WHERE id = ?")
        .bind(use_all(&empty))
        .execute_now()
        .await
        .unwrap_err();

    assert!(matches!(err, SqlSessionError::BindingError(_)));
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn slot_count_must_match_placeholders() {
    let (session, handle) = scripted();
    let one = 1_i64;

    let err = session
        .compose("UPDATE t SET a = ? WHERE b = ?")
        .bind(use_value(&one))
        .execute_now()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::BindingMismatch(_)));

    let err = session
        .compose("UPDATE t SET a = :a")
        .bind(use_value(&one).named("b"))
        .execute_now()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::BindingMismatch(_)));
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn mixed_placeholder_styles_are_rejected() {
    let (session, _handle) = scripted();
    let (a, b) = (1_i64, 2_i64);
    let err = session
        .compose("SELECT ?1, ?")
        .bind(use_value(&a))
        .bind(use_value(&b))
        .execute_now()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::PlaceholderError(_)));
}

#[tokio::test]
async fn bulk_insert_runs_once_per_element_with_broadcast_scalars()
-> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted();
    let ids = vec![1_i64, 2, 3];
    let batch = String::from("b7");

    let fetched = session
        .compose("INSERT INTO t (id, batch) VALUES (:id, :batch)")
        .bind(use_value(&batch).named(":batch"))
        .bind(use_all(&ids))
        .execute_now()
        .await?;
    assert_eq!(fetched, 0);

    let executions = handle.executions();
    assert_eq!(executions.len(), 3);
    for (expected_id, (_, params)) in ids.iter().zip(&executions) {
        assert_eq!(
            params,
            &vec![RowValues::Int(*expected_id), RowValues::Text("b7".into())]
        );
    }
    assert_eq!(
        handle.count(|call| matches!(call, BackendCall::Prepare { .. })),
        1
    );
    Ok(())
}

#[tokio::test]
async fn aggregate_types_span_several_slots() -> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted();
    let people = BTreeMap::from([
        (
            1,
            Person {
                id: 1,
                first_name: "Pat".into(),
                last_name: "Lee".into(),
            },
        ),
        (
            2,
            Person {
                id: 2,
                first_name: "Sam".into(),
                last_name: "Roe".into(),
            },
        ),
    ]);

    session
        .compose("INSERT INTO person (id, first_name, last_name) VALUES (?, ?, ?)")
        .bind(use_all(people.values()))
        .execute_now()
        .await?;

    let executions = handle.executions();
    assert_eq!(executions.len(), 2);
    assert_eq!(
        executions[1].1,
        vec![
            RowValues::Int(2),
            RowValues::Text("Sam".into()),
            RowValues::Text("Roe".into())
        ]
    );
    Ok(())
}

#[tokio::test]
async fn map_targets_are_keyed_by_extracted_key() -> Result<(), Box<dyn std::error::Error>> {
    let sql = "SELECT id, first_name, last_name FROM person";
    let row = |id: i64, first: &str, last: &str| {
        vec![
            RowValues::Int(id),
            RowValues::Text(first.into()),
            RowValues::Text(last.into()),
        ]
    };
    let backend = ScriptedBackend::new().with_rows(
        sql,
        &["id", "first_name", "last_name"],
        vec![row(5, "Ann", "Ode"), row(3, "Bo", "Kim")],
    );
    let session = Session::new(Box::new(backend))?;

    let mut by_id: BTreeMap<i64, Person> = BTreeMap::new();
    session
        .compose(sql)
        .bind(into_all(&mut by_id))
        .execute_now()
        .await?;

    assert_eq!(by_id.keys().copied().collect::<Vec<_>>(), vec![3, 5]);
    assert_eq!(by_id[&5].first_name, "Ann");
    Ok(())
}

#[tokio::test]
async fn missing_result_columns_are_a_mismatch() {
    let sql = "SELECT id FROM person";
    let backend = ScriptedBackend::new().with_rows(sql, &["id"], vec![vec![RowValues::Int(1)]]);
    let session = Session::new(Box::new(backend)).expect("session");

    let mut people: Vec<Person> = Vec::new();
    let err = session
        .compose(sql)
        .bind(into_all(&mut people))
        .execute_now()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::BindingMismatch(_)));
}

#[tokio::test]
async fn mutex_inputs_are_reread_on_every_execution() -> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted();
    let counter = Mutex::new(0_i64);

    let mut stmt = session
        .compose("INSERT INTO t (n) VALUES (?)")
        .bind(use_value(&counter))
        .build()?;
    for n in 1..=3 {
        *counter.lock().unwrap() = n * 10;
        stmt.execute().await?;
    }
    stmt.close().await?;

    let params: Vec<Vec<RowValues>> = handle.executions().into_iter().map(|(_, p)| p).collect();
    assert_eq!(
        params,
        vec![
            vec![RowValues::Int(10)],
            vec![RowValues::Int(20)],
            vec![RowValues::Int(30)]
        ]
    );
    Ok(())
}

#[tokio::test]
async fn fragments_compose_sql_and_bindings() -> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted();
    let (id, name) = (9_i64, String::from("Zed"));

    session
        .compose("INSERT INTO person (id, name) ")
        .push("VALUES (")
        .push(String::from(":id, :name)"))
        .push(use_value(&name).named("name"))
        .push(use_value(&id))
        .execute_now()
        .await?;

    let executions = handle.executions();
    assert_eq!(
        executions[0].0,
        "INSERT INTO person (id, name) VALUES (:id, :name)"
    );
    assert_eq!(
        executions[0].1,
        vec![RowValues::Int(9), RowValues::Text("Zed".into())]
    );
    Ok(())
}
