mod common;

use common::Harness;
use libsql_bridge::prelude::*;

fn five_with_third_failing() -> Vec<QueryAndParams> {
    let insert = |id: i64| {
        QueryAndParams::new(
            "INSERT INTO t (id, name) VALUES (?1, ?2)",
            vec![RowValues::Int(id), RowValues::Text(format!("n{id}"))],
        )
    };
    vec![
        insert(1),
        insert(2),
        QueryAndParams::new_without_params("INSERT INTO missing_table VALUES (3)"),
        insert(4),
        insert(5),
    ]
}

fn stored_ids(h: &Harness, conn: &str) -> Result<Vec<i64>, BridgeError> {
    let result = h.bridge.query_args(conn, "SELECT id FROM t ORDER BY id", &[])?;
    Ok(result.rows.iter().filter_map(|r| r[0].as_int().copied()).collect())
}

#[test]
fn test6_independent_batch_keeps_going() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    let results = h.bridge.batch(&conn, &five_with_third_failing())?;
    assert_eq!(results.len(), 5);
    assert!(matches!(results[2], Err(BridgeError::Native(_))));
    for idx in [0, 1, 3, 4] {
        assert_eq!(results[idx].as_ref().map(|r| r.row_count).ok(), Some(1), "{idx}");
    }
    assert_eq!(stored_ids(&h, &conn)?, vec![1, 2, 4, 5]);
    Ok(())
}

#[test]
fn test6_atomic_batch_rolls_everything_back() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    let err = h.bridge.batch_atomic(&conn, &five_with_third_failing()).unwrap_err();
    match err {
        BridgeError::BatchStatement { index, source } => {
            assert_eq!(index, 2);
            assert!(matches!(*source, BridgeError::Native(_)));
        }
        other => panic!("expected BatchStatement, got {other:?}"),
    }
    assert!(stored_ids(&h, &conn)?.is_empty());
    assert!(h.bridge.is_autocommit(&conn)?);

    let mut ok = five_with_third_failing();
    ok.remove(2);
    let results = h.bridge.batch_atomic(&conn, &ok)?;
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.row_count == 1));
    assert_eq!(stored_ids(&h, &conn)?, vec![1, 2, 4, 5]);
    Ok(())
}

#[test]
fn test6_sql_script_reports_rows_per_statement() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    let results = h.bridge.batch_sql(
        &conn,
        "INSERT INTO t (id, name) VALUES (1, 'a');
         INSERT INTO t (id, name) VALUES (2, 'b');
         SELECT count(*) AS n FROM t;",
    )?;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_none());
    assert!(results[1].is_none());
    let counted = results[2].as_ref().and_then(|r| r.get(0, "n"));
    assert_eq!(counted, Some(&RowValues::Int(2)));
    Ok(())
}

#[test]
fn test6_sql_script_stops_at_first_failure() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    let err = h
        .bridge
        .batch_sql(
            &conn,
            "INSERT INTO t (id, name) VALUES (1, 'a');
             INSERT INTO missing_table VALUES (2);
             INSERT INTO t (id, name) VALUES (3, 'c');",
        )
        .unwrap_err();
    assert!(matches!(err, BridgeError::Native(_)));
    assert_eq!(stored_ids(&h, &conn)?, vec![1]);
    Ok(())
}

#[test]
fn test6_atomic_sql_script_is_all_or_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    let err = h
        .bridge
        .batch_sql_atomic(
            &conn,
            "INSERT INTO t (id, name) VALUES (1, 'a');
             INSERT INTO t (id, name) VALUES (2, 'b');
             INSERT INTO missing_table VALUES (3);",
        )
        .unwrap_err();
    assert!(matches!(err, BridgeError::Native(_)));
    assert!(stored_ids(&h, &conn)?.is_empty());
    assert!(h.bridge.is_autocommit(&conn)?);

    let nested = h
        .bridge
        .batch_sql_atomic(&conn, "BEGIN; INSERT INTO t (id, name) VALUES (9, 'z');")
        .unwrap_err();
    assert!(matches!(nested, BridgeError::Native(_)));
    assert!(h.bridge.is_autocommit(&conn)?);

    h.bridge.batch_sql_atomic(
        &conn,
        "INSERT INTO t (id, name) VALUES (1, 'a');
         INSERT INTO t (id, name) VALUES (2, 'b');",
    )?;
    assert_eq!(stored_ids(&h, &conn)?, vec![1, 2]);
    Ok(())
}
