mod common;

use common::Harness;
use libsql_bridge::prelude::*;

const FILL: &str = "INSERT INTO n (v) \
    WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 1000) \
    SELECT x FROM c";

fn filled(h: &Harness) -> Result<ResourceId, BridgeError> {
    let conn = h.open("n.db")?;
    h.bridge.query_args(&conn, "CREATE TABLE n (v INTEGER NOT NULL)", &[])?;
    h.bridge.query_args(&conn, FILL, &[])?;
    Ok(conn)
}

fn page_sum(rows: &[Vec<RowValues>]) -> i64 {
    rows.iter().filter_map(|r| r[0].as_int()).sum()
}

#[test]
fn test5_cursor_pages_through_everything() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = filled(&h)?;
    let cursor = h.bridge.declare_cursor(&conn, "SELECT v FROM n ORDER BY v", &[])?;

    let mut sizes = Vec::new();
    let mut total = 0;
    loop {
        let page = h.bridge.fetch_cursor(&cursor, &conn, Some(300))?;
        sizes.push(page.rows.len());
        total += page_sum(&page.rows);
        if page.exhausted {
            break;
        }
        assert_eq!(h.bridge.cursor_position(&cursor, &conn)?, (sizes.len() * 300) as u64);
    }

    assert_eq!(sizes, vec![300, 300, 300, 100]);
    assert_eq!(total, 500_500);
    assert!(h.bridge.fetch_cursor(&cursor, &conn, None).unwrap_err().is_not_found());
    assert_eq!(h.bridge.resource_counts()?.cursors, 0);
    Ok(())
}

#[test]
fn test5_exact_multiple_reports_exhaustion_on_last_page()
-> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = filled(&h)?;
    let cursor = h.bridge.declare_cursor(&conn, "SELECT v FROM n", &[])?;

    let first = h.bridge.fetch_cursor(&cursor, &conn, None)?;
    assert_eq!(first.rows.len(), 500);
    assert!(!first.exhausted);
    let second = h.bridge.fetch_cursor(&cursor, &conn, None)?;
    assert_eq!(second.rows.len(), 500);
    assert!(second.exhausted);
    Ok(())
}

#[test]
fn test5_empty_result_and_bad_batch_size() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = filled(&h)?;
    let cursor = h.bridge.declare_cursor(
        &conn,
        "SELECT v FROM n WHERE v > ?1",
        &[RowValues::Int(5_000)],
    )?;

    assert!(matches!(
        h.bridge.fetch_cursor(&cursor, &conn, Some(0)),
        Err(BridgeError::InvalidArgument(_))
    ));
    let page = h.bridge.fetch_cursor(&cursor, &conn, Some(10))?;
    assert!(page.rows.is_empty());
    assert!(page.exhausted);
    assert_eq!(page.columns.as_slice(), ["v".to_string()]);
    Ok(())
}

#[test]
fn test5_cursor_inside_transaction_sees_uncommitted_rows()
-> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = filled(&h)?;
    let txn = h.bridge.begin(&conn)?;
    h.bridge.execute_in_transaction(&txn, &conn, "DELETE FROM n WHERE v > 10", &[])?;

    let cursor = h.bridge.declare_cursor_in_transaction(&txn, &conn, "SELECT v FROM n", &[])?;
    let page = h.bridge.fetch_cursor(&cursor, &conn, Some(100))?;
    assert_eq!(page.rows.len(), 10);
    assert!(page.exhausted);

    h.bridge.rollback(&txn, &conn)?;
    assert_eq!(h.count(&conn, "n")?, 1000);
    Ok(())
}

#[test]
fn test5_early_deallocate() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = filled(&h)?;
    let cursor = h.bridge.declare_cursor(&conn, "SELECT v FROM n", &[])?;
    h.bridge.fetch_cursor(&cursor, &conn, Some(1))?;
    h.bridge.deallocate_cursor(&cursor, &conn)?;
    assert!(h.bridge.fetch_cursor(&cursor, &conn, Some(1)).unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test5_row_error_after_a_full_page_is_reported_on_the_next_fetch()
-> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open("e.db")?;
    // abs() of the smallest integer fails on the 11th row only
    let cursor = h.bridge.declare_cursor(
        &conn,
        "WITH RECURSIVE s(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM s WHERE x < 20) \
         SELECT CASE WHEN x = 11 THEN abs(x - 11 - 9223372036854775807 - 1) ELSE x END AS v \
         FROM s",
        &[],
    )?;

    let page = h.bridge.fetch_cursor(&cursor, &conn, Some(10))?;
    assert_eq!(page.rows.len(), 10);
    assert!(!page.exhausted);
    assert_eq!(page_sum(&page.rows), 55);
    assert_eq!(h.bridge.cursor_position(&cursor, &conn)?, 10);

    let failed = h.bridge.fetch_cursor(&cursor, &conn, Some(10)).unwrap_err();
    assert!(matches!(failed, BridgeError::Native(_)));
    assert!(h.bridge.fetch_cursor(&cursor, &conn, Some(10)).unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test5_row_error_with_nothing_read_fails_that_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open("e.db")?;
    let cursor = h.bridge.declare_cursor(
        &conn,
        "WITH RECURSIVE s(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM s WHERE x < 5) \
         SELECT CASE WHEN x = 1 THEN abs(x - 1 - 9223372036854775807 - 1) ELSE x END AS v \
         FROM s",
        &[],
    )?;
    let failed = h.bridge.fetch_cursor(&cursor, &conn, Some(10)).unwrap_err();
    assert!(matches!(failed, BridgeError::Native(_)));
    assert_eq!(h.bridge.resource_counts()?.cursors, 0);
    Ok(())
}
