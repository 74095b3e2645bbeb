mod common;

use common::Harness;
use libsql_bridge::prelude::*;

#[test]
fn test1_unknown_ids_are_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open("a.db")?;

    let err = h.bridge.query_args("no-such-conn", "SELECT 1", &[]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::NotFound {
            kind: ResourceKind::Connection,
            id: "no-such-conn".into()
        }
    );
    assert!(h.bridge.commit("no-such-txn", &conn).unwrap_err().is_not_found());
    assert!(h.bridge.execute_statement("no-such-stmt", &conn, &[]).unwrap_err().is_not_found());
    assert!(h.bridge.introspect("no-such-stmt").unwrap_err().is_not_found());
    assert!(h.bridge.fetch_cursor("no-such-cursor", &conn, None).unwrap_err().is_not_found());
    assert!(h.bridge.ping("no-such-conn").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test1_release_operations_are_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;
    let stmt = h.bridge.prepare(&conn, "SELECT id FROM t")?;
    let cursor = h.bridge.declare_cursor(&conn, "SELECT id FROM t", &[])?;

    h.bridge.close_statement(&stmt)?;
    h.bridge.close_statement(&stmt)?;
    h.bridge.deallocate_cursor(&cursor, &conn)?;
    h.bridge.deallocate_cursor(&cursor, &conn)?;
    h.bridge.close(&conn)?;
    h.bridge.close(&conn)?;
    h.bridge.close("never-existed")?;

    assert_eq!(h.bridge.resource_counts()?, ResourceCounts::default());
    Ok(())
}

#[test]
fn test1_ids_are_unique_across_connections() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let a = h.open("a.db")?;
    let b = h.open("a.db")?;
    assert_ne!(a, b);
    assert_eq!(h.bridge.resource_counts()?.connections, 2);
    h.bridge.close(&a)?;
    assert!(h.bridge.ping(&b)?.is_alive());
    Ok(())
}

#[test]
fn test1_connection_info_reflects_options() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let options = ConnectOptions::builder(ConnectionMode::Local)
        .database(h.db_path("a.db"))
        .busy_timeout(std::time::Duration::from_millis(250))
        .finish();
    let conn = h.bridge.connect(options)?;

    let info = h.bridge.connection_info(&conn)?;
    assert_eq!(info.mode, ConnectionMode::Local);
    assert_eq!(info.busy_timeout_ms, Some(250));

    h.bridge.set_busy_timeout(&conn, 1_000)?;
    assert_eq!(h.bridge.connection_info(&conn)?.busy_timeout_ms, Some(1_000));
    Ok(())
}
