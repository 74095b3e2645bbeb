mod common;

use std::thread;
use std::time::Duration;

use common::Harness;
use libsql_bridge::prelude::*;

#[test]
fn test7_close_cascades_to_children() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;
    let survivor = h.open_with_table("b.db")?;
    let kept_stmt = h.bridge.prepare(&survivor, "SELECT 1")?;

    let txn = h.bridge.begin(&conn)?;
    h.bridge.execute_in_transaction(&txn, &conn, "INSERT INTO t (name) VALUES ('lost')", &[])?;
    let stmt = h.bridge.prepare(&conn, "SELECT id FROM t")?;
    let cursor = h.bridge.declare_cursor(&conn, "SELECT id FROM t", &[])?;
    assert_eq!(
        h.bridge.resource_counts()?,
        ResourceCounts {
            connections: 2,
            transactions: 1,
            statements: 2,
            cursors: 1
        }
    );

    h.bridge.close(&conn)?;

    assert!(h.bridge.commit(&txn, &conn).unwrap_err().is_not_found());
    assert!(h.bridge.introspect(&stmt).unwrap_err().is_not_found());
    assert!(h.bridge.fetch_cursor(&cursor, &conn, None).unwrap_err().is_not_found());
    assert!(h.bridge.introspect(&kept_stmt).is_ok());
    assert_eq!(
        h.bridge.resource_counts()?,
        ResourceCounts {
            connections: 1,
            transactions: 0,
            statements: 1,
            cursors: 0
        }
    );

    // the open transaction was rolled back, not committed
    let reopened = h.open("a.db")?;
    assert_eq!(h.count(&reopened, "t")?, 0);
    Ok(())
}

#[test]
fn test7_poisoned_registry_reports_internal() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;

    h.bridge.poison_registry(ResourceKind::Statement);

    assert!(matches!(h.bridge.prepare(&conn, "SELECT 1"), Err(BridgeError::Internal(_))));
    assert!(matches!(h.bridge.introspect("any"), Err(BridgeError::Internal(_))));
    assert!(matches!(h.bridge.resource_counts(), Err(BridgeError::Internal(_))));
    // the other registries keep working
    assert_eq!(h.count(&conn, "t")?, 0);
    let txn = h.bridge.begin(&conn)?;
    h.bridge.rollback(&txn, &conn)?;
    Ok(())
}

#[test]
fn test7_interrupt_from_another_thread() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open("a.db")?;
    let endless = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 1000000000) SELECT count(*) FROM c";

    let outcome = thread::scope(|scope| {
        let runner = scope.spawn(|| h.bridge.query_args(&conn, endless, &[]));
        while !runner.is_finished() {
            thread::sleep(Duration::from_millis(20));
            if h.bridge.interrupt(&conn).is_err() {
                break;
            }
        }
        runner.join()
    });

    let outcome = outcome.map_err(|_| "query thread panicked")?;
    assert!(matches!(outcome, Err(BridgeError::Native(_))));
    // the connection is still usable afterwards
    assert!(h.bridge.ping(&conn)?.is_alive());
    h.bridge.reset_connection(&conn)?;
    assert_eq!(h.bridge.query_args(&conn, "SELECT 1 AS one", &[])?.row_count, 1);
    Ok(())
}

#[test]
fn test7_connect_validates_before_opening() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;

    let remote = ConnectOptions::builder(ConnectionMode::Remote)
        .uri("libsql://example.invalid")
        .finish();
    assert!(matches!(h.bridge.connect(remote), Err(BridgeError::InvalidOptions(_))));

    let replica = ConnectOptions::builder(ConnectionMode::Replica)
        .database(h.db_path("replica.db"))
        .auth_token("")
        .uri("libsql://example.invalid")
        .finish();
    assert!(matches!(h.bridge.connect(replica), Err(BridgeError::InvalidOptions(_))));

    assert!(matches!(
        ConnectOptions::from_pairs([("mode", "sideways")]),
        Err(BridgeError::InvalidOptions(_))
    ));

    let options = ConnectOptions::from_pairs([
        ("mode", "local".to_string()),
        ("database", h.db_path("pairs.db")),
        ("busy_timeout_ms", "50".to_string()),
        ("colour", "ignored".to_string()),
    ])?;
    let conn = h.bridge.connect(options)?;
    assert_eq!(h.bridge.connection_info(&conn)?.busy_timeout_ms, Some(50));
    assert_eq!(h.bridge.resource_counts()?.connections, 1);
    Ok(())
}

#[test]
fn test7_local_connections_have_no_frames() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open_with_table("a.db")?;
    h.bridge.query_args(&conn, "INSERT INTO t (name) VALUES ('x')", &[])?;

    assert_eq!(h.bridge.current_frame(&conn)?, 0);
    assert_eq!(h.bridge.max_write_frame(&conn)?, 0);
    assert_eq!(h.bridge.flush(&conn)?, 0);
    h.bridge.sync_until(&conn, 10)?;
    h.bridge.sync(&conn)?;
    assert!(h.bridge.sync("unknown").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test7_global_bridge_is_shared() -> Result<(), Box<dyn std::error::Error>> {
    let a = Bridge::global()?;
    let b = Bridge::global()?;
    assert!(std::ptr::eq(a, b));
    let conn = a.connect(ConnectOptions::local(":memory:"))?;
    assert!(b.ping(&conn)?.is_alive());
    a.close(&conn)?;
    Ok(())
}

#[test]
fn test7_extension_loading_is_gated_per_connection() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new()?;
    let conn = h.open("a.db")?;
    let missing = h.dir.path().join("no_such_extension");

    let refused = h.bridge.load_extension(&conn, &missing, None).unwrap_err();
    assert!(matches!(refused, BridgeError::Native(_)));

    h.bridge.enable_load_extension(&conn, true)?;
    let absent = h.bridge.load_extension(&conn, &missing, Some("sqlite3_ext_init")).unwrap_err();
    assert!(matches!(absent, BridgeError::Native(_)));
    h.bridge.enable_load_extension(&conn, false)?;

    assert!(
        h.bridge
            .enable_load_extension("no-such-conn", true)
            .unwrap_err()
            .is_not_found()
    );
    assert!(h.bridge.ping(&conn)?.is_alive());
    Ok(())
}
