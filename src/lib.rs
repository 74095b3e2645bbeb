//! Handle-based synchronous bridge over the async libsql client.
//!
//! Hosts that cannot hold native handles across calls (foreign runtimes, FFI layers,
//! scripting engines) talk to libsql through string ids instead. A [`Bridge`] keeps the
//! native connections, transactions, prepared statements and cursors in registries,
//! checks that every child resource is used through the connection that owns it, and
//! drives the async client on its own runtime.
//!
//! ```rust,no_run
//! use libsql_bridge::prelude::*;
//!
//! # fn main() -> Result<(), BridgeError> {
//! let bridge = Bridge::global()?;
//! let conn = bridge.connect(ConnectOptions::local(":memory:"))?;
//! let result = bridge.query_args(&conn, "SELECT 1 AS one", &[])?;
//! assert_eq!(result.get(0, "one"), Some(&RowValues::Int(1)));
//! bridge.close(&conn)?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod bridge;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub(crate) mod native;
pub mod prelude;
pub mod registry;
pub mod replication;
pub mod results;
pub mod routing;
mod runtime;
pub mod statement;
pub mod transaction;
pub mod types;

pub use bridge::{Bridge, ResourceCounts};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use connection::{ConnectOptions, ConnectOptionsBuilder, ConnectionInfo};
pub use error::{BridgeError, ResourceKind};
pub use registry::ResourceId;
pub use results::{
    ColumnInfo, ConnectionHealth, FetchedRows, QueryResult, StatementInfo, TransactionStatus,
};
pub use routing::{StatementKind, classify};
pub use transaction::savepoint::validate_savepoint_name;
pub use types::{ConnectionMode, QueryAndParams, RowValues, SyncPolicy, TransactionMode};
