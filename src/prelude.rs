//! Convenient imports for common functionality.
//!
//! ```rust
//! use libsql_bridge::prelude::*;
//!
//! let options = ConnectOptions::local("app.db");
//! assert_eq!(options.mode, ConnectionMode::Local);
//! ```

pub use crate::bridge::{Bridge, ResourceCounts};
pub use crate::config::{BridgeConfig, BridgeConfigBuilder};
pub use crate::connection::{ConnectOptions, ConnectOptionsBuilder, ConnectionInfo};
pub use crate::error::{BridgeError, ResourceKind};
pub use crate::registry::ResourceId;
pub use crate::results::{
    ColumnInfo, ConnectionHealth, FetchedRows, QueryResult, StatementInfo, TransactionStatus,
};
pub use crate::routing::{StatementKind, classify};
pub use crate::transaction::savepoint::validate_savepoint_name;
pub use crate::types::{ConnectionMode, QueryAndParams, RowValues, SyncPolicy, TransactionMode};
