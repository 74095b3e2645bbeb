//! Glue between host values and the `libsql` client.

pub(crate) mod executor;
pub mod params;
pub(crate) mod rows;

pub(crate) use executor::SqlExecutor;
pub use params::Params;
