use std::time::Duration;

/// Default bound for connect, sync, sync_until and flush.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows returned by a cursor fetch when the caller does not specify a batch size.
pub const DEFAULT_FETCH_SIZE: usize = 500;

/// Runtime-wide settings for a [`crate::Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Worker threads for the bridge runtime; tokio's default when `None`.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    pub connect_timeout: Duration,
    pub sync_timeout: Duration,
    pub default_fetch_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "libsql-bridge".to_string(),
            connect_timeout: DEFAULT_SYNC_TIMEOUT,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            default_fetch_size: DEFAULT_FETCH_SIZE,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

/// Fluent builder for [`BridgeConfig`].
///
/// ```rust
/// use std::time::Duration;
/// use libsql_bridge::prelude::*;
///
/// let config = BridgeConfig::builder()
///     .worker_threads(2)
///     .sync_timeout(Duration::from_secs(5))
///     .finish();
/// assert_eq!(config.default_fetch_size, 500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    #[must_use]
    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.config.worker_threads = Some(workers);
        self
    }

    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync_timeout = timeout;
        self
    }

    /// Clamped to at least one row.
    #[must_use]
    pub fn default_fetch_size(mut self, rows: usize) -> Self {
        self.config.default_fetch_size = rows.max(1);
        self
    }

    #[must_use]
    pub fn finish(self) -> BridgeConfig {
        self.config
    }
}
