use std::time::Duration;

use crate::error::BridgeError;
use crate::types::{ConnectionMode, SyncPolicy};

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub mode: ConnectionMode,
    /// Local database path; required for local and replica modes.
    pub database: Option<String>,
    /// Remote URL; required for remote and replica modes.
    pub uri: Option<String>,
    /// Remote credential; required for remote and replica modes.
    pub auth_token: Option<String>,
    pub sync_policy: SyncPolicy,
    /// Applied right after connecting.
    pub busy_timeout: Option<Duration>,
}

impl ConnectOptions {
    #[must_use]
    pub fn local(database: impl Into<String>) -> Self {
        Self {
            mode: ConnectionMode::Local,
            database: Some(database.into()),
            uri: None,
            auth_token: None,
            sync_policy: SyncPolicy::default(),
            busy_timeout: None,
        }
    }

    #[must_use]
    pub fn builder(mode: ConnectionMode) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(mode)
    }

    /// Build options from host-style key/value pairs.
    ///
    /// Recognised keys: `mode`, `database`, `uri`, `auth_token`, `sync`, `busy_timeout_ms`.
    /// Unknown keys are ignored. `mode` defaults to local.
    ///
    /// # Errors
    /// [`BridgeError::InvalidOptions`] for unparseable values or missing required fields.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, BridgeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = ConnectOptionsBuilder::new(ConnectionMode::Local);
        for (key, value) in pairs {
            let value: String = value.into();
            match key.as_ref() {
                "mode" => builder.opts.mode = value.parse()?,
                "database" => builder = builder.database(value),
                "uri" => builder = builder.uri(value),
                "auth_token" => builder = builder.auth_token(value),
                "sync" => builder = builder.sync_policy(value.parse()?),
                "busy_timeout_ms" => {
                    let ms = value.parse::<u64>().map_err(|e| {
                        BridgeError::InvalidOptions(format!("busy_timeout_ms `{value}`: {e}"))
                    })?;
                    builder = builder.busy_timeout(Duration::from_millis(ms));
                }
                _ => {}
            }
        }
        let opts = builder.finish();
        opts.validate()?;
        Ok(opts)
    }

    /// Check that the fields required by `mode` are present and non-empty.
    ///
    /// # Errors
    /// [`BridgeError::InvalidOptions`] naming the first missing field.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let required: Vec<(&str, &Option<String>)> = match self.mode {
            ConnectionMode::Local => vec![("database", &self.database)],
            ConnectionMode::Remote => vec![("uri", &self.uri), ("auth_token", &self.auth_token)],
            ConnectionMode::Replica => vec![
                ("database", &self.database),
                ("uri", &self.uri),
                ("auth_token", &self.auth_token),
            ],
        };
        for (name, value) in required {
            if value.as_deref().is_none_or(str::is_empty) {
                return Err(BridgeError::InvalidOptions(format!(
                    "{:?} mode requires `{name}`",
                    self.mode
                )));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(mode: ConnectionMode) -> Self {
        Self {
            opts: ConnectOptions {
                mode,
                database: None,
                uri: None,
                auth_token: None,
                sync_policy: SyncPolicy::default(),
                busy_timeout: None,
            },
        }
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.opts.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.opts.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.opts.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.opts.sync_policy = policy;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }
}
