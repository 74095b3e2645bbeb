//! Incremental fetch over a live native row stream.
//!
//! A cursor keeps the `libsql::Rows` stream open and reads at most one row ahead, so
//! result sets larger than memory can be paged through. The lookahead is what lets a
//! fetch report `exhausted` on the same call that returns the last rows. A row that fails
//! to decode after some rows of the page were read is held back: the page is served and
//! the error is reported by the next fetch.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::native::Params;
use crate::native::rows::{column_names, convert_row};
use crate::registry::{Owned, ResourceId};
use crate::results::FetchedRows;
use crate::transaction::with_open;
use crate::types::RowValues;

pub(crate) struct CursorStream {
    rows: libsql::Rows,
    columns: Arc<Vec<String>>,
    lookahead: Option<Vec<RowValues>>,
    pending_error: Option<BridgeError>,
    position: u64,
    exhausted: bool,
}

impl CursorStream {
    fn new(rows: libsql::Rows) -> Self {
        Self {
            columns: column_names(&rows),
            rows,
            lookahead: None,
            pending_error: None,
            position: 0,
            exhausted: false,
        }
    }

    async fn read_one(&mut self) -> Result<Option<Vec<RowValues>>, BridgeError> {
        if let Some(row) = self.lookahead.take() {
            return Ok(Some(row));
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.rows.next().await? {
            Some(row) => Ok(Some(convert_row(&row, self.columns.len())?)),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Up to `max_rows` rows, then peek one more to learn whether anything is left.
    async fn fetch(&mut self, max_rows: usize) -> Result<FetchedRows, BridgeError> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        let mut rows = Vec::with_capacity(max_rows.min(1024));
        while rows.len() < max_rows {
            match self.read_one().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break,
                Err(err) => return self.hold_back(err, rows),
            }
        }
        if !self.exhausted && self.lookahead.is_none() {
            match self.read_one().await {
                Ok(next) => self.lookahead = next,
                Err(err) => return self.hold_back(err, rows),
            }
        }
        Ok(self.page(rows, self.exhausted && self.lookahead.is_none()))
    }

    /// Serve the rows read so far and keep `err` for the next fetch. With nothing read
    /// yet the error belongs to this fetch.
    fn hold_back(
        &mut self,
        err: BridgeError,
        rows: Vec<Vec<RowValues>>,
    ) -> Result<FetchedRows, BridgeError> {
        if rows.is_empty() {
            return Err(err);
        }
        self.pending_error = Some(err);
        Ok(self.page(rows, false))
    }

    fn page(&mut self, rows: Vec<Vec<RowValues>>, exhausted: bool) -> FetchedRows {
        self.position += rows.len() as u64;
        FetchedRows {
            columns: Arc::clone(&self.columns),
            rows,
            exhausted,
        }
    }
}

pub(crate) struct CursorEntry {
    owner: ResourceId,
    stream: Arc<Mutex<CursorStream>>,
}

impl Owned for CursorEntry {
    fn owner(&self) -> &str {
        &self.owner
    }
}

impl Bridge {
    fn register_cursor(
        &self,
        conn_id: &str,
        rows: libsql::Rows,
    ) -> Result<ResourceId, BridgeError> {
        let cursor_id = self.adopt(
            &self.cursors,
            CursorEntry {
                owner: conn_id.to_string(),
                stream: Arc::new(Mutex::new(CursorStream::new(rows))),
            },
        )?;
        debug!(conn_id, %cursor_id, "cursor declared");
        Ok(cursor_id)
    }

    /// Start a query without materializing its rows.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` for engine failures.
    pub fn declare_cursor(
        &self,
        conn_id: &str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResourceId, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        let params = Params::convert(params);
        let rows = self.run(async move { Ok(conn.query(sql, params.into_vec()).await?) })?;
        self.register_cursor(conn_id, rows)
    }

    /// Start a query inside an owned transaction, reading from its snapshot.
    ///
    /// # Errors
    /// `NotOwner`, `NotFound`, or `Native`.
    pub fn declare_cursor_in_transaction(
        &self,
        txn_id: &str,
        conn_id: &str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResourceId, BridgeError> {
        let handle = self.owned_transaction(txn_id, conn_id)?;
        let params = Params::convert(params);
        let rows = self.run(async move {
            with_open(txn_id, &handle, async |txn| {
                Ok(txn.query(sql, params.into_vec()).await?)
            })
            .await
        })?;
        self.register_cursor(conn_id, rows)
    }

    /// Next page of at most `max_rows` rows (the configured default when `None`).
    ///
    /// When the page reports `exhausted`, the cursor has already been released and any
    /// further fetch returns `NotFound`.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero batch size, `NotFound`, `NotOwner`, or `Native`.
    pub fn fetch_cursor(
        &self,
        cursor_id: &str,
        conn_id: &str,
        max_rows: Option<usize>,
    ) -> Result<FetchedRows, BridgeError> {
        let max_rows = max_rows.unwrap_or(self.config.default_fetch_size);
        if max_rows == 0 {
            return Err(BridgeError::InvalidArgument(
                "max_rows must be at least 1".to_string(),
            ));
        }
        let stream = self.owned_stream(cursor_id, conn_id)?;
        let fetched = self.run(async move { stream.lock().await.fetch(max_rows).await });

        match fetched {
            Ok(page) if page.exhausted => {
                self.cursors.remove(cursor_id)?;
                debug!(cursor_id, "cursor exhausted");
                Ok(page)
            }
            Ok(page) => Ok(page),
            Err(err) => {
                // a stream that failed mid-way cannot be resumed
                self.cursors.remove(cursor_id)?;
                Err(err)
            }
        }
    }

    /// Rows delivered so far.
    ///
    /// # Errors
    /// `NotFound`, `NotOwner`.
    pub fn cursor_position(&self, cursor_id: &str, conn_id: &str) -> Result<u64, BridgeError> {
        let stream = self.owned_stream(cursor_id, conn_id)?;
        self.run(async move { Ok(stream.lock().await.position) })
    }

    /// Stop iterating early. Unknown ids are a no-op.
    ///
    /// # Errors
    /// `NotOwner` for a cursor of another connection, `Internal` if the registry lock is
    /// poisoned.
    pub fn deallocate_cursor(&self, cursor_id: &str, conn_id: &str) -> Result<(), BridgeError> {
        match self.cursors.take_owned(cursor_id, conn_id) {
            Ok(_) => {
                debug!(cursor_id, "cursor deallocated");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn owned_stream(
        &self,
        cursor_id: &str,
        conn_id: &str,
    ) -> Result<Arc<Mutex<CursorStream>>, BridgeError> {
        self.cursors
            .with_owned(cursor_id, conn_id, |entry| Arc::clone(&entry.stream))
    }
}
