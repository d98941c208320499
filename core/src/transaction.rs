//! Interactive transaction manager
//!
//! At most one interactive transaction exists process-wide, identified by an
//! opaque uuid so it can span independent HTTP requests. The manager holds
//! the writer pool's connection for the transaction's lifetime, which keeps
//! writes outside the transaction queued on the pool until commit, rollback
//! or the idle reaper ends it.
//!
//! Lock ordering: transaction slot, then writer pool. Never the reverse.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::connection::{ConnectionManager, DbConn};
use crate::error::EngineError;

struct ActiveTxn {
    id: String,
    last_used: Instant,
    conn: DbConn,
    // Keeps the writer pool slot occupied until the transaction ends.
    _guard: bb8::PooledConnection<'static, ConnectionManager>,
}

pub(crate) struct TxnManager {
    writer: bb8::Pool<ConnectionManager>,
    slot: Mutex<Option<ActiveTxn>>,
    idle_timeout: Duration,
}

impl TxnManager {
    pub fn new(writer: bb8::Pool<ConnectionManager>, idle_timeout: Duration) -> Self {
        Self { writer, slot: Mutex::new(None), idle_timeout }
    }

    /// Start a transaction. Fails with `tx-within-tx` when one is already
    /// active or the caller presented a transaction id of its own.
    pub async fn begin(&self, incoming_tx_id: &str) -> Result<String, EngineError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() || !incoming_tx_id.is_empty() {
            return Err(EngineError::TxWithinTx);
        }

        let guard = self.writer.get_owned().await.map_err(EngineError::pool)?;
        let conn = (*guard).clone();
        conn.with_connection(|c| c.execute_batch("BEGIN TRANSACTION").map_err(EngineError::from)).await?;

        let id = Uuid::new_v4().to_string();
        *slot = Some(ActiveTxn { id: id.clone(), last_used: Instant::now(), conn, _guard: guard });
        Ok(id)
    }

    pub async fn commit(&self, incoming_tx_id: &str) -> Result<(), EngineError> { self.finish(incoming_tx_id, "COMMIT").await }

    pub async fn rollback(&self, incoming_tx_id: &str) -> Result<(), EngineError> { self.finish(incoming_tx_id, "ROLLBACK").await }

    async fn finish(&self, incoming_tx_id: &str, control: &'static str) -> Result<(), EngineError> {
        let mut slot = self.slot.lock().await;
        let conn = match slot.as_ref() {
            Some(active) if active.id == incoming_tx_id => active.conn.clone(),
            _ => return Err(EngineError::TxNotFound),
        };

        conn.with_connection(move |c| c.execute_batch(control).map_err(EngineError::from)).await?;
        // Dropping the slot releases the writer connection back to the pool.
        *slot = None;
        Ok(())
    }

    /// The read/write gate. An empty id passes outside any transaction; a
    /// matching id refreshes the idle clock and hands out the transaction's
    /// connection; anything else is `tx-not-match`.
    pub async fn checkout(&self, incoming_tx_id: &str) -> Result<Option<DbConn>, EngineError> {
        if incoming_tx_id.is_empty() {
            return Ok(None);
        }

        let mut slot = self.slot.lock().await;
        match slot.as_mut() {
            Some(active) if active.id == incoming_tx_id => {
                active.last_used = Instant::now();
                Ok(Some(active.conn.clone()))
            }
            _ => Err(EngineError::TxNotMatch),
        }
    }

    /// Roll back the current transaction if it has been idle longer than the
    /// timeout. Returns whether a transaction was reaped. The slot is cleared
    /// even when the rollback statement fails, so a broken transaction cannot
    /// pin the writer forever.
    pub async fn reap_idle(&self) -> Result<bool, EngineError> {
        let mut slot = self.slot.lock().await;
        let conn = match slot.as_ref() {
            Some(active) if active.last_used.elapsed() > self.idle_timeout => active.conn.clone(),
            _ => return Ok(false),
        };

        let result = conn.with_connection(|c| c.execute_batch("ROLLBACK").map_err(EngineError::from)).await;
        *slot = None;
        result.map(|_| true)
    }

    /// Roll back any live transaction unconditionally (shutdown path).
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.take() {
            let _ = active.conn.with_connection(|c| c.execute_batch("ROLLBACK").map_err(EngineError::from)).await;
        }
    }
}
