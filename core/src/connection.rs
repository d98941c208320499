//! Connection manager for bb8 pools over rusqlite
//!
//! Both pool roles open the same database file and run the same startup
//! pragma batch; readers additionally set `query_only` so the engine itself
//! refuses writes on them.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::error::EngineError;

/// Which pool a connection belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    /// The single read-write connection; serializes all mutating work.
    Writer,
    /// A shared read-only connection, guarded by `query_only`.
    Reader,
}

/// Startup pragmas applied unconditionally to every new connection.
const STARTUP_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA busy_timeout = 5000;
     PRAGMA synchronous = NORMAL;
     PRAGMA cache_size = 10000;
     PRAGMA foreign_keys = ON;
     PRAGMA temp_store = MEMORY;
     PRAGMA mmap_size = 536870912;";

/// A connection factory for one pool role over one database file.
///
/// Since rusqlite::Connection is not Sync, connections are handed out as
/// [`DbConn`] wrappers and all statement work runs inside `spawn_blocking`.
pub struct ConnectionManager {
    path: PathBuf,
    role: ConnectionRole,
}

impl ConnectionManager {
    pub fn new(path: impl Into<PathBuf>, role: ConnectionRole) -> Self { Self { path: path.into(), role } }

    fn create_connection(&self) -> Result<Connection, EngineError> {
        let conn = Connection::open(&self.path)?;

        // A pragma failure drops the connection and surfaces to the acquirer.
        conn.execute_batch(STARTUP_PRAGMAS)?;
        if self.role == ConnectionRole::Reader {
            conn.execute_batch("PRAGMA query_only = ON;")?;
        }

        Ok(conn)
    }
}

/// A pooled SQLite connection handle.
///
/// Wraps the rusqlite Connection in an `Arc<Mutex>` for thread-safe access;
/// clones share the same underlying connection.
pub struct DbConn {
    inner: Arc<Mutex<Connection>>,
}

impl DbConn {
    pub fn new(conn: Connection) -> Self { Self { inner: Arc::new(Mutex::new(conn)) } }

    /// Run a closure against the connection.
    ///
    /// Acquires the connection lock and executes the closure inside
    /// `spawn_blocking`, since rusqlite operations are synchronous and may
    /// block on file I/O.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Connection) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            f(&guard)
        })
        .await
        .map_err(|e| EngineError::TaskJoin(e.to_string()))?
    }
}

impl Clone for DbConn {
    fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl bb8::ManageConnection for ConnectionManager {
    type Connection = DbConn;
    type Error = EngineError;

    fn connect(&self) -> impl std::future::Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = ConnectionManager::new(self.path.clone(), self.role);
        async move {
            tokio::task::spawn_blocking(move || manager.create_connection().map(DbConn::new))
                .await
                .map_err(|e| EngineError::TaskJoin(e.to_string()))?
        }
    }

    #[allow(refining_impl_trait)]
    fn is_valid<'a, 'b>(&'a self, conn: &'b mut Self::Connection) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        let conn_inner = conn.inner.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                let guard = conn_inner.blocking_lock();
                guard.execute_batch("SELECT 1").map_err(EngineError::from)
            })
            .await
            .map_err(|e| EngineError::TaskJoin(e.to_string()))?
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool { false }
}
