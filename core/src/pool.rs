//! The writer/reader pool pair over one database file

use std::path::Path;

use crate::connection::{ConnectionManager, ConnectionRole};
use crate::error::EngineError;

/// Upper bound on concurrent reader connections.
pub const READER_POOL_SIZE: u32 = 100;

/// The two connection pools over a single database file.
///
/// The writer pool holds at most one connection and never expires it, so
/// writer acquisitions are mutually exclusive by construction. Readers share
/// a larger pool of `query_only` connections.
pub struct Pools {
    writer: bb8::Pool<ConnectionManager>,
    reader: bb8::Pool<ConnectionManager>,
}

impl Pools {
    /// Build both pools and verify each can hand out a working connection,
    /// so pragma failures surface at startup rather than on first use.
    pub async fn open(database_path: &Path) -> Result<Self, EngineError> {
        let writer = bb8::Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(ConnectionManager::new(database_path, ConnectionRole::Writer))
            .await?;

        let reader = bb8::Pool::builder()
            .max_size(READER_POOL_SIZE)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(ConnectionManager::new(database_path, ConnectionRole::Reader))
            .await?;

        writer.get().await.map_err(EngineError::pool)?;
        reader.get().await.map_err(EngineError::pool)?;

        Ok(Self { writer, reader })
    }

    pub fn writer(&self) -> &bb8::Pool<ConnectionManager> { &self.writer }

    pub fn reader(&self) -> &bb8::Pool<ConnectionManager> { &self.reader }
}
