//! Error types for the NSQLited engine

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// The `tx-*` and `bind-*` variants carry stable codes in their display text
/// so clients can match on them (e.g. reset a stored transaction id when a
/// result contains `tx-not-found`).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare statement: {0}")]
    Prepare(rusqlite::Error),

    #[error("failed to detect query type: failed to prepare statement: {0}")]
    DetectQueryType(rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    TaskJoin(String),

    #[error("tx-within-tx: a transaction is already in progress")]
    TxWithinTx,

    #[error("tx-not-found: no transaction found for the provided transaction id")]
    TxNotFound,

    #[error("tx-not-match: the provided transaction id does not match the active transaction")]
    TxNotMatch,

    #[error("bind-name-not-found: no parameter named {0:?} in statement")]
    BindNameNotFound(String),

    #[error("bind-unsupported-type: cannot bind a parameter of type {0}")]
    BindUnsupportedType(String),
}

impl EngineError {
    /// Wrap a bb8 acquisition failure, keeping only its message.
    pub(crate) fn pool<E: std::fmt::Display>(err: bb8::RunError<E>) -> Self {
        EngineError::Pool(match err {
            bb8::RunError::User(e) => e.to_string(),
            bb8::RunError::TimedOut => "timed out waiting for a connection".to_string(),
        })
    }
}
