//! Statement classification
//!
//! Transaction control is matched on a lowercase prefix; everything else is
//! prepared against a reader connection and classified by the engine's own
//! read-only flag. The prefix match wins over preparation, so
//! `BEGIN IMMEDIATE` routes to the transaction manager even though the
//! engine would prepare it as a no-op statement.

/// The routing class of a SQL text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
    Begin,
    Commit,
    Rollback,
}

/// Match the transaction-control prefixes. Returns `None` for statements
/// that need the prepared-statement check.
pub(crate) fn sniff_transaction_control(sql: &str) -> Option<StatementKind> {
    let trimmed = sql.trim().to_ascii_lowercase();
    if trimmed.starts_with("begin") {
        Some(StatementKind::Begin)
    } else if trimmed.starts_with("commit") {
        Some(StatementKind::Commit)
    } else if trimmed.starts_with("rollback") || trimmed.starts_with("end transaction") {
        Some(StatementKind::Rollback)
    } else {
        None
    }
}

/// Whether a classified write is plain DML. Writes that create or alter
/// schema (or otherwise touch no rows) report an `ok` outcome instead of
/// `lastInsertId` / `rowsAffected`, which SQLite leaves stale for them.
pub(crate) fn is_dml(sql: &str) -> bool {
    let trimmed = sql.trim_start().to_ascii_lowercase();
    ["insert", "update", "delete", "replace"].iter().any(|prefix| trimmed.starts_with(prefix))
}
