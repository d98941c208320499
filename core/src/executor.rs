//! Statement execution against an open connection
//!
//! Runs synchronously against a checked-out connection; callers wrap these
//! in `DbConn::with_connection` so the blocking work lands on the blocking
//! thread pool.

use rusqlite::{Connection, Statement};

use crate::classifier::{is_dml, StatementKind};
use crate::error::EngineError;
use crate::value::{Cell, Param};

/// What a single statement produced, before timing and transaction ids are
/// attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExecOutput {
    Rows { columns: Vec<String>, types: Vec<String>, values: Vec<Vec<Cell>> },
    Write { last_insert_id: i64, rows_affected: i64 },
    None,
}

/// Prepare, bind, step and materialize one statement.
pub(crate) fn run_statement(conn: &Connection, sql: &str, params: &[Param], kind: StatementKind) -> Result<ExecOutput, EngineError> {
    let mut stmt = conn.prepare(sql).map_err(EngineError::Prepare)?;
    bind_params(&mut stmt, params)?;

    let column_count = stmt.column_count();

    if kind == StatementKind::Write {
        // Step to completion; a write may still produce rows (RETURNING).
        if column_count == 0 {
            stmt.raw_execute()?;
        } else {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
        }

        // lastInsertId and rowsAffected only mean something for DML; SQLite
        // leaves both stale across DDL, which reports a plain success.
        if is_dml(sql) {
            return Ok(ExecOutput::Write { last_insert_id: conn.last_insert_rowid(), rows_affected: conn.changes() as i64 });
        }
        return Ok(ExecOutput::None);
    }

    // Reads with no output columns (pragmas and friends) step to completion
    // and report a plain success.
    if column_count == 0 {
        stmt.raw_execute()?;
        return Ok(ExecOutput::None);
    }

    let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
    let mut types: Vec<String> = stmt.columns().iter().map(|c| c.decl_type().unwrap_or("").to_ascii_lowercase()).collect();

    let mut values: Vec<Vec<Cell>> = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            cells.push(Cell::from(row.get_ref(i)?));
        }

        // Columns without a declared type (expressions, aggregates) take
        // their type from the first row's values.
        if values.is_empty() {
            for (declared, cell) in types.iter_mut().zip(&cells) {
                if declared.is_empty() {
                    *declared = cell.type_name().to_string();
                }
            }
        }

        values.push(cells);
    }

    Ok(ExecOutput::Rows { columns, types, values })
}

fn bind_params(stmt: &mut Statement<'_>, params: &[Param]) -> Result<(), EngineError> {
    for (i, param) in params.iter().enumerate() {
        let index = match &param.name {
            Some(name) if !name.is_empty() => resolve_param_index(stmt, name)?,
            _ => i + 1,
        };
        stmt.raw_bind_parameter(index, param.value.to_sql()?)?;
    }
    Ok(())
}

/// Resolve a bare parameter name to its 1-based index by probing the SQLite
/// name prefixes in order.
fn resolve_param_index(stmt: &Statement<'_>, name: &str) -> Result<usize, EngineError> {
    for prefix in [":", "@", "$", "?"] {
        if let Some(index) = stmt.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(index);
        }
    }
    Err(EngineError::BindNameNotFound(name.to_string()))
}
