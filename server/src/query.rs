//! The `/query` endpoint
//!
//! Executes each parsed statement in order and appends one typed outcome per
//! statement. A failing statement becomes an `error` result without aborting
//! the rest of the batch, and the response is HTTP 200 regardless of
//! per-statement failures.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use nsqlited_core::{Cell, Outcome, Query};
use serde::Serialize;

use crate::error::ApiError;
use crate::request::{self, StatementReq};
use crate::state::AppState;

/// One entry of the response `results` array, discriminated by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StatementResult {
    Read {
        columns: Vec<String>,
        types: Vec<String>,
        values: Vec<Vec<Cell>>,
        time: f64,
    },
    Write {
        #[serde(rename = "lastInsertId")]
        last_insert_id: i64,
        #[serde(rename = "rowsAffected")]
        rows_affected: i64,
        time: f64,
    },
    Begin {
        #[serde(rename = "txId")]
        tx_id: String,
        time: f64,
    },
    Commit {
        #[serde(rename = "txId")]
        tx_id: String,
        time: f64,
    },
    Rollback {
        #[serde(rename = "txId")]
        tx_id: String,
        time: f64,
    },
    Ok {
        time: f64,
    },
    Error {
        error: String,
        time: f64,
    },
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: Vec<StatementResult>,
    pub time: f64,
}

pub async fn handle(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<QueryResponse>, ApiError> {
    let stats = state.engine.stats();
    stats.inc_http_requests();
    let _queued = stats.queued_http_guard();

    let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
    let statements = request::parse(content_type, &body).map_err(|e| {
        ApiError::bad_request(e.to_string(), "Failed to read request body")
            .with_request(connect_info.map(|ConnectInfo(addr)| addr), uri.to_string())
    })?;

    let started = Instant::now();
    let mut results = Vec::with_capacity(statements.len());

    // A transaction begun earlier in the batch adopts the statements that
    // follow it, unless they carry their own id. Without this, a bare write
    // after a BEGIN would queue on the writer pool the transaction holds.
    let mut batch_tx_id: Option<String> = None;
    for mut statement in statements {
        if statement.tx_id.is_empty() {
            if let Some(tx_id) = &batch_tx_id {
                statement.tx_id = tx_id.clone();
            }
        }

        let result = execute_statement(&state, statement).await;
        match &result {
            StatementResult::Begin { tx_id, .. } => batch_tx_id = Some(tx_id.clone()),
            StatementResult::Commit { .. } | StatementResult::Rollback { .. } => batch_tx_id = None,
            _ => {}
        }
        results.push(result);
    }

    Ok(Json(QueryResponse { results, time: started.elapsed().as_secs_f64() }))
}

async fn execute_statement(state: &AppState, statement: StatementReq) -> StatementResult {
    let started = Instant::now();
    let query = Query { tx_id: statement.tx_id, sql: statement.sql, params: statement.params };

    match state.engine.query(query).await {
        Ok(output) => {
            let time = output.elapsed.as_secs_f64();
            match output.outcome {
                Outcome::Read { columns, types, values } => match values {
                    Some(values) => StatementResult::Read { columns, types, values, time },
                    None => StatementResult::Error { error: "No rows returned".to_string(), time },
                },
                Outcome::Write { last_insert_id, rows_affected } => StatementResult::Write { last_insert_id, rows_affected, time },
                Outcome::Begin { tx_id } => StatementResult::Begin { tx_id, time },
                Outcome::Commit { tx_id } => StatementResult::Commit { tx_id, time },
                Outcome::Rollback { tx_id } => StatementResult::Rollback { tx_id, time },
                Outcome::Ok => StatementResult::Ok { time },
            }
        }
        Err(e) => StatementResult::Error { error: e.to_string(), time: started.elapsed().as_secs_f64() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_serialize_with_type_discriminator() {
        let result = StatementResult::Write { last_insert_id: 3, rows_affected: 1, time: 0.1 };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "write");
        assert_eq!(value["lastInsertId"], 3);
        assert_eq!(value["rowsAffected"], 1);

        let result = StatementResult::Begin { tx_id: "abc".to_string(), time: 0.0 };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "begin");
        assert_eq!(value["txId"], "abc");

        let result = StatementResult::Read {
            columns: vec!["id".to_string()],
            types: vec!["integer".to_string()],
            values: vec![vec![Cell::Integer(1)]],
            time: 0.0,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "read");
        assert_eq!(value["values"], serde_json::json!([[1]]));

        let result = StatementResult::Error { error: "boom".to_string(), time: 0.0 };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "boom");
    }
}
