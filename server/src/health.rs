//! `/health`: end-to-end liveness through the engine.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::Uri;
use nsqlited_core::Query;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
) -> Result<&'static str, ApiError> {
    state.engine.query(Query::statement("SELECT 1")).await.map_err(|e| {
        ApiError::internal(e.to_string(), "Failed to query the database")
            .with_request(connect_info.map(|ConnectInfo(addr)| addr), uri.to_string())
    })?;

    Ok("OK")
}
