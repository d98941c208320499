//! `/stats`: JSON snapshot of the per-minute counters.

use axum::extract::State;
use axum::Json;
use nsqlited_core::StatsSnapshot;

use crate::state::AppState;

pub async fn handle(State(state): State<AppState>) -> Json<StatsSnapshot> { Json(state.engine.stats().snapshot()) }
