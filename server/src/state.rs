//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use nsqlited_core::Engine;

use crate::auth::AuthSettings;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, auth: AuthSettings) -> Self { Self { engine, auth: Arc::new(auth) } }
}
