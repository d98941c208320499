//! NSQLited HTTP surface
//!
//! Exposes the engine over four routes: `/health`, `/version`, `/stats` and
//! `/query`. Everything except `/health` sits behind the bearer-token auth
//! middleware (disabled when no token is configured), and every handler
//! failure funnels through [`error::ApiError`] so clients get a safe message
//! plus a correlation id while the real cause lands in the server log.

mod health;
mod query;
mod request;
mod stats;
mod version;

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use auth::AuthSettings;
pub use config::{AuthAlgorithm, Config};
pub use server::Server;
pub use state::AppState;
