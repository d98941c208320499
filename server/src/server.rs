//! Router assembly and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{middleware, Router};
use nsqlited_core::Engine;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::auth::{self, AuthSettings};
use crate::config::Config;
use crate::state::AppState;
use crate::{health, query, stats, version};

pub struct Server {
    bind_address: String,
    state: AppState,
}

impl Server {
    pub fn new(engine: Arc<Engine>, config: &Config) -> Self {
        let auth = AuthSettings { token: config.auth_token.clone(), algorithm: config.auth_token_algorithm };
        Self { bind_address: config.bind_address(), state: AppState::new(engine, auth) }
    }

    pub async fn run(self) -> Result<()> {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("listening on {}", listener.local_addr()?);

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

/// Build the route table. `/health` stays outside the auth middleware; the
/// server headers apply to every response.
pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/version", get(version::handle))
        .route("/stats", get(stats::handle))
        .route("/query", post(query::handle))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token));

    Router::new()
        .route("/health", get(health::handle))
        .merge(authenticated)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("x-server"), HeaderValue::from_static("NSQLite")))
                .layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("x-nsqlite"), HeaderValue::from_static("true")))
                .into_inner(),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
