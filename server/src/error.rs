//! The single sink for handler errors
//!
//! Every failing handler produces an [`ApiError`]. Rendering one assigns a
//! correlation id, logs the detailed cause together with the client address
//! and request URL, and sends the client only a safe message plus the id.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    /// Safe message sent to the client; empty falls back to the status text.
    message: String,
    /// Real cause, logged server-side only.
    detail: String,
    /// Unknown failures respond with plain text instead of the JSON envelope.
    plain: bool,
    client: Option<SocketAddr>,
    url: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), detail: detail.into(), plain: false, client: None, url: String::new() }
    }

    pub fn bad_request(detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail, message)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, detail, "Unauthorized") }

    pub fn internal(detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail, message)
    }

    /// An unclassified failure; responds `Internal Server Error - <id>` as
    /// plain text so nothing about the cause leaks.
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self { plain: true, ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail, "") }
    }

    /// Attach request context for the server-side log line.
    pub fn with_request(mut self, client: Option<SocketAddr>, url: impl Into<String>) -> Self {
        self.client = client;
        self.url = url.into();
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let id = Uuid::new_v4().to_string();
        let client = self.client.map(|addr| addr.to_string()).unwrap_or_default();

        if self.plain {
            error!(id = %id, error = %self.detail, url = %self.url, ip = %client, "unknown error while handling request");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal Server Error - {id}")).into_response();
        }

        let status_text = self.status.canonical_reason().unwrap_or("Error");
        let message = if self.message.is_empty() { status_text.to_string() } else { self.message };
        error!(
            id = %id,
            status = self.status.as_u16(),
            error = %self.detail,
            message = %message,
            url = %self.url,
            ip = %client,
            "error while handling request"
        );

        (self.status, Json(json!({ "id": id, "error": status_text, "message": message }))).into_response()
    }
}
