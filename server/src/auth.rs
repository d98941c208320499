//! Bearer-token auth middleware
//!
//! Disabled entirely when no token is configured. The configured token is
//! either the expected plaintext (compared in constant time) or an encoded
//! argon2 / bcrypt hash the presented token is verified against.

use std::net::SocketAddr;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::config::AuthAlgorithm;
use crate::error::ApiError;
use crate::state::AppState;

pub struct AuthSettings {
    pub token: String,
    pub algorithm: AuthAlgorithm,
}

impl AuthSettings {
    pub fn disabled() -> Self { Self { token: String::new(), algorithm: AuthAlgorithm::Plaintext } }

    pub fn enabled(&self) -> bool { !self.token.is_empty() }

    pub fn verify(&self, presented: &str) -> bool {
        match self.algorithm {
            AuthAlgorithm::Plaintext => bool::from(presented.as_bytes().ct_eq(self.token.as_bytes())),
            AuthAlgorithm::Argon2 => match PasswordHash::new(&self.token) {
                Ok(hash) => Argon2::default().verify_password(presented.as_bytes(), &hash).is_ok(),
                Err(_) => false,
            },
            AuthAlgorithm::Bcrypt => bcrypt::verify(presented, &self.token).unwrap_or(false),
        }
    }
}

pub async fn require_token(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.enabled() {
        return Ok(next.run(request).await);
    }

    let presented = request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(strip_bearer).unwrap_or("");

    if !presented.is_empty() && state.auth.verify(presented) {
        return Ok(next.run(request).await);
    }

    let client = connect_info.map(|ConnectInfo(addr)| addr);
    Err(ApiError::unauthorized("invalid or missing auth token").with_request(client, request.uri().to_string()))
}

fn strip_bearer(header: &str) -> &str {
    let trimmed = header.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &trimmed[7..],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    #[test]
    fn bearer_prefix_is_stripped_case_insensitively() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("bearer abc"), "abc");
        assert_eq!(strip_bearer("BEARER abc"), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
    }

    #[test]
    fn plaintext_tokens_compare_exactly() {
        let settings = AuthSettings { token: "secret".to_string(), algorithm: AuthAlgorithm::Plaintext };
        assert!(settings.verify("secret"));
        assert!(!settings.verify("secre"));
        assert!(!settings.verify("secret2"));
    }

    #[test]
    fn argon2_hashes_verify() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(b"secret", &salt).unwrap().to_string();
        let settings = AuthSettings { token: hash, algorithm: AuthAlgorithm::Argon2 };
        assert!(settings.verify("secret"));
        assert!(!settings.verify("wrong"));
    }

    #[test]
    fn bcrypt_hashes_verify() {
        let hash = bcrypt::hash("secret", 4).unwrap();
        let settings = AuthSettings { token: hash, algorithm: AuthAlgorithm::Bcrypt };
        assert!(settings.verify("secret"));
        assert!(!settings.verify("wrong"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let settings = AuthSettings { token: "not-a-hash".to_string(), algorithm: AuthAlgorithm::Argon2 };
        assert!(!settings.verify("anything"));
        let settings = AuthSettings { token: "not-a-hash".to_string(), algorithm: AuthAlgorithm::Bcrypt };
        assert!(!settings.verify("anything"));
    }
}
