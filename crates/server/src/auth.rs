use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mediadesk_core::error::ApiError;
use password_hash::rand_core::OsRng;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

/// Challenge sent with every 401 so browsers prompt for credentials.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"Login Required\"";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hash error: {0}")]
    Hash(String),
}

/// The single admin account, configured at startup.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdminCredentials {
    /// Use a precomputed argon2 PHC string.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    /// Hash a plaintext password once, at startup.
    pub fn from_password(
        username: impl Into<String>,
        password: &str,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            username: username.into(),
            password_hash: hash_password(password)?,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Both checks always run so a wrong username costs as much as a wrong password.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok: bool = self.username.as_bytes().ct_eq(username.as_bytes()).into();
        let pass_ok = PasswordHash::new(&self.password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false);
        user_ok && pass_ok
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Decode an `Authorization: Basic <base64(user:pass)>` header value.
pub fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Extractor for admin routes. Rejects with 401 and a Basic challenge.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("authorization required".into()))?;

        let (username, password) = parse_basic(value)
            .ok_or_else(|| ApiError::Unauthorized("invalid authorization header".into()))?;

        // argon2 is CPU-bound; keep it off the async workers.
        let admin = Arc::clone(&state.admin);
        let candidate = username.clone();
        let valid = tokio::task::spawn_blocking(move || admin.verify(&candidate, &password))
            .await
            .map_err(|e| ApiError::Internal(format!("auth task failed: {e}")))?;

        if !valid {
            warn!(username = %username, "admin authentication failed");
            return Err(ApiError::Unauthorized("invalid credentials".into()).into());
        }

        Ok(AdminUser { username })
    }
}
