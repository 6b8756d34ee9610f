//! Process configuration, read from `MEDIADESK_*` environment variables.

use std::time::Duration;

use argon2::password_hash::PasswordHash;
use mediadesk_metadata::tmdb::{DEFAULT_CAST_LIMIT, DEFAULT_TIMEOUT, TmdbConfig};

use crate::auth::{AdminCredentials, AuthError};

pub const DEFAULT_DB_PATH: &str = "mediadesk.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Where the admin password comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum AdminPassword {
    /// Argon2 PHC string, used as-is.
    Hash(String),
    /// Plaintext, hashed once at startup.
    Plain(String),
    Unset,
}

impl std::fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hash(_) => "Hash(..)",
            Self::Plain(_) => "Plain(..)",
            Self::Unset => "Unset",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: String,
    pub bind_addr: String,
    pub admin_username: String,
    pub admin_password: AdminPassword,
    /// Metadata lookups are disabled when no API key is set.
    pub tmdb: Option<TmdbConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let admin_password = match (
            get("MEDIADESK_ADMIN_PASSWORD_HASH"),
            get("MEDIADESK_ADMIN_PASSWORD"),
        ) {
            (Some(hash), _) => {
                PasswordHash::new(&hash).map_err(|e| ConfigError::Invalid {
                    key: "MEDIADESK_ADMIN_PASSWORD_HASH",
                    message: format!("not an argon2 PHC string: {e}"),
                })?;
                AdminPassword::Hash(hash)
            }
            (None, Some(plain)) => AdminPassword::Plain(plain),
            (None, None) => AdminPassword::Unset,
        };

        let tmdb = match get("MEDIADESK_TMDB_API_KEY") {
            Some(api_key) => {
                let mut tmdb = TmdbConfig::new(api_key);
                if let Some(base_url) = get("MEDIADESK_TMDB_BASE_URL") {
                    tmdb.base_url = base_url;
                }
                tmdb.timeout = parse_number(
                    "MEDIADESK_TMDB_TIMEOUT_SECS",
                    get("MEDIADESK_TMDB_TIMEOUT_SECS"),
                )?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT);
                tmdb.cast_limit = parse_number(
                    "MEDIADESK_TMDB_CAST_LIMIT",
                    get("MEDIADESK_TMDB_CAST_LIMIT"),
                )?
                .unwrap_or(DEFAULT_CAST_LIMIT);
                Some(tmdb)
            }
            None => None,
        };

        Ok(Self {
            db_path: get("MEDIADESK_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            bind_addr: get("MEDIADESK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            admin_username: get("MEDIADESK_ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password,
            tmdb,
        })
    }

    /// Resolve the admin account. Hashes a plaintext or default password.
    pub fn admin_credentials(&self) -> Result<AdminCredentials, AuthError> {
        match &self.admin_password {
            AdminPassword::Hash(hash) => {
                AdminCredentials::new(&self.admin_username, hash.as_str())
            }
            AdminPassword::Plain(plain) => {
                AdminCredentials::from_password(&self.admin_username, plain)
            }
            AdminPassword::Unset => {
                AdminCredentials::from_password(&self.admin_username, DEFAULT_ADMIN_PASSWORD)
            }
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                message: format!("{v:?}: {e}"),
            })
        })
        .transpose()
}
