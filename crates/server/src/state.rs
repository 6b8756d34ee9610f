use std::sync::Arc;

use mediadesk_metadata::provider::MetadataProvider;
use sqlx::SqlitePool;

use crate::auth::AdminCredentials;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub admin: Arc<AdminCredentials>,
    /// `None` when no metadata API key is configured.
    pub metadata: Option<Arc<dyn MetadataProvider>>,
}
