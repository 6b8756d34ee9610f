use std::sync::Arc;

use anyhow::Context;
use mediadesk_metadata::provider::MetadataProvider;
use mediadesk_metadata::tmdb::TmdbClient;
use mediadesk_server::config::{AdminPassword, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    info!(db_path = %config.db_path, "connecting to database");
    let pool = mediadesk_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;

    mediadesk_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    if config.admin_password == AdminPassword::Unset {
        warn!(
            username = %config.admin_username,
            "no admin password configured, falling back to the default; set MEDIADESK_ADMIN_PASSWORD_HASH"
        );
    }
    let admin = config
        .admin_credentials()
        .context("failed to prepare admin credentials")?;

    let metadata: Option<Arc<dyn MetadataProvider>> = match config.tmdb.clone() {
        Some(tmdb) => {
            let client = TmdbClient::new(tmdb).context("failed to build TMDB client")?;
            info!("TMDB metadata lookups enabled");
            Some(Arc::new(client))
        }
        None => {
            info!("MEDIADESK_TMDB_API_KEY not set, metadata lookups disabled");
            None
        }
    };

    let state = mediadesk_server::state::AppState {
        db: pool,
        admin: Arc::new(admin),
        metadata,
    };

    let app = mediadesk_server::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind_addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
