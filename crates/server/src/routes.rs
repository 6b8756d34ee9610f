use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mediadesk_core::error::ApiError;
use mediadesk_core::seasons::EpisodeUpsert;
use mediadesk_core::types::{Media, MediaKind, MediaRecord};
use mediadesk_db::repo::media::{self, EpisodeWrite};
use mediadesk_metadata::{FetchedMedia, MetadataError};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::AdminUser;
use crate::error::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::pages;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", public_router())
        .nest("/admin", admin_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/media", get(list_media))
        .route("/media/{id}", get(get_media))
}

fn admin_router() -> Router<AppState> {
    Router::new()
        // JSON API
        .route("/media", post(create_media))
        .route("/media/{id}", put(update_media).delete(delete_media))
        .route("/episode/{id}", post(upsert_episode))
        .route("/update_episode/{id}", post(upsert_episode))
        .route("/tmdb_fetch", post(tmdb_fetch))
        // Pages
        .route("/", get(pages::dashboard))
        .route("/add_movie", get(pages::add_movie))
        .route("/add_tv", get(pages::add_tv))
        .route("/search", get(pages::search))
        .route("/edit/{id}", get(pages::edit))
        .route("/add_episode/{id}", get(pages::add_episode))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Public media API
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<MediaKind>,
}

async fn list_media(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<MediaRecord>>, AppError> {
    let records = media::list_media(&state.db, query.kind).await?;
    Ok(Json(records))
}

async fn get_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MediaRecord>, AppError> {
    let record = media::get_media(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {id} not found")))?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Admin media API
// ---------------------------------------------------------------------------

async fn create_media(
    admin: AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Media>,
) -> Result<(StatusCode, Json<MediaRecord>), AppError> {
    let body = body.normalize()?;
    let record = media::insert_media(&state.db, &body).await?;

    info!(
        media_id = record.id,
        kind = %body.kind(),
        admin = %admin.username,
        "media created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_media(
    admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<Media>,
) -> Result<Json<MediaRecord>, AppError> {
    let body = body.normalize()?;
    let record = media::update_media(&state.db, id, &body)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {id} not found")))?;

    info!(media_id = id, admin = %admin.username, "media updated");
    Ok(Json(record))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_media(
    admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !media::delete_media(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("media {id} not found")).into());
    }

    info!(media_id = id, admin = %admin.username, "media deleted");
    Ok(Json(DeleteResponse { deleted: true }))
}

async fn upsert_episode(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<EpisodeUpsert>,
) -> Result<Json<EpisodeWrite>, AppError> {
    body.validate()?;
    let write = media::upsert_episode(&state.db, id, body)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("TV show {id} not found")))?;
    Ok(Json(write))
}

// ---------------------------------------------------------------------------
// Metadata lookup
// ---------------------------------------------------------------------------

/// The forms send the ID as typed, so accept both `27205` and `"27205"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderId {
    Number(u64),
    Text(String),
}

impl ProviderId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TmdbFetchRequest {
    #[serde(default)]
    tmdb_id: Option<ProviderId>,
    #[serde(default)]
    media_type: Option<MediaKind>,
}

async fn tmdb_fetch(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TmdbFetchRequest>,
) -> Result<Json<FetchedMedia>, AppError> {
    let provider_id = body
        .tmdb_id
        .map(ProviderId::into_string)
        .filter(|id| !id.is_empty());
    let (Some(provider_id), Some(kind)) = (provider_id, body.media_type) else {
        return Err(ApiError::BadRequest("tmdb_id and media_type are required".into()).into());
    };

    let Some(provider) = state.metadata.as_ref() else {
        warn!("metadata lookup requested but no provider is configured");
        return Err(ApiError::NotFound("metadata provider not configured".into()).into());
    };

    let fetched = provider
        .fetch(&provider_id, kind)
        .await
        .map_err(|e: MetadataError| {
            warn!(
                provider = provider.name(),
                provider_id = %provider_id,
                kind = %kind,
                error = %e,
                "metadata fetch failed"
            );
            ApiError::NotFound(format!("failed to fetch from {}", provider.name()))
        })?;
    Ok(Json(fetched))
}
