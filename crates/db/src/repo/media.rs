use mediadesk_core::seasons::{EpisodeUpsert, Season, SeasonsDocument, UpsertOutcome};
use mediadesk_core::types::{Media, MediaDetails, MediaKind, MediaRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use tracing::debug;

use crate::DbError;

const SELECT_COLUMNS: &str = "SELECT id, kind, title, description, thumbnail, release_date, \
     language, rating, cast_json, video_links, download_links, total_seasons, seasons, \
     created_ts, updated_ts FROM media";

#[derive(Debug, sqlx::FromRow)]
struct MediaRow {
    id: i64,
    kind: String,
    title: String,
    description: Option<String>,
    thumbnail: Option<String>,
    release_date: Option<String>,
    language: Option<String>,
    rating: Option<f64>,
    cast_json: String,
    video_links: Option<String>,
    download_links: Option<String>,
    total_seasons: Option<i64>,
    seasons: Option<String>,
    created_ts: i64,
    updated_ts: i64,
}

impl MediaRow {
    fn into_record(self) -> Result<MediaRecord, DbError> {
        let kind: MediaKind = self.kind.parse().map_err(|message| DbError::Value {
            column: "kind",
            message,
        })?;

        let details = match kind {
            MediaKind::Movie => MediaDetails::Movie {
                video_links: parse_column("video_links", self.video_links.as_deref())?,
                download_links: parse_column("download_links", self.download_links.as_deref())?,
            },
            MediaKind::Tv => MediaDetails::Tv {
                total_seasons: self
                    .total_seasons
                    .map(u32::try_from)
                    .transpose()
                    .map_err(|e| DbError::Value {
                        column: "total_seasons",
                        message: e.to_string(),
                    })?,
                seasons: parse_column("seasons", self.seasons.as_deref())?,
            },
        };

        Ok(MediaRecord {
            id: self.id,
            media: Media {
                title: self.title,
                description: self.description,
                thumbnail: self.thumbnail,
                release_date: self.release_date,
                language: self.language,
                rating: self.rating,
                cast: parse_column("cast_json", Some(&self.cast_json))?,
                details,
            },
            created_ts: self.created_ts,
            updated_ts: self.updated_ts,
        })
    }
}

/// Parse a JSON text column. NULL, blank, and a literal `null` read as empty.
fn parse_column<T: DeserializeOwned + Default>(
    column: &'static str,
    raw: Option<&str>,
) -> Result<T, DbError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str::<Option<T>>(text)
            .map(Option::unwrap_or_default)
            .map_err(|source| DbError::Column { column, source }),
    }
}

fn encode_column<T: Serialize>(column: &'static str, value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|source| DbError::Column { column, source })
}

/// Column values for one write. Columns belonging to the other media type stay NULL.
struct WriteColumns {
    cast_json: String,
    video_links: Option<String>,
    download_links: Option<String>,
    total_seasons: Option<i64>,
    seasons: Option<String>,
}

impl WriteColumns {
    fn from_media(media: &Media) -> Result<Self, DbError> {
        let cast_json = encode_column("cast_json", &media.cast)?;
        Ok(match &media.details {
            MediaDetails::Movie {
                video_links,
                download_links,
            } => Self {
                cast_json,
                video_links: Some(encode_column("video_links", video_links)?),
                download_links: Some(encode_column("download_links", download_links)?),
                total_seasons: None,
                seasons: None,
            },
            MediaDetails::Tv {
                total_seasons,
                seasons,
            } => Self {
                cast_json,
                video_links: None,
                download_links: None,
                total_seasons: total_seasons.map(i64::from),
                seasons: Some(encode_column("seasons", seasons)?),
            },
        })
    }
}

/// List all media, optionally restricted to one kind, ordered by id.
pub async fn list_media(
    pool: &SqlitePool,
    kind: Option<MediaKind>,
) -> Result<Vec<MediaRecord>, DbError> {
    let rows: Vec<MediaRow> = match kind {
        Some(kind) => {
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE kind = ? ORDER BY id"))
                .bind(kind.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id"))
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(MediaRow::into_record).collect()
}

pub async fn get_media(pool: &SqlitePool, id: i64) -> Result<Option<MediaRecord>, DbError> {
    let row: Option<MediaRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(MediaRow::into_record).transpose()
}

pub async fn count_media(pool: &SqlitePool, kind: MediaKind) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media WHERE kind = ?")
        .bind(kind.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert a new record and return it as stored.
pub async fn insert_media(pool: &SqlitePool, media: &Media) -> Result<MediaRecord, DbError> {
    let cols = WriteColumns::from_media(media)?;
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO media (kind, title, description, thumbnail, release_date, language, \
         rating, cast_json, video_links, download_links, total_seasons, seasons, \
         created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(media.kind().as_str())
    .bind(&media.title)
    .bind(&media.description)
    .bind(&media.thumbnail)
    .bind(&media.release_date)
    .bind(&media.language)
    .bind(media.rating)
    .bind(&cols.cast_json)
    .bind(&cols.video_links)
    .bind(&cols.download_links)
    .bind(cols.total_seasons)
    .bind(&cols.seasons)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    debug!(media_id = id, kind = %media.kind(), "media inserted");

    get_media(pool, id)
        .await?
        .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
}

/// Replace every mapped column of a record. Returns `None` if the id is unknown.
pub async fn update_media(
    pool: &SqlitePool,
    id: i64,
    media: &Media,
) -> Result<Option<MediaRecord>, DbError> {
    let cols = WriteColumns::from_media(media)?;

    let result = sqlx::query(
        "UPDATE media SET kind = ?, title = ?, description = ?, thumbnail = ?, \
         release_date = ?, language = ?, rating = ?, cast_json = ?, video_links = ?, \
         download_links = ?, total_seasons = ?, seasons = ?, updated_ts = ? \
         WHERE id = ?",
    )
    .bind(media.kind().as_str())
    .bind(&media.title)
    .bind(&media.description)
    .bind(&media.thumbnail)
    .bind(&media.release_date)
    .bind(&media.language)
    .bind(media.rating)
    .bind(&cols.cast_json)
    .bind(&cols.video_links)
    .bind(&cols.download_links)
    .bind(cols.total_seasons)
    .bind(&cols.seasons)
    .bind(chrono::Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_media(pool, id).await
}

pub async fn delete_media(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM media WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Result of a single-episode write.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeWrite {
    pub outcome: UpsertOutcome,
    pub season: Season,
}

/// Read-modify-write of a TV record's seasons document inside one transaction.
/// Returns `None` when no TV record has this id.
///
/// The write lock is taken before the read, so concurrent writers queue on the
/// busy timeout instead of failing on a stale snapshot.
pub async fn upsert_episode(
    pool: &SqlitePool,
    media_id: i64,
    upsert: EpisodeUpsert,
) -> Result<Option<EpisodeWrite>, DbError> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT seasons FROM media WHERE id = ? AND kind = 'tv'")
            .bind(media_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((raw,)) = row else {
        return Ok(None);
    };

    let mut seasons: SeasonsDocument = parse_column("seasons", raw.as_deref())?;
    let season_number = upsert.season_number;
    let outcome = seasons.upsert_episode(upsert);

    sqlx::query("UPDATE media SET seasons = ?, updated_ts = ? WHERE id = ?")
        .bind(encode_column("seasons", &seasons)?)
        .bind(chrono::Utc::now().timestamp())
        .bind(media_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    debug!(media_id, season_number, ?outcome, "episode written");

    let season = seasons
        .season(season_number)
        .cloned()
        .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;
    Ok(Some(EpisodeWrite { outcome, season }))
}
