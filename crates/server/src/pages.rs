//! Server-rendered admin pages.
//!
//! Templates are compiled in with `include_str!` and filled by [`render`]:
//! `{{key}}` inserts an HTML-escaped value, `{{&key}}` inserts markup that
//! was already rendered. Unknown keys render as nothing.

use std::collections::HashMap;
use std::fmt::Write;

use axum::extract::State;
use axum::response::Html;
use mediadesk_core::error::ApiError;
use mediadesk_core::seasons::SeasonsDocument;
use mediadesk_core::types::{Media, MediaDetails, MediaKind};
use mediadesk_db::repo::media;

use crate::auth::AdminUser;
use crate::error::{ApiPath, AppError};
use crate::state::AppState;

const LAYOUT: &str = include_str!("../templates/layout.html");
const DASHBOARD: &str = include_str!("../templates/dashboard.html");
const MEDIA_FORM: &str = include_str!("../templates/media_form.html");
const MOVIE_FIELDS: &str = include_str!("../templates/movie_fields.html");
const TV_FIELDS: &str = include_str!("../templates/tv_fields.html");
const SEARCH: &str = include_str!("../templates/search.html");
const ADD_EPISODE: &str = include_str!("../templates/add_episode.html");

/// Values available to one template.
#[derive(Debug, Default)]
pub struct Context {
    values: HashMap<&'static str, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }
}

/// Single pass over the template. Inserted values are never re-scanned.
pub fn render(template: &str, ctx: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let tag = after[..end].trim();
        match tag.strip_prefix('&') {
            Some(key) => {
                if let Some(value) = ctx.values.get(key.trim()) {
                    out.push_str(value);
                }
            }
            None => {
                if let Some(value) = ctx.values.get(tag) {
                    out.push_str(&escape_html(value));
                }
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(heading: &str, body: String) -> Html<String> {
    Html(render(
        LAYOUT,
        &Context::new().set("heading", heading).set("body", body),
    ))
}

fn pretty_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Internal(format!("serialize error: {e}")).into())
}

fn media_form(
    id: Option<i64>,
    media: &Media,
    submit_label: &str,
) -> Result<String, AppError> {
    let type_fields = match &media.details {
        MediaDetails::Movie {
            video_links,
            download_links,
        } => render(
            MOVIE_FIELDS,
            &Context::new()
                .set("video_links_json", pretty_json(video_links)?)
                .set("download_links_json", pretty_json(download_links)?),
        ),
        MediaDetails::Tv {
            total_seasons,
            seasons,
        } => {
            let episode_link = id
                .map(|id| {
                    format!(
                        "  <p><a href=\"/admin/add_episode/{id}\">Add or update an episode</a></p>"
                    )
                })
                .unwrap_or_default();
            render(
                TV_FIELDS,
                &Context::new()
                    .set(
                        "total_seasons",
                        total_seasons.map(|n| n.to_string()).unwrap_or_default(),
                    )
                    .set("seasons_json", pretty_json(seasons)?)
                    .set("episode_link", episode_link),
            )
        }
    };

    Ok(render(
        MEDIA_FORM,
        &Context::new()
            .set("media_id", id.map(|id| id.to_string()).unwrap_or_default())
            .set("media_type", media.kind().as_str())
            .set("title", media.title.as_str())
            .set("description", media.description.clone().unwrap_or_default())
            .set("thumbnail", media.thumbnail.clone().unwrap_or_default())
            .set("release_date", media.release_date.clone().unwrap_or_default())
            .set("language", media.language.clone().unwrap_or_default())
            .set(
                "rating",
                media.rating.map(|r| r.to_string()).unwrap_or_default(),
            )
            .set("cast_json", pretty_json(&media.cast)?)
            .set("type_fields", type_fields)
            .set("submit_label", submit_label),
    ))
}

fn empty_media(kind: MediaKind) -> Media {
    let details = match kind {
        MediaKind::Movie => MediaDetails::Movie {
            video_links: Default::default(),
            download_links: Default::default(),
        },
        MediaKind::Tv => MediaDetails::Tv {
            total_seasons: None,
            seasons: SeasonsDocument::default(),
        },
    };
    Media {
        title: String::new(),
        description: None,
        thumbnail: None,
        release_date: None,
        language: None,
        rating: None,
        cast: Vec::new(),
        details,
    }
}

fn seasons_summary(seasons: &SeasonsDocument) -> String {
    if seasons.is_empty() {
        return "  <p>No seasons yet.</p>".to_string();
    }

    let mut out = String::from("  <ul>\n");
    for season in seasons.seasons() {
        let names: Vec<String> = season
            .episodes
            .iter()
            .map(|ep| format!("{}. {}", ep.episode_number, escape_html(&ep.episode_name)))
            .collect();
        let _ = writeln!(
            out,
            "    <li>Season {} ({} episodes): {}</li>",
            season.season_number,
            season.total_episodes,
            names.join(", ")
        );
    }
    out.push_str("  </ul>");
    out
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn dashboard(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let movie_count = media::count_media(&state.db, MediaKind::Movie).await?;
    let tv_count = media::count_media(&state.db, MediaKind::Tv).await?;

    let body = render(
        DASHBOARD,
        &Context::new()
            .set("movie_count", movie_count.to_string())
            .set("tv_count", tv_count.to_string()),
    );
    Ok(page("Dashboard", body))
}

pub async fn add_movie(_admin: AdminUser) -> Result<Html<String>, AppError> {
    let body = media_form(None, &empty_media(MediaKind::Movie), "Add movie")?;
    Ok(page("Add movie", body))
}

pub async fn add_tv(_admin: AdminUser) -> Result<Html<String>, AppError> {
    let body = media_form(None, &empty_media(MediaKind::Tv), "Add TV show")?;
    Ok(page("Add TV show", body))
}

pub async fn search(_admin: AdminUser) -> Html<String> {
    page("Search", render(SEARCH, &Context::new()))
}

pub async fn edit(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Html<String>, AppError> {
    let record = media::get_media(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {id} not found")))?;

    let body = media_form(Some(record.id), &record.media, "Save changes")?;
    Ok(page(&format!("Edit: {}", record.media.title), body))
}

pub async fn add_episode(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Html<String>, AppError> {
    let record = media::get_media(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {id} not found")))?;

    let MediaDetails::Tv { seasons, .. } = &record.media.details else {
        return Err(ApiError::NotFound(format!("TV show {id} not found")).into());
    };

    let body = render(
        ADD_EPISODE,
        &Context::new()
            .set("media_id", record.id.to_string())
            .set("seasons_summary", seasons_summary(seasons)),
    );
    Ok(page(&format!("Add episode to \"{}\"", record.media.title), body))
}
