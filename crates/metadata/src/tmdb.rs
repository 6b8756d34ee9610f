//! TMDB (The Movie Database) provider client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use std::time::Duration;

use mediadesk_core::types::{CastMember, MediaKind};
use tracing::debug;

use crate::provider::MetadataProvider;
use crate::{FetchedMedia, MetadataError};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_CAST_LIMIT: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    /// How many top-billed cast members to keep.
    pub cast_limit: usize,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cast_limit: DEFAULT_CAST_LIMIT,
        }
    }
}

pub struct TmdbClient {
    config: TmdbConfig,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MetadataError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let mut all_params = vec![("api_key", self.config.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn fetch(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<FetchedMedia, MetadataError> {
        let provider_id = provider_id.trim();
        if provider_id.is_empty() || !provider_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(MetadataError::NotFound);
        }

        let path = match kind {
            MediaKind::Movie => format!("/movie/{provider_id}"),
            MediaKind::Tv => format!("/tv/{provider_id}"),
        };
        let data = self
            .get_json(&path, &[("append_to_response", "credits")])
            .await?;

        Ok(parse_media(&data, kind, self.config.cast_limit))
    }
}

fn parse_media(data: &serde_json::Value, kind: MediaKind, cast_limit: usize) -> FetchedMedia {
    let (title_key, date_key) = match kind {
        MediaKind::Movie => ("title", "release_date"),
        MediaKind::Tv => ("name", "first_air_date"),
    };

    FetchedMedia {
        title: data[title_key].as_str().map(|s| s.to_string()),
        description: data["overview"].as_str().map(|s| s.to_string()),
        thumbnail: data["poster_path"]
            .as_str()
            .map(|p| format!("{IMAGE_BASE}{p}")),
        release_date: data[date_key]
            .as_str()
            .filter(|d| !d.is_empty())
            .map(|s| s.to_string()),
        language: data["original_language"].as_str().map(|s| s.to_string()),
        rating: data["vote_average"].as_f64(),
        cast: extract_cast(data.get("credits"), cast_limit),
        total_seasons: match kind {
            MediaKind::Movie => None,
            MediaKind::Tv => data["number_of_seasons"]
                .as_u64()
                .and_then(|n| u32::try_from(n).ok()),
        },
    }
}

fn extract_cast(credits: Option<&serde_json::Value>, limit: usize) -> Vec<CastMember> {
    let Some(cast) = credits.and_then(|c| c["cast"].as_array()) else {
        return Vec::new();
    };

    cast.iter()
        .filter_map(|person| {
            let name = person["name"].as_str()?;
            Some(CastMember {
                name: name.to_string(),
                character: person["character"].as_str().map(|s| s.to_string()),
                image: person["profile_path"]
                    .as_str()
                    .map(|p| format!("{IMAGE_BASE}{p}")),
            })
        })
        .take(limit)
        .collect()
}
