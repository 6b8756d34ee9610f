use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::seasons::SeasonsDocument;

static RELEASE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Media kind stored in the `media.kind` column and exposed as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A downloadable file for one quality, e.g. `{"url": "...", "file_type": "webrip"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_type: String,
}

/// Type-specific columns. The `type` tag doubles as the record discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaDetails {
    Movie {
        #[serde(default, deserialize_with = "null_as_default")]
        video_links: BTreeMap<String, String>,
        #[serde(default, deserialize_with = "null_as_default")]
        download_links: BTreeMap<String, DownloadLink>,
    },
    Tv {
        #[serde(default)]
        total_seasons: Option<u32>,
        #[serde(default, deserialize_with = "null_as_default")]
        seasons: SeasonsDocument,
    },
}

impl MediaDetails {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Movie { .. } => MediaKind::Movie,
            Self::Tv { .. } => MediaKind::Tv,
        }
    }
}

/// The writable fields of a media record; also the admin create/update body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cast: Vec<CastMember>,
    #[serde(flatten)]
    pub details: MediaDetails,
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        self.details.kind()
    }

    /// Trim and validate an incoming payload. Blank optional text becomes `None`
    /// and every season's `total_episodes` is recomputed.
    pub fn normalize(mut self) -> Result<Self, ApiError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(ApiError::BadRequest("title is required".into()));
        }

        self.description = blank_to_none(self.description);
        self.thumbnail = blank_to_none(self.thumbnail);
        self.release_date = blank_to_none(self.release_date);
        self.language = blank_to_none(self.language);

        if let Some(date) = &self.release_date {
            if !RELEASE_DATE_RE.is_match(date) {
                return Err(ApiError::BadRequest(format!(
                    "release_date must be YYYY-MM-DD, got {date:?}"
                )));
            }
        }

        if let Some(rating) = self.rating {
            if !rating.is_finite() || !(0.0..=10.0).contains(&rating) {
                return Err(ApiError::BadRequest(
                    "rating must be between 0 and 10".into(),
                ));
            }
        }

        if self.cast.iter().any(|m| m.name.trim().is_empty()) {
            return Err(ApiError::BadRequest("cast members need a name".into()));
        }

        match &mut self.details {
            MediaDetails::Movie {
                video_links,
                download_links,
            } => {
                if video_links.keys().chain(download_links.keys()).any(|k| k.trim().is_empty()) {
                    return Err(ApiError::BadRequest("link quality must not be empty".into()));
                }
            }
            MediaDetails::Tv { seasons, .. } => {
                seasons
                    .normalize()
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
        }

        Ok(self)
    }
}

/// A stored media record as served by the JSON API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    #[serde(flatten)]
    pub media: Media,
    pub created_ts: i64,
    pub updated_ts: i64,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
