//! The seasons document stored in the `media.seasons` column.
//!
//! Shape: `{"season_1": {"season_number": 1, "total_episodes": 2, "episodes": [...]}}`.
//! Episode objects carry their links flat, keyed by quality:
//! `{"episode_number": 1, "episode_name": "Pilot", "video_720p": "https://...",
//!   "download_720p": {"url": "https://...", "file_type": "webrip"}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ApiError;
use crate::types::{DownloadLink, null_as_default};

pub const SEASON_KEY_PREFIX: &str = "season_";

const RESERVED_EPISODE_KEYS: [&str; 2] = ["episode_number", "episode_name"];
const NESTED_LINK_KEYS: [&str; 2] = ["video_links", "download_links"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeasonsError {
    #[error("season key {0:?} must look like \"season_<number>\"")]
    InvalidKey(String),
    #[error("season key {key:?} does not match season_number {season_number}")]
    KeyMismatch { key: String, season_number: u32 },
}

/// Mapping from `season_<N>` to the season's episode list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonsDocument(BTreeMap<String, Season>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,
    #[serde(default)]
    pub total_episodes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: Vec<Episode>,
}

impl Season {
    fn empty(season_number: u32) -> Self {
        Self {
            season_number,
            total_episodes: 0,
            episodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Episode {
    pub episode_number: u32,
    pub episode_name: String,
    #[serde(flatten)]
    pub links: BTreeMap<String, EpisodeLink>,
}

/// A per-quality link on an episode: a bare stream URL or a download object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpisodeLink {
    Stream(String),
    Download(DownloadLink),
}

// Documents written with nested `video_links`/`download_links` objects are
// flattened here so both layouts read back the same way.
impl TryFrom<Map<String, Value>> for Episode {
    type Error = String;

    fn try_from(mut raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let episode_number = raw
            .remove("episode_number")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .ok_or("episode_number must be a non-negative integer")?;

        let episode_name = match raw.remove("episode_name") {
            Some(Value::String(name)) => name,
            Some(Value::Null) | None => String::new(),
            Some(_) => return Err("episode_name must be a string".into()),
        };

        let mut links = BTreeMap::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }
            if NESTED_LINK_KEYS.contains(&key.as_str()) {
                if let Value::Object(nested) = value {
                    for (quality, link) in nested {
                        if !link.is_null() && !RESERVED_EPISODE_KEYS.contains(&quality.as_str()) {
                            let parsed = parse_link(&quality, link)?;
                            links.insert(quality, parsed);
                        }
                    }
                    continue;
                }
            }
            let parsed = parse_link(&key, value)?;
            links.insert(key, parsed);
        }

        Ok(Self {
            episode_number,
            episode_name,
            links,
        })
    }
}

fn parse_link(quality: &str, value: Value) -> Result<EpisodeLink, String> {
    serde_json::from_value(value).map_err(|_| {
        format!("episode link {quality:?} must be a URL or an object with url and file_type")
    })
}

/// Whether an episode write appended a new entry or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Body of the admin episode endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeUpsert {
    #[serde(default)]
    pub season_number: u32,
    #[serde(default)]
    pub episode_number: u32,
    #[serde(default)]
    pub episode_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_links: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_links: BTreeMap<String, DownloadLink>,
}

impl EpisodeUpsert {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.season_number == 0 || self.episode_number == 0 || self.episode_name.trim().is_empty()
        {
            return Err(ApiError::BadRequest(
                "season and episode details are required".into(),
            ));
        }

        for quality in self.video_links.keys().chain(self.download_links.keys()) {
            if quality.trim().is_empty() || RESERVED_EPISODE_KEYS.contains(&quality.as_str()) {
                return Err(ApiError::BadRequest(format!(
                    "invalid link quality {quality:?}"
                )));
            }
        }

        if let Some(dup) = self
            .video_links
            .keys()
            .find(|q| self.download_links.contains_key(*q))
        {
            return Err(ApiError::BadRequest(format!(
                "quality {dup:?} appears in both video_links and download_links"
            )));
        }

        Ok(())
    }

    fn into_episode(self) -> Episode {
        let mut links: BTreeMap<String, EpisodeLink> = self
            .video_links
            .into_iter()
            .map(|(quality, url)| (quality, EpisodeLink::Stream(url)))
            .collect();
        links.extend(
            self.download_links
                .into_iter()
                .map(|(quality, link)| (quality, EpisodeLink::Download(link))),
        );

        Episode {
            episode_number: self.episode_number,
            episode_name: self.episode_name.trim().to_string(),
            links,
        }
    }
}

impl SeasonsDocument {
    pub fn season_key(season_number: u32) -> String {
        format!("{SEASON_KEY_PREFIX}{season_number}")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn season(&self, season_number: u32) -> Option<&Season> {
        self.0.get(&Self::season_key(season_number))
    }

    /// Seasons in numeric order (map keys sort "season_10" before "season_2").
    pub fn seasons(&self) -> Vec<&Season> {
        let mut seasons: Vec<&Season> = self.0.values().collect();
        seasons.sort_by_key(|s| s.season_number);
        seasons
    }

    /// Insert the episode, or overwrite the entry with the same episode number
    /// in place. The episode keeps its position when updated.
    pub fn upsert_episode(&mut self, upsert: EpisodeUpsert) -> UpsertOutcome {
        let season_number = upsert.season_number;
        let season = self
            .0
            .entry(Self::season_key(season_number))
            .or_insert_with(|| Season::empty(season_number));

        let episode = upsert.into_episode();
        let outcome = match season
            .episodes
            .iter_mut()
            .find(|e| e.episode_number == episode.episode_number)
        {
            Some(existing) => {
                existing.episode_name = episode.episode_name;
                existing.links = episode.links;
                UpsertOutcome::Updated
            }
            None => {
                season.episodes.push(episode);
                UpsertOutcome::Inserted
            }
        };

        season.total_episodes = season.episodes.len() as u32;
        outcome
    }

    /// Check key/number agreement and recompute `total_episodes` for every season.
    pub fn normalize(&mut self) -> Result<(), SeasonsError> {
        for (key, season) in self.0.iter_mut() {
            let number: u32 = key
                .strip_prefix(SEASON_KEY_PREFIX)
                .and_then(|n| n.parse().ok())
                .filter(|n| *key == Self::season_key(*n))
                .ok_or_else(|| SeasonsError::InvalidKey(key.clone()))?;
            if number != season.season_number {
                return Err(SeasonsError::KeyMismatch {
                    key: key.clone(),
                    season_number: season.season_number,
                });
            }
            season.total_episodes = season.episodes.len() as u32;
        }
        Ok(())
    }
}
