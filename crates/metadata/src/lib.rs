pub mod provider;
pub mod tmdb;

use mediadesk_core::types::CastMember;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
}

/// Provider data reshaped into the local media field names, used to pre-fill
/// the admin forms.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FetchedMedia {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub release_date: Option<String>,
    pub language: Option<String>,
    pub rating: Option<f64>,
    pub cast: Vec<CastMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_seasons: Option<u32>,
}
