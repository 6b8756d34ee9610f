use mediadesk_core::types::MediaKind;

use crate::{FetchedMedia, MetadataError};

/// A metadata source that can look up a title by its provider ID.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch one movie or TV show and reshape it into local field names.
    async fn fetch(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<FetchedMedia, MetadataError>;
}
