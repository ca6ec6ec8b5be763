//! Episode metadata lookup
//!
//! [`MetadataProvider`] is implemented by the host's metadata API client (and
//! by the offline snapshot provider in `core-sync`). When a lookup fails the
//! sync worker falls back to [`synthesize_metadata`], which derives a minimal
//! record from the remote media and the files on disk.

use crate::error::Result;
use async_trait::async_trait;
use core_library::models::{
    AnimeMetadata, BaseAnime, EpisodeMetadata, LocalFile, LocalFileType,
};
use std::collections::{BTreeMap, BTreeSet};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Episode-level metadata for a media id
    async fn get_anime_metadata(&self, media_id: i32) -> Result<AnimeMetadata>;
}

/// Build metadata from the media record and its local files.
///
/// Every local episode key gets an entry. Episode images point at the media
/// banner, or the cover when there is no banner.
pub fn synthesize_metadata(media: &BaseAnime, local_files: &[LocalFile]) -> AnimeMetadata {
    let mut titles = BTreeMap::new();
    if let Some(title) = &media.title {
        let languages = [
            ("en", &title.english),
            ("x-jat", &title.romaji),
            ("ja", &title.native),
        ];
        for (language, value) in languages {
            if let Some(value) = value {
                titles.insert(language.to_string(), value.clone());
            }
        }
    }

    let image = media
        .banner_image
        .clone()
        .or_else(|| media.cover_url().map(str::to_string));

    let mut episodes = BTreeMap::new();
    let mut specials = BTreeSet::new();
    let mut highest_main = 0;

    for file in local_files.iter().filter(|f| f.media_id == media.id) {
        let Some(key) = file.episode_key() else {
            continue;
        };

        match file.metadata.kind {
            LocalFileType::Main => highest_main = highest_main.max(file.metadata.episode),
            LocalFileType::Special => {
                specials.insert(key.to_string());
            }
            LocalFileType::Nc => {}
        }

        episodes
            .entry(key.to_string())
            .or_insert_with(|| EpisodeMetadata {
                episode: key.to_string(),
                episode_number: file.metadata.episode,
                title: Some(format!("Episode {}", file.metadata.episode)),
                image: image.clone(),
                ..Default::default()
            });
    }

    AnimeMetadata {
        titles,
        episode_count: media.episodes.unwrap_or(highest_main),
        special_count: specials.len() as i32,
        episodes,
    }
}
