//! # Domain Models
//!
//! Types shared by the stores and the sync engine.
//!
//! - Remote collection: [`AnimeCollection`] > [`AnimeList`] > [`AnimeListEntry`] > [`BaseAnime`]
//! - Local inventory: [`LocalFile`]
//! - Offline state: [`TrackedMedia`], [`AnimeSnapshot`], [`AnimeMetadata`]
//!
//! Remote fields that can be missing upstream are `Option`s all the way
//! through. A missing score is `None`, never `0.0`, and serializes as `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;

// ============================================================================
// Remote collection
// ============================================================================

/// Watch status of a list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaListStatus {
    Current,
    Planning,
    Completed,
    Dropped,
    Paused,
    Repeating,
}

impl MediaListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaListStatus::Current => "CURRENT",
            MediaListStatus::Planning => "PLANNING",
            MediaListStatus::Completed => "COMPLETED",
            MediaListStatus::Dropped => "DROPPED",
            MediaListStatus::Paused => "PAUSED",
            MediaListStatus::Repeating => "REPEATING",
        }
    }
}

/// A date where every part may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
    pub user_preferred: Option<String>,
}

impl MediaTitle {
    /// The user's preferred title, falling back through romaji, english and native.
    pub fn preferred(&self) -> &str {
        self.user_preferred
            .as_deref()
            .or(self.romaji.as_deref())
            .or(self.english.as_deref())
            .or(self.native.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
    pub color: Option<String>,
}

impl CoverImage {
    /// Largest available cover URL.
    pub fn best(&self) -> Option<&str> {
        self.extra_large
            .as_deref()
            .or(self.large.as_deref())
            .or(self.medium.as_deref())
    }
}

/// Media object as returned by the remote source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseAnime {
    pub id: i32,
    pub id_mal: Option<i32>,
    pub title: Option<MediaTitle>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<i32>,
    pub season_year: Option<i32>,
    pub banner_image: Option<String>,
    pub cover_image: Option<CoverImage>,
    pub is_adult: Option<bool>,
}

impl BaseAnime {
    pub fn preferred_title(&self) -> &str {
        self.title.as_ref().map(|t| t.preferred()).unwrap_or_default()
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.cover_image.as_ref().and_then(|c| c.best())
    }
}

/// One entry of the user's remote list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimeListEntry {
    pub id: i32,
    pub score: Option<f64>,
    pub progress: Option<i32>,
    pub status: Option<MediaListStatus>,
    pub notes: Option<String>,
    pub repeat: Option<i32>,
    pub private: Option<bool>,
    pub started_at: Option<FuzzyDate>,
    pub completed_at: Option<FuzzyDate>,
    pub media: BaseAnime,
}

impl AnimeListEntry {
    pub fn media_id(&self) -> i32 {
        self.media.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimeList {
    pub status: Option<MediaListStatus>,
    pub name: Option<String>,
    pub is_custom_list: Option<bool>,
    pub entries: Vec<AnimeListEntry>,
}

/// The user's anime collection, grouped into lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimeCollection {
    pub lists: Vec<AnimeList>,
}

impl AnimeCollection {
    /// Every entry of every list, in list order.
    pub fn entries(&self) -> impl Iterator<Item = &AnimeListEntry> {
        self.lists.iter().flat_map(|list| list.entries.iter())
    }

    /// First entry whose media id matches.
    pub fn find_entry(&self, media_id: i32) -> Option<&AnimeListEntry> {
        self.entries().find(|entry| entry.media_id() == media_id)
    }

    pub fn contains_media(&self, media_id: i32) -> bool {
        self.find_entry(media_id).is_some()
    }

    pub fn entry_count(&self) -> usize {
        self.lists.iter().map(|list| list.entries.len()).sum()
    }
}

// ============================================================================
// Local inventory
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalFileType {
    #[default]
    Main,
    Special,
    Nc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileMetadata {
    /// Episode number relative to the media.
    pub episode: i32,
    /// Episode key used by metadata providers, e.g. `"1"` or `"S1"`.
    pub anidb_episode: String,
    pub kind: LocalFileType,
}

/// A video file on disk matched to a media id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    pub path: String,
    pub media_id: i32,
    pub metadata: LocalFileMetadata,
}

impl LocalFile {
    /// Episode key of the file, `None` when the file was never matched to an episode.
    pub fn episode_key(&self) -> Option<&str> {
        let key = self.metadata.anidb_episode.trim();
        (!key.is_empty()).then_some(key)
    }
}

// ============================================================================
// Offline state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Anime,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Anime => "anime",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anime" => Ok(MediaKind::Anime),
            other => Err(LibraryError::InvalidInput {
                field: "kind".to_string(),
                message: format!("Unknown media kind: {}", other),
            }),
        }
    }
}

/// A media id opted into offline mirroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedMedia {
    pub media_id: i32,
    pub kind: MediaKind,
    /// Unix timestamp (seconds) at which tracking started.
    pub created_at: i64,
}

impl TrackedMedia {
    pub fn anime(media_id: i32, created_at: i64) -> Self {
        Self {
            media_id,
            kind: MediaKind::Anime,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    /// Episode key, same space as [`LocalFileMetadata::anidb_episode`].
    pub episode: String,
    pub episode_number: i32,
    pub title: Option<String>,
    /// Remote thumbnail URL.
    pub image: Option<String>,
    pub summary: Option<String>,
    pub air_date: Option<String>,
    /// Runtime in minutes.
    pub length: Option<i32>,
}

impl EpisodeMetadata {
    /// Remote image URL, ignoring blank values.
    pub fn image_url(&self) -> Option<&str> {
        self.image.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Episode-level metadata for one media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeMetadata {
    /// Titles keyed by language code.
    pub titles: BTreeMap<String, String>,
    pub episode_count: i32,
    pub special_count: i32,
    /// Episodes keyed by episode key.
    pub episodes: BTreeMap<String, EpisodeMetadata>,
}

/// The persisted offline representation of one tracked media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeSnapshot {
    pub media_id: i32,
    pub metadata: AnimeMetadata,
    /// Banner path relative to the media's asset directory.
    pub banner_image_path: Option<String>,
    /// Cover path relative to the media's asset directory.
    pub cover_image_path: Option<String>,
    /// Episode key to relative image path. Entries are only ever added.
    pub episode_image_paths: BTreeMap<String, String>,
    /// Fingerprint of the inputs this snapshot was built from.
    pub reference_key: String,
}
