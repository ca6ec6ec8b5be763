//! Snapshot staleness fingerprint
//!
//! A snapshot is current when the key stored with it equals the key computed
//! from today's inputs: the mutable fields of the remote list entry and the
//! set of episode keys present on disk. Any change to either produces a new
//! key and a `Metadata` diff.

use core_library::models::{AnimeListEntry, FuzzyDate, LocalFile, MediaListStatus};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

#[derive(Serialize)]
struct Fingerprint<'a> {
    media_id: i32,
    media_status: Option<&'a str>,
    media_episodes: Option<i32>,
    status: Option<MediaListStatus>,
    progress: Option<i32>,
    score: Option<f64>,
    repeat: Option<i32>,
    started_at: Option<FuzzyDate>,
    completed_at: Option<FuzzyDate>,
    episode_keys: BTreeSet<&'a str>,
}

/// Hex-encoded SHA-256 over the entry's mutable fields and the sorted,
/// deduplicated episode keys of the media's local files.
///
/// Files belonging to other media are ignored, so callers may pass the whole
/// inventory.
pub fn compute_reference_key(entry: &AnimeListEntry, local_files: &[LocalFile]) -> String {
    let media_id = entry.media_id();

    let fingerprint = Fingerprint {
        media_id,
        media_status: entry.media.status.as_deref(),
        media_episodes: entry.media.episodes,
        status: entry.status,
        progress: entry.progress,
        score: entry.score,
        repeat: entry.repeat,
        started_at: entry.started_at,
        completed_at: entry.completed_at,
        episode_keys: local_files
            .iter()
            .filter(|file| file.media_id == media_id)
            .filter_map(LocalFile::episode_key)
            .collect(),
    };

    // Serializing plain data into a Vec cannot fail.
    let encoded = serde_json::to_vec(&fingerprint).unwrap_or_default();
    format!("{:x}", Sha256::digest(&encoded))
}
