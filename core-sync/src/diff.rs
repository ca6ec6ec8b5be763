//! # Diff Engine
//!
//! Decides which tracked media need a snapshot written.
//!
//! A tracked media id is considered when it has an entry in the remote
//! collection and at least one local file. For those ids:
//!
//! | Existing snapshot         | Result     |
//! |---------------------------|------------|
//! | none                      | `Missing`  |
//! | reference key differs     | `Metadata` |
//! | reference key equal       | nothing    |
//!
//! Ids are visited in ascending order, so the output is deterministic.

use crate::reference_key::compute_reference_key;
use core_library::models::{AnimeCollection, AnimeListEntry, AnimeSnapshot, LocalFile, TrackedMedia};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffType {
    /// No snapshot exists yet.
    Missing,
    /// A snapshot exists but was built from different inputs.
    Metadata,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffType::Missing => f.write_str("missing"),
            DiffType::Metadata => f.write_str("metadata"),
        }
    }
}

/// One unit of work for the sync queue.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimeDiffResult {
    pub entry: AnimeListEntry,
    pub snapshot: Option<AnimeSnapshot>,
    pub diff_type: DiffType,
}

impl AnimeDiffResult {
    pub fn media_id(&self) -> i32 {
        self.entry.media_id()
    }
}

/// Everything a diff pass looks at.
#[derive(Debug, Clone, Copy)]
pub struct DiffInput<'a> {
    pub remote: &'a AnimeCollection,
    pub local_files: &'a [LocalFile],
    pub tracked: &'a [TrackedMedia],
    pub snapshots: &'a [AnimeSnapshot],
}

pub fn compute_anime_diffs(input: DiffInput<'_>) -> Vec<AnimeDiffResult> {
    let mut files_by_media: HashMap<i32, Vec<LocalFile>> = HashMap::new();
    for file in input.local_files {
        files_by_media
            .entry(file.media_id)
            .or_default()
            .push(file.clone());
    }

    let snapshots: HashMap<i32, &AnimeSnapshot> = input
        .snapshots
        .iter()
        .map(|snapshot| (snapshot.media_id, snapshot))
        .collect();

    let tracked_ids: BTreeSet<i32> = input.tracked.iter().map(|t| t.media_id).collect();

    let mut results = Vec::new();
    for media_id in tracked_ids {
        let Some(files) = files_by_media.get(&media_id) else {
            continue;
        };
        let Some(entry) = input.remote.find_entry(media_id) else {
            continue;
        };

        let reference_key = compute_reference_key(entry, files);

        let diff_type = match snapshots.get(&media_id) {
            None => DiffType::Missing,
            Some(snapshot) if snapshot.reference_key != reference_key => DiffType::Metadata,
            Some(_) => continue,
        };

        results.push(AnimeDiffResult {
            entry: entry.clone(),
            snapshot: snapshots.get(&media_id).map(|s| (*s).clone()),
            diff_type,
        });
    }

    results
}
