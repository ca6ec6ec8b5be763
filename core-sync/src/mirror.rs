//! # Mirror Builder
//!
//! Rebuilds the local collection from scratch. The result mirrors the remote
//! list layout but only contains media that are both tracked and snapshotted.
//! Entries are copied from the remote collection unchanged, except that the
//! banner and cover URLs point at the locally served assets.

use core_library::models::{
    AnimeCollection, AnimeList, AnimeListEntry, AnimeSnapshot, CoverImage, TrackedMedia,
};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// `{prefix}/{media_id}/{relative_path}`
pub fn format_asset_url(prefix: &str, media_id: i32, relative_path: &str) -> String {
    format!(
        "{}/{}/{}",
        prefix.trim_end_matches('/'),
        media_id,
        relative_path.trim_start_matches('/')
    )
}

pub fn build_mirror_collection(
    remote: &AnimeCollection,
    snapshots: &[AnimeSnapshot],
    tracked: &[TrackedMedia],
    asset_url_prefix: &str,
) -> AnimeCollection {
    let mut lists: Vec<AnimeList> = remote
        .lists
        .iter()
        .filter(|list| list.status.is_some())
        .map(|list| AnimeList {
            status: list.status,
            name: list.name.clone(),
            is_custom_list: list.is_custom_list,
            entries: Vec::new(),
        })
        .collect();

    let snapshots: HashMap<i32, &AnimeSnapshot> =
        snapshots.iter().map(|s| (s.media_id, s)).collect();
    let tracked_ids: BTreeSet<i32> = tracked.iter().map(|t| t.media_id).collect();

    for media_id in tracked_ids {
        let Some(snapshot) = snapshots.get(&media_id) else {
            continue;
        };
        let Some(entry) = remote.find_entry(media_id) else {
            continue;
        };
        let Some(list) = lists
            .iter_mut()
            .find(|list| entry.status.is_some() && list.status == entry.status)
        else {
            debug!(media_id, "No list matches entry status, skipping");
            continue;
        };

        list.entries
            .push(localize_entry(entry, snapshot, asset_url_prefix));
    }

    AnimeCollection { lists }
}

fn localize_entry(
    entry: &AnimeListEntry,
    snapshot: &AnimeSnapshot,
    asset_url_prefix: &str,
) -> AnimeListEntry {
    let media_id = entry.media_id();
    let mut media = entry.media.clone();

    media.banner_image = snapshot
        .banner_image_path
        .as_deref()
        .map(|path| format_asset_url(asset_url_prefix, media_id, path));

    let cover_url = snapshot
        .cover_image_path
        .as_deref()
        .map(|path| format_asset_url(asset_url_prefix, media_id, path));
    let color = media.cover_image.take().and_then(|cover| cover.color);
    media.cover_image = Some(CoverImage {
        extra_large: cover_url.clone(),
        large: cover_url.clone(),
        medium: cover_url,
        color,
    });

    AnimeListEntry {
        id: entry.id,
        score: entry.score,
        progress: entry.progress,
        status: entry.status,
        notes: entry.notes.clone(),
        repeat: entry.repeat,
        private: entry.private,
        started_at: entry.started_at,
        completed_at: entry.completed_at,
        media,
    }
}
