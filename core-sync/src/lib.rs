//! # Offline Sync Engine
//!
//! Keeps a local mirror of the user's anime collection for the media the
//! user tracks for offline viewing.
//!
//! ## Overview
//!
//! - Diff the remote collection against persisted snapshots (`diff`)
//! - Drain diffs through a bounded queue with a single worker (`syncer`)
//! - Persist metadata and images per media (`materializer`)
//! - Rebuild the mirror collection with local asset URLs (`mirror`)
//! - Serve metadata from snapshots while offline (`offline_provider`)
//!
//! ## Components
//!
//! - **Local Manager** (`manager`): public facade for tracking and synchronization
//! - **Syncer** (`syncer`): queue, worker, queue state events and completion signal
//! - **Snapshot Materializer** (`materializer`): turns one diff into a snapshot
//! - **Failed Items** (`failed`): last failure per media
//! - **Reference Key** (`reference_key`): staleness fingerprint of an entry
//! - **Sources** (`sources`): where the remote collection and local files come from

pub mod config;
pub mod diff;
pub mod error;
pub mod failed;
pub mod manager;
pub mod materializer;
pub mod mirror;
pub mod offline_provider;
pub mod reference_key;
pub mod sources;
pub mod state;
pub mod syncer;

pub use config::SyncConfig;
pub use diff::{compute_anime_diffs, AnimeDiffResult, DiffInput, DiffType};
pub use error::{Result, SyncError};
pub use failed::{FailedItem, FailedItemRegistry};
pub use manager::{LocalManager, ManagerDependencies, TrackedMediaItem};
pub use materializer::{MaterializeOutcome, SnapshotMaterializer};
pub use mirror::{build_mirror_collection, format_asset_url};
pub use offline_provider::SnapshotMetadataProvider;
pub use reference_key::compute_reference_key;
pub use sources::{LocalFileSource, RemoteCollectionSource};
pub use state::SyncState;
pub use syncer::{SyncStores, Syncer};
