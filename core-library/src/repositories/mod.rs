//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations for the offline mirror.
//!
//! ## Architecture
//!
//! - Traits define the interface for each store so the sync engine can be
//!   tested against in-memory fakes
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `TrackedMediaRepository` - media ids opted into offline mirroring
//! - `SnapshotRepository` - one materialized snapshot per tracked media
//! - `MirrorCollectionRepository` - the rebuilt local collection

pub mod collection;
pub mod snapshot;
pub mod tracked;

pub use collection::{MirrorCollectionRepository, SqliteMirrorCollectionRepository};
pub use snapshot::{SnapshotRepository, SqliteSnapshotRepository};
pub use tracked::{SqliteTrackedMediaRepository, TrackedMediaRepository};
