//! Workspace umbrella crate.
//!
//! Re-exports the individual workspace crates (`core-service`, `core-sync`,
//! `core-metadata`, `core-library`, `core-runtime`) so host applications can
//! depend on `anime-mirror-workspace` and enable `desktop-shims` without
//! wiring each crate individually.

pub use bridge_traits;
pub use core_library;
pub use core_metadata;
pub use core_runtime;
pub use core_service::{bootstrap, CoreDependencies, CoreError, CoreService};
pub use core_sync;
