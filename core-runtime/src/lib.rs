//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the mirror crates:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus for queue progress and completion notifications
//!
//! ## Overview
//!
//! Nothing in here knows about snapshots or diffs. The sync engine publishes
//! [`events::CoreEvent`]s through the [`events::EventBus`] and reads its
//! paths, queue capacity and bridges from [`config::CoreConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
