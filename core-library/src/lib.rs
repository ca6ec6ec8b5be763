//! # Local Library Module
//!
//! Owns the offline mirror database and the repositories used to access it.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and migrations
//! - The remote collection model and the offline snapshot model
//! - Repositories for tracked media, snapshots and the mirror collection

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
