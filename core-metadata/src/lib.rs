//! # Metadata & Artwork Module
//!
//! Supplies episode metadata and downloads artwork for the offline mirror.
//!
//! ## Overview
//!
//! This module handles:
//! - Episode metadata lookup through [`MetadataProvider`]
//! - Fallback metadata derived from local files
//! - Banner, cover and episode image downloads
//! - The on-disk asset tree and its cached size

pub mod assets;
pub mod downloader;
pub mod error;
pub mod provider;

pub use assets::AssetStore;
pub use downloader::{AssetDownloader, CollectionImages, HttpAssetDownloader};
pub use error::{MetadataError, Result};
pub use provider::{synthesize_metadata, MetadataProvider};
