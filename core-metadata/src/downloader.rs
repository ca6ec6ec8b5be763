//! # Image Downloader
//!
//! Fetches banner, cover and episode thumbnails for a media item and stores
//! them through the [`AssetStore`].
//!
//! ## File layout
//!
//! ```text
//! {asset_dir}/{media_id}/banner.jpg
//! {asset_dir}/{media_id}/cover.png
//! {asset_dir}/{media_id}/episodes/{episode_key}.jpg
//! ```
//!
//! The extension comes from the URL when it names a known image type, then
//! from the `Content-Type` header, and defaults to `jpg`.
//!
//! A call either returns every requested path or an error. Files written
//! before a failure stay on disk and are overwritten by the next attempt.

use crate::assets::AssetStore;
use crate::error::{MetadataError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_library::models::{AnimeListEntry, AnimeMetadata, LocalFile};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Episode images fetched at the same time for one media.
pub const EPISODE_DOWNLOAD_CONCURRENCY: usize = 4;

/// Relative paths of the images stored for one media.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionImages {
    pub banner: Option<String>,
    pub cover: Option<String>,
    /// Episode key to relative path
    pub episodes: BTreeMap<String, String>,
}

#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Download the banner, the cover and the image of every locally present
    /// episode that has one in `metadata`.
    async fn download_collection_images(
        &self,
        entry: &AnimeListEntry,
        metadata: &AnimeMetadata,
        local_files: &[LocalFile],
    ) -> Result<CollectionImages>;

    /// Download episode images keyed by episode key.
    async fn download_episode_images(
        &self,
        media_id: i32,
        urls: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>>;
}

/// Episode image URLs for the episodes present on disk.
pub fn local_episode_image_urls(
    media_id: i32,
    metadata: &AnimeMetadata,
    local_files: &[LocalFile],
) -> BTreeMap<String, String> {
    local_files
        .iter()
        .filter(|file| file.media_id == media_id)
        .filter_map(|file| file.episode_key())
        .filter_map(|key| {
            let url = metadata.episodes.get(key)?.image_url()?;
            Some((key.to_string(), url.to_string()))
        })
        .collect()
}

/// [`AssetDownloader`] backed by the [`HttpClient`] bridge.
pub struct HttpAssetDownloader {
    http_client: Arc<dyn HttpClient>,
    assets: Arc<AssetStore>,
    timeout: Duration,
}

impl HttpAssetDownloader {
    pub fn new(http_client: Arc<dyn HttpClient>, assets: Arc<AssetStore>, timeout: Duration) -> Self {
        Self {
            http_client,
            assets,
            timeout,
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        let request = HttpRequest::get(url)
            .header("Accept", "image/*")
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| MetadataError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(MetadataError::Download {
                url: url.to_string(),
                message: format!("HTTP {}", response.status),
            });
        }
        if response.body.is_empty() {
            return Err(MetadataError::Download {
                url: url.to_string(),
                message: "empty body".to_string(),
            });
        }

        let content_type = response.content_type();
        Ok((response.body, content_type))
    }

    /// Download `url` and store it as `{stem}.{ext}`, returning the relative path.
    async fn download_to(&self, media_id: i32, url: &str, stem: &str) -> Result<String> {
        let (body, content_type) = self.fetch(url).await?;
        let relative_path = format!("{}.{}", stem, image_extension(url, content_type.as_deref()));

        self.assets.write(media_id, &relative_path, body).await?;
        Ok(relative_path)
    }
}

#[async_trait]
impl AssetDownloader for HttpAssetDownloader {
    #[instrument(skip(self, entry, metadata, local_files), fields(media_id = entry.media_id()))]
    async fn download_collection_images(
        &self,
        entry: &AnimeListEntry,
        metadata: &AnimeMetadata,
        local_files: &[LocalFile],
    ) -> Result<CollectionImages> {
        let media_id = entry.media_id();

        let banner = match entry.media.banner_image.as_deref() {
            Some(url) => Some(self.download_to(media_id, url, "banner").await?),
            None => None,
        };
        let cover = match entry.media.cover_url() {
            Some(url) => Some(self.download_to(media_id, url, "cover").await?),
            None => None,
        };

        let urls = local_episode_image_urls(media_id, metadata, local_files);
        let episodes = self.download_episode_images(media_id, &urls).await?;

        debug!(
            has_banner = banner.is_some(),
            has_cover = cover.is_some(),
            episodes = episodes.len(),
            "Downloaded collection images"
        );

        Ok(CollectionImages {
            banner,
            cover,
            episodes,
        })
    }

    #[instrument(skip(self, urls), fields(count = urls.len()))]
    async fn download_episode_images(
        &self,
        media_id: i32,
        urls: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let owned: Vec<(String, String)> = urls.iter().map(|(key, url)| (key.clone(), url.clone())).collect();
        stream::iter(owned)
            .map(|(key, url)| async move {
                let stem = format!("episodes/{}", sanitize_key(&key));
                let path = self.download_to(media_id, &url, &stem).await.map_err(|e| {
                    warn!(media_id, episode = %key, error = %e, "Episode image download failed");
                    e
                })?;
                Ok::<_, MetadataError>((key, path))
            })
            .buffer_unordered(EPISODE_DOWNLOAD_CONCURRENCY)
            .try_collect()
            .await
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn image_extension(url: &str, content_type: Option<&str>) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let from_url = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| IMAGE_EXTENSIONS.iter().find(|known| **known == ext).copied());

    if let Some(ext) = from_url {
        return if ext == "jpeg" { "jpg" } else { ext };
    }

    match content_type {
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "jpg",
    }
}
