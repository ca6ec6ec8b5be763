use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("No metadata available for media {media_id}")]
    NotFound { media_id: i32 },

    #[error("Metadata provider failed: {0}")]
    Provider(String),

    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
