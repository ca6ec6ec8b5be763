use core_library::LibraryError;
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote anime collection is not available")]
    CollectionUnavailable,

    #[error("Media {media_id} is not in the anime collection")]
    NotInCollection { media_id: i32 },

    #[error("Media {media_id} is already tracked")]
    AlreadyTracked { media_id: i32 },

    #[error("Media {media_id} is not tracked")]
    NotTracked { media_id: i32 },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
