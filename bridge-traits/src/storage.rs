//! File System Abstraction
//!
//! The asset tree of the offline mirror is written, measured and pruned
//! through [`FileSystemAccess`].

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn store_cover(fs: &dyn FileSystemAccess, root: &Path, data: Bytes) -> Result<()> {
///     let path = root.join("42").join("cover.jpg");
///     fs.write_file(&path, data).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating parent directories and replacing any
    /// previous content
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Calculate total size of a directory recursively
    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in self.list_directory(&dir).await? {
                let metadata = self.metadata(&entry).await?;
                if metadata.is_directory {
                    pending.push(entry);
                } else {
                    total += metadata.size;
                }
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Flat in-memory tree: directories map to their children.
    struct TreeFs {
        dirs: HashMap<PathBuf, Vec<PathBuf>>,
        sizes: HashMap<PathBuf, u64>,
    }

    #[async_trait]
    impl FileSystemAccess for TreeFs {
        async fn exists(&self, path: &Path) -> Result<bool> {
            Ok(self.dirs.contains_key(path) || self.sizes.contains_key(path))
        }

        async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
            Ok(FileMetadata {
                size: self.sizes.get(path).copied().unwrap_or(0),
                modified_at: None,
                is_directory: self.dirs.contains_key(path),
            })
        }

        async fn create_dir_all(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn read_file(&self, _path: &Path) -> Result<Bytes> {
            Ok(Bytes::new())
        }

        async fn write_file(&self, _path: &Path, _data: Bytes) -> Result<()> {
            Ok(())
        }

        async fn delete_file(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn delete_dir_all(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
            Ok(self.dirs.get(path).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_default_directory_size_walks_nested_dirs() {
        let root = PathBuf::from("/assets");
        let media = root.join("42");
        let mut dirs = HashMap::new();
        dirs.insert(root.clone(), vec![media.clone(), root.join("readme")]);
        dirs.insert(media.clone(), vec![media.join("banner.jpg"), media.join("cover.jpg")]);

        let mut sizes = HashMap::new();
        sizes.insert(root.join("readme"), 10);
        sizes.insert(media.join("banner.jpg"), 100);
        sizes.insert(media.join("cover.jpg"), 50);

        let fs = TreeFs { dirs, sizes };
        assert_eq!(fs.directory_size(&root).await.unwrap(), 160);
    }
}
