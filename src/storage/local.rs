//! Local filesystem storage backend.

use super::{ByteStream, StorageBackend, StorageError, StorageObject};
use actix_web::web::{self, Bytes};
use async_trait::async_trait;
use futures::stream;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path for file storage
    base_path: PathBuf,
    /// URL prefix under which `web::media` serves stored files
    pub_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// The `base_path` directory will be created if it doesn't exist.
    pub fn new(base_path: PathBuf, pub_url: String) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        log::info!("LocalStorage initialized at {:?}", base_path);
        Ok(Self {
            base_path,
            pub_url: pub_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the full path for a key, including prefix directories.
    ///
    /// A key is a single path component: no separators, and never `.` or `..`.
    fn get_file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key == "." || key == ".." || key.contains(&['/', '\\'][..]) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        if key.len() < 4 || !key.is_char_boundary(4) {
            Ok(self.base_path.join(key))
        } else {
            let prefix1 = &key[0..2];
            let prefix2 = &key[2..4];
            Ok(self.base_path.join(prefix1).join(prefix2).join(key))
        }
    }

    /// Parse HTTP Range header.
    /// Supports formats like "bytes=0-499", "bytes=500-" and "bytes=-500"
    pub(crate) fn parse_range(range: &str, file_size: u64) -> Result<(u64, u64), StorageError> {
        if file_size == 0 {
            return Err(StorageError::InvalidRange("Range not satisfiable".into()));
        }

        let range = range
            .strip_prefix("bytes=")
            .ok_or_else(|| StorageError::InvalidRange("Invalid range format".into()))?;

        let (first, last) = range
            .split_once('-')
            .ok_or_else(|| StorageError::InvalidRange("Invalid range format".into()))?;

        let start: u64 = if first.is_empty() {
            // Suffix range like "-500" means last 500 bytes
            let suffix: u64 = last
                .parse()
                .map_err(|_| StorageError::InvalidRange("Invalid range number".into()))?;
            file_size.saturating_sub(suffix)
        } else {
            first
                .parse()
                .map_err(|_| StorageError::InvalidRange("Invalid range number".into()))?
        };

        let end: u64 = if first.is_empty() || last.is_empty() {
            file_size - 1
        } else {
            last.parse()
                .map_err(|_| StorageError::InvalidRange("Invalid range number".into()))?
        };

        if start > end || start >= file_size {
            return Err(StorageError::InvalidRange("Range not satisfiable".into()));
        }

        Ok((start, end.min(file_size - 1)))
    }

    /// Get MIME type from the key's extension.
    fn get_mime_type(key: &str) -> Option<String> {
        let ext = key.rsplit('.').next()?;
        let mime = match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        };
        Some(mime.to_string())
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.get_file_path(key)?;
        log::info!("LocalStorage: put_object: {:?} ({})", path, content_type);

        web::block(move || {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<String>,
    ) -> Result<StorageObject, StorageError> {
        let path = self.get_file_path(key)?;
        log::debug!("LocalStorage: get_object: {:?}", path);

        let result = web::block(
            move || -> Result<(Vec<u8>, std::fs::Metadata, Option<String>), StorageError> {
                let metadata = fs::metadata(&path)?;
                let file_size = metadata.len();

                let (start, end, content_range) = match range {
                    Some(ref range_header) => {
                        let (start, end) = LocalStorage::parse_range(range_header, file_size)?;
                        let range_str = format!("bytes {}-{}/{}", start, end, file_size);
                        (start, end + 1, Some(range_str))
                    }
                    None => (0, file_size, None),
                };

                let mut file = fs::File::open(&path)?;
                if start > 0 {
                    file.seek(SeekFrom::Start(start))?;
                }

                let mut buffer = vec![0u8; (end - start) as usize];
                file.read_exact(&mut buffer)?;

                Ok((buffer, metadata, content_range))
            },
        )
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        let (buffer, metadata, content_range) = result;
        let content_length = buffer.len() as i64;

        let modified = metadata.modified().ok();
        let e_tag = modified.map(|t: std::time::SystemTime| {
            let duration = t.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
            format!("\"{}\"", duration.as_secs())
        });
        let last_modified = modified.map(|t: std::time::SystemTime| {
            let datetime: chrono::DateTime<chrono::Utc> = t.into();
            datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
        });

        let body: ByteStream = Box::pin(stream::once(async move { Ok(Bytes::from(buffer)) }));

        Ok(StorageObject {
            body,
            content_length: Some(content_length),
            content_type: Self::get_mime_type(key),
            e_tag,
            content_range,
            accept_ranges: Some("bytes".to_string()),
            last_modified,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let path = self.get_file_path(key)?;
        log::info!("LocalStorage: delete_object: {:?}", path);

        web::block(move || fs::remove_file(&path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.pub_url, key)
    }
}
