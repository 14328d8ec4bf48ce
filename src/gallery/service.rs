//! Gallery metadata service.
//!
//! Publishing an item is two independent writes: the image bytes go to object
//! storage, then a metadata row goes to the database. There is no transaction
//! spanning both. If the row cannot be written the stored object is deleted
//! again; if the process dies between the two writes the object is orphaned.

use super::repository::{GalleryRepository, NewGalleryRecord};
use super::validation::{self, UploadMetadata, ValidationMode};
use super::{GalleryError, GalleryItem, GalleryRecord};
use crate::cache::ListingCache;
use crate::storage::StorageBackend;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));
static DOT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("valid regex"));

const MAX_FILENAME_CHARS: usize = 100;

/// An image submitted for publication.
#[derive(Clone, Debug)]
pub struct NewUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    pub title: String,
    pub subtitle: Option<String>,
}

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedItem {
    pub id: Uuid,
    pub image_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// No record had this id. Still a success.
    AlreadyAbsent,
}

/// Build a storage key for an upload.
///
/// Uniqueness comes from the UUID prefix; the sanitized filename is kept only
/// so keys stay readable in the bucket.
pub fn storage_key(filename: &str, mime_type: &str) -> String {
    let base = filename.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");
    let base = WHITESPACE.replace_all(base.trim(), "-");
    let base = UNSAFE_CHARS.replace_all(&base, "_");
    let base = DOT_RUNS.replace_all(&base, ".");
    let mut name: String = base
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    if name.is_empty() {
        name.push_str("image");
    }

    let ext = extension_for(mime_type);
    let has_ext = name
        .rsplit_once('.')
        .map(|(_, e)| {
            e.eq_ignore_ascii_case(ext) || (ext == "jpg" && e.eq_ignore_ascii_case("jpeg"))
        })
        .unwrap_or(false);
    if !has_ext {
        name.push('.');
        name.push_str(ext);
    }

    format!("{}_{}", Uuid::new_v4().to_simple(), name)
}

fn extension_for(mime_type: &str) -> &'static str {
    match validation::mime_essence(mime_type).as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// Coordinates object storage and metadata for gallery items.
pub struct GalleryService {
    storage: Arc<dyn StorageBackend>,
    records: Arc<dyn GalleryRepository>,
    listing: ListingCache,
    mode: ValidationMode,
}

impl GalleryService {
    pub fn new(storage: Arc<dyn StorageBackend>, records: Arc<dyn GalleryRepository>) -> Self {
        Self {
            storage,
            records,
            listing: ListingCache::default(),
            mode: ValidationMode::Standard,
        }
    }

    /// Also enforce pixel dimensions on uploads.
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Store the bytes, then record the metadata. A failed metadata insert
    /// removes the stored object and returns the insert error.
    pub async fn create_gallery_item(&self, upload: NewUpload) -> Result<CreatedItem, GalleryError> {
        validation::validate_image(&upload.mime_type, &upload.bytes, self.mode)?;
        let metadata = UploadMetadata::new(&upload.title, upload.subtitle.as_deref());
        metadata.check()?;

        let content_type = validation::mime_essence(&upload.mime_type);
        let key = storage_key(&upload.filename, &content_type);
        let size = upload.bytes.len();

        self.storage
            .put_object(&key, upload.bytes, &content_type)
            .await
            .map_err(|e| {
                log::error!("create_gallery_item: storage write for {} failed: {}", key, e);
                GalleryError::Storage(e)
            })?;

        let image_url = self.storage.public_url(&key);

        let inserted = self
            .records
            .insert(NewGalleryRecord {
                title: metadata.title,
                subtitle: metadata.subtitle,
                image_url,
                storage_path: key.clone(),
            })
            .await;

        let record = match inserted {
            Ok(record) => record,
            Err(insert_err) => {
                log::error!(
                    "create_gallery_item: metadata insert failed, removing {}: {}",
                    key,
                    insert_err
                );
                if let Err(rollback_err) = self.storage.delete_object(&key).await {
                    log::warn!(
                        "create_gallery_item: rollback of {} failed, object orphaned: {}",
                        key,
                        rollback_err
                    );
                }
                return Err(GalleryError::Persistence(insert_err));
            }
        };

        self.listing.invalidate();
        log::info!(
            "create_gallery_item: published {} ({} bytes) as {}",
            record.id,
            size,
            key
        );

        Ok(CreatedItem {
            id: record.id,
            image_url: record.image_url,
        })
    }

    /// Remove the stored object, then the row. Deleting an unknown id succeeds.
    pub async fn delete_gallery_item(&self, id: Uuid) -> Result<DeleteOutcome, GalleryError> {
        let record = match self.records.find_by_id(id).await? {
            Some(record) => record,
            None => {
                log::debug!("delete_gallery_item: {} not found, nothing to do", id);
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
        };

        match self.storage.delete_object(&record.storage_path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                log::debug!(
                    "delete_gallery_item: {} already missing from storage",
                    record.storage_path
                );
            }
            Err(e) => {
                log::warn!(
                    "delete_gallery_item: storage delete of {} failed, continuing: {}",
                    record.storage_path,
                    e
                );
            }
        }

        self.records.delete_by_id(id).await.map_err(|e| {
            log::error!("delete_gallery_item: metadata delete of {} failed: {}", id, e);
            GalleryError::Persistence(e)
        })?;

        self.listing.invalidate();
        log::info!("delete_gallery_item: removed {}", id);

        Ok(DeleteOutcome::Deleted)
    }

    /// Every record, newest first. Always reads the store.
    pub async fn list_gallery_items(&self) -> Result<Vec<GalleryRecord>, GalleryError> {
        self.records.list_newest_first().await.map_err(|e| {
            log::error!("list_gallery_items: {}", e);
            GalleryError::Persistence(e)
        })
    }

    /// Public listing, served from the listing cache when warm.
    pub async fn public_listing(&self) -> Result<Arc<Vec<GalleryItem>>, GalleryError> {
        if let Some(items) = self.listing.get() {
            return Ok(items);
        }

        let generation = self.listing.generation();
        let items: Vec<GalleryItem> = self
            .list_gallery_items()
            .await?
            .into_iter()
            .map(GalleryItem::from)
            .collect();
        let items = Arc::new(items);
        if !self.listing.insert(items.clone(), generation) {
            log::debug!("public_listing: gallery changed during read, not caching");
        }

        Ok(items)
    }
}
