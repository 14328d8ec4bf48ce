//! Image gallery: validation, metadata persistence, and the service that keeps
//! object storage and the `gallery` table in step.

mod error;
pub mod repository;
pub mod service;
pub mod validation;

pub use error::GalleryError;
pub use repository::{GalleryRepository, NewGalleryRecord, OrmGalleryRepository};
pub use service::{storage_key, CreatedItem, DeleteOutcome, GalleryService, NewUpload};
pub use validation::{ValidationError, ValidationMode};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted gallery row.
pub type GalleryRecord = crate::orm::gallery::Model;

/// Public view of a gallery item. Never carries the storage path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub image: String,
}

impl From<GalleryRecord> for GalleryItem {
    fn from(record: GalleryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            subtitle: record.subtitle,
            image: record.image_url,
        }
    }
}
