//! Gallery metadata persistence.

use super::GalleryRecord;
use crate::orm::gallery;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use uuid::Uuid;

/// Fields supplied by the caller when recording a new item. The store assigns
/// `id` and `created_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGalleryRecord {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub storage_path: String,
}

#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn insert(&self, record: NewGalleryRecord) -> Result<GalleryRecord, DbErr>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GalleryRecord>, DbErr>;

    /// Returns the number of rows removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<u64, DbErr>;

    /// All records, newest first.
    async fn list_newest_first(&self) -> Result<Vec<GalleryRecord>, DbErr>;
}

/// SeaORM-backed repository over the `gallery` table.
#[derive(Clone)]
pub struct OrmGalleryRepository {
    db: DatabaseConnection,
}

impl OrmGalleryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GalleryRepository for OrmGalleryRepository {
    async fn insert(&self, record: NewGalleryRecord) -> Result<GalleryRecord, DbErr> {
        let model = gallery::Model {
            id: Uuid::new_v4(),
            title: record.title,
            subtitle: record.subtitle,
            image_url: record.image_url,
            storage_path: record.storage_path,
            created_at: Utc::now().naive_utc(),
        };

        gallery::Entity::insert(gallery::ActiveModel {
            id: Set(model.id),
            title: Set(model.title.clone()),
            subtitle: Set(model.subtitle.clone()),
            image_url: Set(model.image_url.clone()),
            storage_path: Set(model.storage_path.clone()),
            created_at: Set(model.created_at),
        })
        .exec(&self.db)
        .await?;

        Ok(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GalleryRecord>, DbErr> {
        gallery::Entity::find_by_id(id).one(&self.db).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<u64, DbErr> {
        let res = gallery::Entity::delete_many()
            .filter(gallery::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn list_newest_first(&self) -> Result<Vec<GalleryRecord>, DbErr> {
        gallery::Entity::find()
            .order_by_desc(gallery::Column::CreatedAt)
            .all(&self.db)
            .await
    }
}
