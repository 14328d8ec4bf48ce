//! In-memory stand-ins for object storage and the metadata store.
#![allow(dead_code)]

use actix_web::web::Bytes;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use futures::channel::oneshot;
use charity_gallery::gallery::{GalleryRecord, GalleryRepository, NewGalleryRecord};
use charity_gallery::storage::{StorageBackend, StorageError, StorageObject};
use sea_orm::DbErr;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub const MEMORY_PUBLIC_URL: &str = "https://cdn.example.org/gallery";

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    deleted: Mutex<Vec<String>>,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Keys passed to `delete_object`, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Remove an object behind the service's back.
    pub fn evict(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::S3("simulated put failure".to_owned()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_owned(), (data, content_type.to_owned()));
        Ok(())
    }

    async fn get_object(
        &self,
        key: &str,
        _range: Option<String>,
    ) -> Result<StorageObject, StorageError> {
        let (data, content_type) = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))?;
        let len = data.len() as i64;
        let body = futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(data)) });

        Ok(StorageObject {
            body: Box::pin(body),
            content_length: Some(len),
            content_type: Some(content_type),
            e_tag: None,
            content_range: None,
            accept_ranges: None,
            last_modified: None,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(key.to_owned());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::S3("simulated delete failure".to_owned()));
        }
        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_owned())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", MEMORY_PUBLIC_URL, key)
    }
}

pub struct MemoryRepository {
    records: Mutex<Vec<GalleryRecord>>,
    clock: AtomicI64,
    start: NaiveDateTime,
    /// Held by the next listing read: signal once the rows are read, then wait.
    list_pause: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock: AtomicI64::new(0),
            start: Utc::now().naive_utc(),
            list_pause: Mutex::new(None),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Make the next `list_newest_first` stop after reading its rows.
    ///
    /// The first receiver fires once the rows are read; the listing then waits
    /// until the returned sender fires (or is dropped).
    pub fn pause_next_list(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();
        *self.list_pause.lock().unwrap() = Some((reached_tx, resume_rx));
        (reached_rx, resume_tx)
    }

    pub fn get(&self, id: Uuid) -> Option<GalleryRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

#[async_trait]
impl GalleryRepository for MemoryRepository {
    async fn insert(&self, record: NewGalleryRecord) -> Result<GalleryRecord, DbErr> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("simulated insert failure".to_owned()));
        }
        // Every insert is one second after the previous one.
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        let model = GalleryRecord {
            id: Uuid::new_v4(),
            title: record.title,
            subtitle: record.subtitle,
            image_url: record.image_url,
            storage_path: record.storage_path,
            created_at: self.start + Duration::seconds(tick),
        };
        self.records.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GalleryRecord>, DbErr> {
        Ok(self.get(id))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<u64, DbErr> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("simulated delete failure".to_owned()));
        }
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok((before - records.len()) as u64)
    }

    async fn list_newest_first(&self) -> Result<Vec<GalleryRecord>, DbErr> {
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let pause = self.list_pause.lock().unwrap().take();
        if let Some((reached, resume)) = pause {
            let _ = reached.send(());
            let _ = resume.await;
        }
        Ok(records)
    }
}
