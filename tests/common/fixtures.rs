//! Test fixtures: images, services and request bodies.
#![allow(dead_code)]

use super::doubles::{MemoryRepository, MemoryStorage};
use actix_web::web::{self, Data};
use charity_gallery::gallery::GalleryService;
use charity_gallery::session::{hash_password, AdminSessions};
use charity_gallery::storage::StorageBackend;
use image::{DynamicImage, ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_ADMIN_PASSWORD: &str = "hope-harbor-test-password";

/// Hashing is slow; share one hash across the test binary.
static TEST_ADMIN_HASH: Lazy<String> =
    Lazy::new(|| hash_password(TEST_ADMIN_PASSWORD).expect("hash test password"));

pub const BOUNDARY: &str = "----gallery-test-boundary";

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode test image");
    buf
}

/// Smooth gradient; compresses well.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(img, ImageFormat::Png)
}

/// Pseudo-random pixels; barely compresses, so the file is roughly
/// `width * height * 3` bytes.
pub fn noisy_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        image::Rgb([r, g, b])
    });
    encode(img, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, 64, (y % 256) as u8])
    });
    encode(img, ImageFormat::Jpeg)
}

/// A valid JPEG padded with trailing bytes to exactly `size` bytes.
pub fn jpeg_of_size(size: usize) -> Vec<u8> {
    let mut bytes = jpeg_bytes(400, 300);
    assert!(bytes.len() < size, "base jpeg already exceeds {} bytes", size);
    bytes.resize(size, 0);
    bytes
}

pub fn admin_sessions() -> AdminSessions {
    AdminSessions::new(&TEST_ADMIN_HASH, Duration::from_secs(600))
}

/// Service over in-memory doubles, with handles to both for assertions.
pub fn memory_service() -> (GalleryService, Arc<MemoryStorage>, Arc<MemoryRepository>) {
    let storage = Arc::new(MemoryStorage::new());
    let records = Arc::new(MemoryRepository::new());
    let service = GalleryService::new(storage.clone(), records.clone());
    (service, storage, records)
}

/// Shared state for an app under test.
#[derive(Clone)]
pub struct TestContext {
    pub gallery: Data<GalleryService>,
    pub sessions: Data<AdminSessions>,
    pub storage: Data<Arc<dyn StorageBackend>>,
}

impl TestContext {
    pub fn new(storage: Arc<dyn StorageBackend>, gallery: GalleryService) -> Self {
        Self {
            gallery: Data::new(gallery),
            sessions: Data::new(admin_sessions()),
            storage: Data::new(storage),
        }
    }

    /// In-memory storage and metadata.
    pub fn in_memory() -> (Self, Arc<MemoryStorage>, Arc<MemoryRepository>) {
        let (service, storage, records) = memory_service();
        let ctx = Self::new(storage.clone(), service);
        (ctx, storage, records)
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.gallery.clone())
            .app_data(self.sessions.clone())
            .app_data(self.storage.clone())
            .configure(charity_gallery::web::configure);
    }

    /// Bearer token for a freshly opened admin session.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.sessions.create_session().token)
    }
}

/// One part of a multipart/form-data body.
pub enum FormPart<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

/// Encode parts as multipart/form-data. Returns the content type header value
/// and the body.
pub fn multipart_body(parts: &[FormPart<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            FormPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            FormPart::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// The usual upload form: one image plus title and subtitle.
pub fn upload_form(
    filename: &str,
    content_type: &str,
    bytes: &[u8],
    title: &str,
    subtitle: &str,
) -> (String, Vec<u8>) {
    multipart_body(&[
        FormPart::File {
            name: "file",
            filename,
            content_type,
            bytes,
        },
        FormPart::Text("title", title),
        FormPart::Text("subtitle", subtitle),
    ])
}
