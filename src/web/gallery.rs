use crate::gallery::validation::{self, MAX_UPLOAD_BYTES};
use crate::gallery::{
    CreatedItem, DeleteOutcome, GalleryError, GalleryService, NewUpload, ValidationError,
};
use crate::middleware::AdminCtx;
use crate::rate_limit::check_upload_rate_limit;
use actix_multipart::{Field, Multipart};
use actix_web::{delete, get, post, web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use uuid::Uuid;

/// Bodies beyond this are not read to the end just to report their size.
const MAX_COUNTED_BYTES: usize = MAX_UPLOAD_BYTES * 16;

/// Cap for the text fields of the upload form.
const MAX_TEXT_FIELD_BYTES: usize = 4 * 1024;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(upload_gallery_item)
        .service(list_gallery)
        .service(delete_gallery_item);
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    #[serde(flatten)]
    item: CreatedItem,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Uploaded file as read from the multipart body.
struct FilePart {
    filename: String,
    mime_type: String,
    bytes: Vec<u8>,
}

#[post("/api/upload-gallery")]
async fn upload_gallery_item(
    admin: AdminCtx,
    gallery: web::Data<GalleryService>,
    multipart: Option<Multipart>,
) -> Result<HttpResponse, GalleryError> {
    check_upload_rate_limit(&admin.token().to_string()).map_err(|e| {
        GalleryError::RateLimited {
            retry_after_seconds: e.retry_after_seconds,
        }
    })?;

    let mut file: Option<FilePart> = None;
    let mut title = String::new();
    let mut subtitle: Option<String> = None;

    if let Some(mut fields) = multipart {
        while let Some(mut field) = fields.try_next().await.map_err(|e| {
            log::warn!("upload_gallery_item: multipart read error: {}", e);
            malformed_body()
        })? {
            let disposition = field.content_disposition();
            let field_name = disposition.get_name().unwrap_or_default().to_owned();
            let filename = disposition.get_filename().unwrap_or_default().to_owned();

            match field_name.as_str() {
                "file" => {
                    let mime_type = field
                        .content_type()
                        .map(|m| m.essence_str().to_owned())
                        .unwrap_or_default();
                    let bytes = read_file_field(&mut field, &mime_type).await?;
                    if !bytes.is_empty() {
                        file = Some(FilePart {
                            filename,
                            mime_type,
                            bytes,
                        });
                    }
                }
                "title" => title = read_text_field(&mut field).await?,
                "subtitle" => subtitle = Some(read_text_field(&mut field).await?),
                other => {
                    return Err(ValidationError::InvalidField(format!(
                        "Unknown field '{}'",
                        other
                    ))
                    .into())
                }
            }
        }
    }

    let file = file.ok_or(ValidationError::MissingFile)?;

    let created = gallery
        .create_gallery_item(NewUpload {
            bytes: file.bytes,
            filename: file.filename,
            mime_type: file.mime_type,
            title,
            subtitle,
        })
        .await?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        item: created,
    }))
}

/// Read the image part. The declared type is checked before any bytes are
/// buffered; past the size limit the rest of the part is only counted so the
/// error can report the real size.
async fn read_file_field(field: &mut Field, mime_type: &str) -> Result<Vec<u8>, GalleryError> {
    validation::validate_type(mime_type)?;

    let mut buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut total: usize = 0;

    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::warn!("upload_gallery_item: multipart read error: {}", e);
            malformed_body()
        })?;
        total += bytes.len();

        if total > MAX_COUNTED_BYTES {
            return Err(ValidationError::TooLarge { size: None }.into());
        }
        if total <= MAX_UPLOAD_BYTES {
            buf.extend_from_slice(&bytes);
        }
    }

    validation::validate_size(total)?;
    Ok(buf)
}

async fn read_text_field(field: &mut Field) -> Result<String, GalleryError> {
    let mut buf: Vec<u8> = Vec::with_capacity(128);
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::warn!("upload_gallery_item: multipart read error: {}", e);
            malformed_body()
        })?;
        if buf.len() + bytes.len() > MAX_TEXT_FIELD_BYTES {
            return Err(invalid_field("Form field is too long"));
        }
        buf.extend_from_slice(&bytes);
    }

    String::from_utf8(buf).map_err(|_| invalid_field("Form field is not valid UTF-8"))
}

fn malformed_body() -> GalleryError {
    invalid_field("Malformed multipart body")
}

fn invalid_field(msg: &str) -> GalleryError {
    ValidationError::InvalidField(msg.to_owned()).into()
}

#[get("/api/gallery")]
async fn list_gallery(gallery: web::Data<GalleryService>) -> Result<HttpResponse, GalleryError> {
    let items = gallery.public_listing().await?;
    Ok(HttpResponse::Ok().json(items.as_ref()))
}

#[delete("/api/gallery/{id}")]
async fn delete_gallery_item(
    _admin: AdminCtx,
    gallery: web::Data<GalleryService>,
    path: web::Path<String>,
) -> Result<HttpResponse, GalleryError> {
    let id = Uuid::parse_str(&path.into_inner()).map_err(|_| GalleryError::NotFound)?;

    match gallery.delete_gallery_item(id).await? {
        DeleteOutcome::Deleted => Ok(HttpResponse::Ok().json(SuccessResponse { success: true })),
        DeleteOutcome::AlreadyAbsent => Err(GalleryError::NotFound),
    }
}
