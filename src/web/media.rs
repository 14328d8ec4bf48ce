//! Serves objects from the configured storage backend under `/uploads/{key}`.
//! Public URLs of the local backend point here.

use crate::storage::{StorageBackend, StorageError};
use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpRequest, HttpResponse};
use std::sync::Arc;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(view_upload);
}

#[get("/uploads/{key}")]
async fn view_upload(
    req: HttpRequest,
    storage: web::Data<Arc<dyn StorageBackend>>,
    path: web::Path<String>,
) -> HttpResponse {
    let key = path.into_inner();
    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let partial = range.is_some();

    let object = match storage.get_object(&key, range).await {
        Ok(object) => object,
        Err(StorageError::NotFound(_)) | Err(StorageError::InvalidKey(_)) => {
            return HttpResponse::NotFound().json(serde_json::json!({ "error": "Not found" }));
        }
        Err(StorageError::InvalidRange(msg)) => {
            log::debug!("view_upload: unsatisfiable range for {}: {}", key, msg);
            return HttpResponse::build(StatusCode::RANGE_NOT_SATISFIABLE).finish();
        }
        Err(e) => {
            log::error!("view_upload: failed to read {}: {}", key, e);
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal server error" }));
        }
    };

    if let (Some(etag), Some(if_none_match)) = (
        object.e_tag.as_deref(),
        req.headers()
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok()),
    ) {
        if !partial && if_none_match == etag {
            return HttpResponse::NotModified()
                .insert_header((header::ETAG, etag.to_owned()))
                .finish();
        }
    }

    let status = if partial && object.content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut res = HttpResponse::build(status);
    res.insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"));
    res.insert_header((
        header::CONTENT_TYPE,
        object
            .content_type
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
    ));
    if let Some(etag) = object.e_tag {
        res.insert_header((header::ETAG, etag));
    }
    if let Some(content_range) = object.content_range {
        res.insert_header((header::CONTENT_RANGE, content_range));
    }
    if let Some(accept_ranges) = object.accept_ranges {
        res.insert_header((header::ACCEPT_RANGES, accept_ranges));
    }
    if let Some(last_modified) = object.last_modified {
        res.insert_header((header::LAST_MODIFIED, last_modified));
    }
    if let Some(len) = object.content_length.and_then(|l| u64::try_from(l).ok()) {
        res.no_chunking(len);
    }

    res.streaming(object.body)
}
