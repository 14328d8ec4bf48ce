use super::validation::ValidationError;
use crate::storage::StorageError;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde::Serialize;

/// Domain error for gallery operations.
///
/// Only validation, authorization, not-found and rate-limit messages reach the
/// client verbatim. Storage, persistence and internal failures are logged where
/// they happen and rendered as a generic message.
#[derive(Debug)]
pub enum GalleryError {
    Validation(ValidationError),
    Unauthorized,
    NotFound,
    RateLimited { retry_after_seconds: u64 },
    Storage(StorageError),
    Persistence(DbErr),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl GalleryError {
    /// Message safe to show to the caller.
    pub fn client_message(&self) -> String {
        match self {
            GalleryError::Validation(e) => e.to_string(),
            GalleryError::Unauthorized => "Access denied".to_string(),
            GalleryError::NotFound => "Not found".to_string(),
            GalleryError::RateLimited {
                retry_after_seconds,
            } => format!(
                "Too many requests. Try again in {} seconds",
                retry_after_seconds
            ),
            GalleryError::Storage(_) | GalleryError::Persistence(_) | GalleryError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl std::fmt::Display for GalleryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GalleryError::Storage(e) => write!(f, "Storage error: {}", e),
            GalleryError::Persistence(e) => write!(f, "Database error: {}", e),
            GalleryError::Internal(msg) => write!(f, "Internal error: {}", msg),
            other => write!(f, "{}", other.client_message()),
        }
    }
}

impl std::error::Error for GalleryError {}

impl From<ValidationError> for GalleryError {
    fn from(e: ValidationError) -> Self {
        GalleryError::Validation(e)
    }
}

impl From<StorageError> for GalleryError {
    fn from(e: StorageError) -> Self {
        GalleryError::Storage(e)
    }
}

impl From<DbErr> for GalleryError {
    fn from(e: DbErr) -> Self {
        GalleryError::Persistence(e)
    }
}

impl ResponseError for GalleryError {
    fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::Unauthorized => StatusCode::UNAUTHORIZED,
            GalleryError::NotFound => StatusCode::NOT_FOUND,
            GalleryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GalleryError::Storage(_) | GalleryError::Persistence(_) | GalleryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let GalleryError::RateLimited {
            retry_after_seconds,
        } = self
        {
            builder.insert_header((header::RETRY_AFTER, retry_after_seconds.to_string()));
        }
        builder.json(ErrorBody {
            error: &self.client_message(),
        })
    }
}
