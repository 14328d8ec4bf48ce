//! Upload validation.
//!
//! Pure checks shared by the server endpoint and the upload client. Checks run
//! in a fixed order (type, size, dimensions) and the first failure wins.

use once_cell::sync::Lazy;
use std::io::Cursor;
use validator::Validate;

/// MIME types accepted for gallery images.
pub const ACCEPTED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Upload ceiling in KB, as shown to users.
pub const MAX_UPLOAD_KB: usize = 500;

/// Upload ceiling in bytes (512,000).
pub const MAX_UPLOAD_BYTES: usize = MAX_UPLOAD_KB * 1024;

pub const MIN_WIDTH: u32 = 400;
pub const MAX_WIDTH: u32 = 4000;
pub const MIN_HEIGHT: u32 = 300;
pub const MAX_HEIGHT: u32 = 4000;

static ACCEPTED_LIST: Lazy<String> = Lazy::new(|| ACCEPTED_MIME_TYPES.join(", "));

/// Whether pixel dimensions are checked in addition to type and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationMode {
    #[default]
    Standard,
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    MissingFile,
    UnsupportedType(String),
    TooLarge { size: Option<usize> },
    WidthOutOfRange(u32),
    HeightOutOfRange(u32),
    UnreadableImage(String),
    InvalidField(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingFile => write!(f, "No file provided"),
            ValidationError::UnsupportedType(_) => {
                write!(f, "Invalid file type. Accepted: {}", ACCEPTED_LIST.as_str())
            }
            ValidationError::TooLarge { size: Some(size) } => write!(
                f,
                "File size exceeds {} KB limit. Current size: {:.2} KB",
                MAX_UPLOAD_KB,
                *size as f64 / 1024.0
            ),
            ValidationError::TooLarge { size: None } => {
                write!(f, "File size exceeds {} KB limit", MAX_UPLOAD_KB)
            }
            ValidationError::WidthOutOfRange(width) => write!(
                f,
                "Image width must be between {}px and {}px. Current: {}px",
                MIN_WIDTH, MAX_WIDTH, width
            ),
            ValidationError::HeightOutOfRange(height) => write!(
                f,
                "Image height must be between {}px and {}px. Current: {}px",
                MIN_HEIGHT, MAX_HEIGHT, height
            ),
            ValidationError::UnreadableImage(msg) => {
                write!(f, "Failed to validate image dimensions: {}", msg)
            }
            ValidationError::InvalidField(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Reduce a content type to its lowercase essence ("image/png; x=y" -> "image/png").
pub fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn validate_type(mime_type: &str) -> Result<(), ValidationError> {
    let essence = mime_essence(mime_type);
    if ACCEPTED_MIME_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedType(mime_type.to_string()))
    }
}

pub fn validate_size(size: usize) -> Result<(), ValidationError> {
    if size > MAX_UPLOAD_BYTES {
        Err(ValidationError::TooLarge { size: Some(size) })
    } else {
        Ok(())
    }
}

pub fn validate_dimensions(width: u32, height: u32) -> Result<(), ValidationError> {
    if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
        return Err(ValidationError::WidthOutOfRange(width));
    }
    if !(MIN_HEIGHT..=MAX_HEIGHT).contains(&height) {
        return Err(ValidationError::HeightOutOfRange(height));
    }
    Ok(())
}

/// Read pixel dimensions from the image header without decoding pixel data.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), ValidationError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ValidationError::UnreadableImage(e.to_string()))
}

/// Type and size checks, for when only the declared metadata is known.
pub fn validate_upload(mime_type: &str, size: usize) -> Result<(), ValidationError> {
    validate_type(mime_type)?;
    validate_size(size)
}

/// Full check of an in-memory image.
pub fn validate_image(
    mime_type: &str,
    bytes: &[u8],
    mode: ValidationMode,
) -> Result<(), ValidationError> {
    validate_upload(mime_type, bytes.len())?;

    if mode == ValidationMode::Strict {
        let (width, height) = probe_dimensions(bytes)?;
        validate_dimensions(width, height)?;
    }

    Ok(())
}

/// Title and subtitle as submitted with an upload.
#[derive(Clone, Debug, Default, Validate)]
pub struct UploadMetadata {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,
    #[validate(length(max = 500, message = "Subtitle must be at most 500 characters"))]
    pub subtitle: Option<String>,
}

impl UploadMetadata {
    /// Trim both fields; a blank subtitle is stored as absent.
    pub fn new(title: &str, subtitle: Option<&str>) -> Self {
        Self {
            title: title.trim().to_string(),
            subtitle: subtitle
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Invalid title or subtitle".to_string());
            ValidationError::InvalidField(message)
        })
    }
}
