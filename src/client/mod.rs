//! HTTP client for the gallery API.
//!
//! Used by the admin tooling to publish, list and remove images. Uploads run
//! as a cancellable future that reports integer upload percentages.

pub mod progress;

use crate::gallery::validation::{self, ValidationError, ValidationMode};
use crate::gallery::{CreatedItem, GalleryItem};
use bytes::Bytes;
use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture};
use futures::FutureExt;
use progress::{chunked_body, ProgressTracker};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use url::Url;
use uuid::Uuid;

#[derive(Debug)]
pub enum ClientError {
    InvalidUrl(url::ParseError),
    /// Rejected locally before anything was sent.
    Validation(ValidationError),
    /// Non-2xx response. `message` is the server's `error` field when present.
    Http { status: StatusCode, message: String },
    /// 2xx response that reported `success: false` or was malformed.
    Rejected(String),
    Transport(reqwest::Error),
    Cancelled,
    Io(std::io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            ClientError::Validation(e) => write!(f, "{}", e),
            ClientError::Http { status, message } => write!(f, "{} ({})", message, status),
            ClientError::Rejected(message) => write!(f, "{}", message),
            ClientError::Transport(e) => write!(f, "Network error: {}", e),
            ClientError::Cancelled => write!(f, "Upload cancelled"),
            ClientError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::InvalidUrl(e)
    }
}

impl From<ValidationError> for ClientError {
    fn from(e: ValidationError) -> Self {
        ClientError::Validation(e)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e)
    }
}

/// An image to upload.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, taking the content type from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime_type = image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_owned())
            .unwrap_or_else(|_| mime::APPLICATION_OCTET_STREAM.to_string());
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(filename, mime_type, bytes))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody {
    #[serde(default)]
    success: bool,
    id: Option<Uuid>,
    image_url: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    token: String,
}

/// Cancels an upload from anywhere. Cancelling a finished upload does nothing.
#[derive(Clone, Debug)]
pub struct CancelHandle(AbortHandle);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.abort();
    }
}

/// An in-flight upload. Await it for the result.
pub struct UploadHandle {
    inner: Abortable<BoxFuture<'static, Result<CreatedItem, ClientError>>>,
    abort: AbortHandle,
}

impl UploadHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.abort.clone())
    }
}

impl Future for UploadHandle {
    type Output = Result<CreatedItem, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(Aborted)) => Poll::Ready(Err(ClientError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Clone)]
pub struct GalleryClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    mode: ValidationMode,
}

impl GalleryClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: None,
            mode: ValidationMode::Standard,
        })
    }

    /// Authenticate requests with an existing admin session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Check pixel dimensions locally before sending.
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Log in as the administrator and keep the session token for later calls.
    pub async fn login(&mut self, password: &str) -> Result<(), ClientError> {
        let res = self
            .http
            .post(self.endpoint("api/admin/login")?)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await?;
        let res = error_for_status(res).await?;

        let body: LoginBody = res.json().await?;
        self.token = Some(body.token);
        Ok(())
    }

    pub async fn list_items(&self) -> Result<Vec<GalleryItem>, ClientError> {
        let res = self.http.get(self.endpoint("api/gallery")?).send().await?;
        let res = error_for_status(res).await?;
        Ok(res.json().await?)
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("api/gallery/{}", id))?;
        let res = self.authorize(self.http.delete(url)).send().await?;
        error_for_status(res).await?;
        Ok(())
    }

    /// Start uploading `file`. `on_progress` receives each new integer
    /// percentage of the file handed to the transport.
    ///
    /// The returned handle must be awaited (or polled) to drive the upload.
    /// Cancelling stops the request where it is; it cannot undo an upload the
    /// server has already completed.
    pub fn upload(
        &self,
        file: UploadFile,
        title: &str,
        subtitle: Option<&str>,
        on_progress: impl Fn(u8) + Send + Sync + 'static,
    ) -> UploadHandle {
        let client = self.clone();
        let title = title.to_owned();
        let subtitle = subtitle.unwrap_or_default().to_owned();

        let task = async move {
            validation::validate_image(&file.mime_type, &file.bytes, client.mode)?;

            let url = client.endpoint("api/upload-gallery")?;
            let len = file.bytes.len() as u64;
            let tracker = Arc::new(ProgressTracker::new(file.bytes.len(), on_progress));

            let part = Part::stream_with_length(chunked_body(file.bytes, tracker), len)
                .file_name(file.filename)
                .mime_str(&file.mime_type)?;
            let form = Form::new()
                .part("file", part)
                .text("title", title)
                .text("subtitle", subtitle);

            let res = client
                .authorize(client.http.post(url))
                .multipart(form)
                .send()
                .await?;

            parse_upload_response(res).await
        }
        .boxed();

        let (abort, registration) = AbortHandle::new_pair();
        UploadHandle {
            inner: Abortable::new(task, registration),
            abort,
        }
    }
}

async fn parse_upload_response(res: Response) -> Result<CreatedItem, ClientError> {
    let status = res.status();
    let text = res.text().await?;
    let body: Option<UploadBody> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = body
            .and_then(|b| b.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Upload failed").to_owned());
        return Err(ClientError::Http { status, message });
    }

    match body {
        Some(UploadBody {
            success: true,
            id: Some(id),
            image_url: Some(image_url),
            ..
        }) => Ok(CreatedItem { id, image_url }),
        Some(UploadBody { error: Some(e), .. }) => Err(ClientError::Rejected(e)),
        _ => Err(ClientError::Rejected("Upload failed".to_owned())),
    }
}

/// Turn a non-2xx response into `ClientError::Http` carrying the server's message.
async fn error_for_status(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let message = res
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_owned());
    Err(ClientError::Http { status, message })
}
