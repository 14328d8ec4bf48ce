//! S3-compatible storage backend.

use super::{ByteStream, StorageBackend, StorageError, StorageObject};
use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::TryStreamExt;
use rusoto_core::credential::StaticProvider;
use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_s3::{
    DeleteObjectRequest, GetObjectError, GetObjectRequest, PutObjectRequest, S3Client, S3,
};

/// S3-compatible storage backend.
pub struct S3Storage {
    s3: S3Client,
    bucket_name: String,
    pub pub_url: String,
}

impl S3Storage {
    /// Create a new S3 storage backend using the default credential chain.
    pub fn new(region: Region, bucket_name: String, pub_url: String) -> S3Storage {
        log::info!("S3Storage initialized for bucket: {}", bucket_name);

        S3Storage {
            s3: S3Client::new(region),
            bucket_name,
            pub_url: pub_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a backend from configuration. Static credentials are used when
    /// both keys are set, otherwise the default chain (env, profile, IMDS).
    pub fn from_config(config: &StorageConfig) -> Result<S3Storage, StorageError> {
        let region = Region::Custom {
            name: config.s3_region.clone(),
            endpoint: config.s3_endpoint.clone(),
        };

        if config.s3_access_key.is_empty() || config.s3_secret_key.is_empty() {
            return Ok(Self::new(
                region,
                config.s3_bucket.clone(),
                config.s3_public_url.clone(),
            ));
        }

        let http = HttpClient::new().map_err(|e| StorageError::Config(e.to_string()))?;
        let credentials = StaticProvider::new_minimal(
            config.s3_access_key.clone(),
            config.s3_secret_key.clone(),
        );

        log::info!("S3Storage initialized for bucket: {}", config.s3_bucket);

        Ok(S3Storage {
            s3: S3Client::new_with(http, credentials, region),
            bucket_name: config.s3_bucket.clone(),
            pub_url: config.s3_public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        log::info!("S3Storage: put_object: {}", key);

        let put_request = PutObjectRequest {
            bucket: self.bucket_name.clone(),
            key: key.to_owned(),
            content_length: Some(data.len() as i64),
            content_type: Some(content_type.to_owned()),
            body: Some(data.into()),
            ..Default::default()
        };

        self.s3
            .put_object(put_request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<String>,
    ) -> Result<StorageObject, StorageError> {
        log::debug!("S3Storage: get_object: {}", key);

        let request = GetObjectRequest {
            bucket: self.bucket_name.clone(),
            key: key.to_owned(),
            range,
            ..Default::default()
        };

        let output = self.s3.get_object(request).await.map_err(|e| match e {
            RusotoError::Service(GetObjectError::NoSuchKey(msg)) => StorageError::NotFound(msg),
            other => StorageError::S3(other.to_string()),
        })?;

        let body: ByteStream = match output.body {
            Some(stream) => {
                let mapped = stream.map_ok(Bytes::from).map_err(|e: std::io::Error| {
                    std::io::Error::other(e.to_string())
                });
                Box::pin(mapped)
            }
            None => {
                return Err(StorageError::NotFound("Empty body".into()));
            }
        };

        Ok(StorageObject {
            body,
            content_length: output.content_length,
            content_type: output.content_type,
            e_tag: output.e_tag,
            content_range: output.content_range,
            accept_ranges: output.accept_ranges,
            last_modified: output.last_modified,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        log::info!("S3Storage: delete_object: {}", key);

        // S3 answers 204 for missing keys too, so NotFound never surfaces here.
        let request = DeleteObjectRequest {
            bucket: self.bucket_name.clone(),
            key: key.to_owned(),
            ..Default::default()
        };

        self.s3
            .delete_object(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.pub_url, key)
    }
}
