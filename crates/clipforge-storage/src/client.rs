//! S3-compatible client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Multipart upload part size (10 MiB).
const MULTIPART_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Concurrent part uploads per file.
const MULTIPART_CONCURRENCY: usize = 3;

/// The pipeline's bucket set, overridable via environment.
#[derive(Debug, Clone)]
pub struct Buckets {
    /// Raw downloaded source media
    pub raw_videos: String,
    /// Clip thumbnails
    pub thumbnails: String,
    /// Rendered vertical clips
    pub processed_shorts: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            raw_videos: "raw-videos".to_string(),
            thumbnails: "thumbnails".to_string(),
            processed_shorts: "processed-shorts".to_string(),
        }
    }
}

impl Buckets {
    /// Read bucket overrides from environment variables.
    pub fn from_env() -> Self {
        Self {
            raw_videos: std::env::var("RAW_VIDEOS_BUCKET")
                .unwrap_or_else(|_| "raw-videos".to_string()),
            thumbnails: std::env::var("THUMBNAILS_BUCKET")
                .unwrap_or_else(|_| "thumbnails".to_string()),
            processed_shorts: std::env::var("PROCESSED_SHORTS_BUCKET")
                .unwrap_or_else(|_| "processed-shorts".to_string()),
        }
    }
}

/// Configuration for the object store client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region
    pub region: String,
    /// Bucket set
    pub buckets: Buckets,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            buckets: Buckets::from_env(),
        })
    }
}

/// Object store client.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    buckets: Buckets,
}

impl ObjectStore {
    /// Create a new client from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "clipforge",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            buckets: config.buckets,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(config).await
    }

    /// The configured bucket set.
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Upload a file, switching to multipart above the part-size threshold.
    pub async fn upload_file(
        &self,
        bucket: &str,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path).await?.len();

        if size > MULTIPART_PART_SIZE {
            self.upload_multipart(bucket, path, key, content_type, size)
                .await
        } else {
            debug!("Uploading {} to {}/{}", path.display(), bucket, key);

            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;

            info!("Uploaded {} to {}/{}", path.display(), bucket, key);
            Ok(())
        }
    }

    /// Multipart upload with 10 MiB parts and bounded part concurrency.
    async fn upload_multipart(
        &self,
        bucket: &str,
        path: &Path,
        key: &str,
        content_type: &str,
        size: u64,
    ) -> StorageResult<()> {
        let part_count = size.div_ceil(MULTIPART_PART_SIZE);
        debug!(
            "Multipart upload {} to {}/{} ({} parts)",
            path.display(),
            bucket,
            key,
            part_count
        );

        let upload = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let upload_id = upload
            .upload_id()
            .ok_or_else(|| StorageError::upload_failed("missing multipart upload id"))?
            .to_string();

        let part_results: Vec<StorageResult<CompletedPart>> =
            stream::iter(0..part_count)
                .map(|index| {
                    let client = self.client.clone();
                    let upload_id = upload_id.clone();
                    let bucket = bucket.to_string();
                    let key = key.to_string();
                    let path = path.to_path_buf();

                    async move {
                        let offset = index * MULTIPART_PART_SIZE;
                        let len = MULTIPART_PART_SIZE.min(size - offset) as usize;
                        let part_number = (index + 1) as i32;

                        let mut file = tokio::fs::File::open(&path).await?;
                        file.seek(std::io::SeekFrom::Start(offset)).await?;
                        let mut buf = vec![0u8; len];
                        file.read_exact(&mut buf).await?;

                        let part = client
                            .upload_part()
                            .bucket(&bucket)
                            .key(&key)
                            .upload_id(&upload_id)
                            .part_number(part_number)
                            .body(ByteStream::from(buf))
                            .send()
                            .await
                            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

                        Ok(CompletedPart::builder()
                            .part_number(part_number)
                            .set_e_tag(part.e_tag().map(|t| t.to_string()))
                            .build())
                    }
                })
                .buffer_unordered(MULTIPART_CONCURRENCY)
                .collect()
                .await;

        let mut parts = Vec::with_capacity(part_results.len());
        for result in part_results {
            match result {
                Ok(part) => parts.push(part),
                Err(e) => {
                    warn!("Multipart part failed, aborting upload: {}", e);
                    self.client
                        .abort_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send()
                        .await
                        .ok();
                    return Err(e);
                }
            }
        }

        parts.sort_by_key(|p| p.part_number());

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(
            "Uploaded {} to {}/{} ({} MiB, multipart)",
            path.display(),
            bucket,
            key,
            size / (1024 * 1024)
        );
        Ok(())
    }

    /// Upload bytes directly.
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}/{}", data.len(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Download an object to a file.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?;

        info!("Downloaded {}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    /// Check if an object exists.
    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(msg))
                }
            }
        }
    }

    /// Check connectivity by heading a bucket.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.buckets.raw_videos)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("connectivity check failed: {e}")))?;
        Ok(())
    }
}
