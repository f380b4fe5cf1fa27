/// S3-compatible blob storage backend
use crate::blob_store::BlobStore;
use crate::config::UploaderConfig;
use crate::error::{UploadError, UploadResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

/// S3 blob storage backend
///
/// Supports AWS S3 and S3-compatible storage providers (MinIO, DigitalOcean Spaces, etc.)
#[derive(Clone)]
pub struct S3BlobStore {
    client: Arc<Client>,
    bucket: String,
    config: Arc<UploaderConfig>,
}

impl S3BlobStore {
    /// Create a new S3 client from uploader settings
    pub async fn new(config: Arc<UploaderConfig>) -> UploadResult<Self> {
        config.ensure_remote_configured()?;

        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None, // session token
            None, // expiration
            "vault-uploader",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if config.use_custom_endpoint {
            let endpoint = config.api_endpoint();
            debug!("Using custom S3 endpoint: {}", endpoint);
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        s3_config_builder = s3_config_builder.force_path_style(config.force_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket.clone(),
            config,
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> UploadResult<String> {
        debug!(
            "Uploading object to S3: {} ({} bytes, type: {})",
            key,
            data.len(),
            content_type
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload object to S3: {}", e);
                UploadError::UploadTransport(format!("S3 upload failed: {}", e))
            })?;

        debug!("✓ Object uploaded to S3: {}", key);
        Ok(self.url_for(key))
    }

    async fn exists(&self, key: &str) -> UploadResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => {
                error!("Failed to check object existence in S3: {}", e);
                Err(UploadError::UploadTransport(format!(
                    "S3 head object failed: {}",
                    e
                )))
            }
        }
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        debug!("Deleting object from S3: {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete object from S3: {}", e);
                UploadError::UploadTransport(format!("S3 delete failed: {}", e))
            })?;

        debug!("✓ Object deleted from S3: {}", key);
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        self.config.public_url(key)
    }
}
