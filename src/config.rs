/// Configuration management for the vault uploader
use crate::error::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_MAX_IMAGE_SIZE_MB: f64 = 1.0;
const DEFAULT_IMAGE_QUALITY: f64 = 0.7;
const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 4096;

/// Uploader settings
///
/// Field names serialize in camelCase so a persisted plugin settings blob
/// can be loaded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    /// Remote folder template (`${year}`, `${month}`, `${day}`, `${basename}`)
    pub folder: String,

    pub use_custom_endpoint: bool,
    pub custom_endpoint: String,
    pub force_path_style: bool,
    pub use_custom_image_url: bool,
    pub custom_image_url: String,
    pub query_string_key: String,
    pub query_string_value: String,

    /// Intercept drag-and-drop as well as paste
    pub drag_and_drop: bool,
    pub upload_video: bool,
    pub upload_audio: bool,
    pub upload_pdf: bool,

    /// Copy into the vault instead of uploading
    pub local_upload: bool,
    /// Local folder template, same tokens as `folder`
    pub local_upload_folder: String,

    pub enable_image_compression: bool,
    /// Size threshold in megabytes above which images get compressed
    pub max_image_compression_size: f64,
    /// Encoder quality in (0, 1]
    pub image_compression_quality: f64,
    pub max_image_width_or_height: u32,

    /// Comma-separated globs matched against note paths
    pub ignore_pattern: String,

    pub fallback_to_local: bool,
    pub delete_local_after_upload: bool,

    pub enable_batch_log: bool,
    pub batch_log_folder: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: String::new(),
            bucket: String::new(),
            folder: String::new(),
            use_custom_endpoint: false,
            custom_endpoint: String::new(),
            force_path_style: false,
            use_custom_image_url: false,
            custom_image_url: String::new(),
            query_string_key: String::new(),
            query_string_value: String::new(),
            drag_and_drop: true,
            upload_video: false,
            upload_audio: false,
            upload_pdf: false,
            local_upload: false,
            local_upload_folder: String::new(),
            enable_image_compression: false,
            max_image_compression_size: DEFAULT_MAX_IMAGE_SIZE_MB,
            image_compression_quality: DEFAULT_IMAGE_QUALITY,
            max_image_width_or_height: DEFAULT_MAX_IMAGE_DIMENSION,
            ignore_pattern: String::new(),
            fallback_to_local: false,
            delete_local_after_upload: false,
            enable_batch_log: false,
            batch_log_folder: "upload-logs".to_string(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl UploaderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> UploadResult<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let max_image_compression_size = env::var("UPLOADER_MAX_IMAGE_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_IMAGE_SIZE_MB.to_string())
            .parse()
            .map_err(|_| UploadError::Validation("Invalid max image size".to_string()))?;
        let image_compression_quality = env::var("UPLOADER_IMAGE_QUALITY")
            .unwrap_or_else(|_| DEFAULT_IMAGE_QUALITY.to_string())
            .parse()
            .map_err(|_| UploadError::Validation("Invalid image quality".to_string()))?;
        let max_image_width_or_height = env::var("UPLOADER_MAX_IMAGE_DIMENSION")
            .unwrap_or_else(|_| DEFAULT_MAX_IMAGE_DIMENSION.to_string())
            .parse()
            .map_err(|_| UploadError::Validation("Invalid max image dimension".to_string()))?;

        let custom_endpoint = env_string("UPLOADER_S3_ENDPOINT", "");
        let custom_image_url = env_string("UPLOADER_IMAGE_URL", "");

        let config = Self {
            access_key: env_string("UPLOADER_S3_ACCESS_KEY_ID", ""),
            secret_key: env_string("UPLOADER_S3_SECRET_ACCESS_KEY", ""),
            region: env_string("UPLOADER_S3_REGION", ""),
            bucket: env_string("UPLOADER_S3_BUCKET", ""),
            folder: env_string("UPLOADER_S3_FOLDER", ""),
            use_custom_endpoint: !custom_endpoint.is_empty(),
            custom_endpoint,
            force_path_style: env_flag("UPLOADER_S3_FORCE_PATH_STYLE", false),
            use_custom_image_url: !custom_image_url.is_empty(),
            custom_image_url,
            query_string_key: env_string("UPLOADER_QUERY_STRING_KEY", ""),
            query_string_value: env_string("UPLOADER_QUERY_STRING_VALUE", ""),
            drag_and_drop: env_flag("UPLOADER_UPLOAD_ON_DRAG", defaults.drag_and_drop),
            upload_video: env_flag("UPLOADER_UPLOAD_VIDEO", false),
            upload_audio: env_flag("UPLOADER_UPLOAD_AUDIO", false),
            upload_pdf: env_flag("UPLOADER_UPLOAD_PDF", false),
            local_upload: env_flag("UPLOADER_LOCAL_UPLOAD", false),
            local_upload_folder: env_string("UPLOADER_LOCAL_FOLDER", ""),
            enable_image_compression: env_flag("UPLOADER_COMPRESS_IMAGES", false),
            max_image_compression_size,
            image_compression_quality,
            max_image_width_or_height,
            ignore_pattern: env_string("UPLOADER_IGNORE_PATTERN", ""),
            fallback_to_local: env_flag("UPLOADER_FALLBACK_TO_LOCAL", false),
            delete_local_after_upload: env_flag("UPLOADER_DELETE_LOCAL_AFTER_UPLOAD", false),
            enable_batch_log: env_flag("UPLOADER_BATCH_LOG", false),
            batch_log_folder: env_string("UPLOADER_BATCH_LOG_FOLDER", &defaults.batch_log_folder),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a persisted JSON settings blob
    pub fn from_json(raw: &str) -> UploadResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> UploadResult<()> {
        if !(self.image_compression_quality > 0.0 && self.image_compression_quality <= 1.0) {
            return Err(UploadError::Validation(
                "Image quality must be within (0, 1]".to_string(),
            ));
        }

        if self.max_image_width_or_height == 0 {
            return Err(UploadError::Validation(
                "Max image dimension must be positive".to_string(),
            ));
        }

        if self.max_image_compression_size <= 0.0 {
            return Err(UploadError::Validation(
                "Max image size must be positive".to_string(),
            ));
        }

        if self.use_custom_endpoint && self.custom_endpoint.trim().is_empty() {
            return Err(UploadError::Validation(
                "Custom endpoint enabled but empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Ensure the remote store can be reached with these settings
    ///
    /// Called before any document mutation when an event resolves to remote mode.
    pub fn ensure_remote_configured(&self) -> UploadResult<()> {
        let missing: Vec<&str> = [
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("access key", &self.access_key),
            ("secret key", &self.secret_key),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::ConfigurationMissing(missing.join(", ")))
        }
    }

    /// S3 API endpoint, always ending in `/`
    pub fn api_endpoint(&self) -> String {
        if self.use_custom_endpoint && !self.custom_endpoint.trim().is_empty() {
            with_trailing_slash(self.custom_endpoint.trim())
        } else {
            format!("https://s3.{}.amazonaws.com/", self.region)
        }
    }

    /// Public URL prefix that object keys are appended to
    pub fn image_url_path(&self) -> String {
        if self.use_custom_image_url && !self.custom_image_url.trim().is_empty() {
            return with_trailing_slash(self.custom_image_url.trim());
        }

        if self.force_path_style {
            return format!("{}{}/", self.api_endpoint(), self.bucket);
        }

        if self.use_custom_endpoint && !self.custom_endpoint.trim().is_empty() {
            let endpoint = self.api_endpoint();
            return match endpoint.split_once("://") {
                Some((scheme, host)) => format!("{}://{}.{}", scheme, self.bucket, host),
                None => format!("{}.{}", self.bucket, endpoint),
            };
        }

        format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region)
    }

    /// Public URL for a storage key, with the optional query string suffix
    pub fn public_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = format!("{}{}", self.image_url_path(), encoded.join("/"));

        if !self.query_string_key.is_empty() {
            url.push('?');
            url.push_str(&urlencoding::encode(&self.query_string_key));
            url.push('=');
            url.push_str(&urlencoding::encode(&self.query_string_value));
        }

        url
    }

    /// Inverse of [`public_url`](Self::public_url): recover the storage key
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let prefix = self.image_url_path();
        let rest = url.strip_prefix(&prefix)?;
        let path = rest.split(['?', '#']).next().unwrap_or(rest);
        let decoded = urlencoding::decode(path).ok()?.into_owned();
        if decoded.is_empty() {
            None
        } else {
            Some(decoded)
        }
    }

    /// Compression threshold in bytes
    pub fn compression_threshold_bytes(&self) -> usize {
        (self.max_image_compression_size * 1024.0 * 1024.0) as usize
    }
}

fn with_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}
