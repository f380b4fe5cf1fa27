/// Uploader context and session management
use crate::{
    blob_store::{BlobStore, S3BlobStore, Vault},
    compress::{ImageCompressor, PayloadFilter},
    config::UploaderConfig,
    error::{UploadError, UploadResult},
    ignore::IgnoreMatcher,
    notify::Notifier,
};
use std::sync::{Arc, RwLock};

/// Everything derived from one version of the settings
///
/// Immutable once built. A settings change builds a new session and swaps it in,
/// so an upload in flight keeps the session it started with.
pub struct Session {
    pub config: Arc<UploaderConfig>,
    store: Option<Arc<dyn BlobStore>>,
    pub ignore: IgnoreMatcher,
    compressor: Option<Arc<dyn PayloadFilter>>,
}

impl Session {
    fn build(config: Arc<UploaderConfig>, store: Option<Arc<dyn BlobStore>>) -> Self {
        let compressor: Option<Arc<dyn PayloadFilter>> = if config.enable_image_compression {
            Some(Arc::new(ImageCompressor::from_config(&config)))
        } else {
            None
        };

        Self {
            ignore: IgnoreMatcher::new(&config.ignore_pattern),
            compressor,
            store,
            config,
        }
    }

    /// Remote store, or `ConfigurationMissing` when none is configured
    pub fn remote_store(&self) -> UploadResult<Arc<dyn BlobStore>> {
        self.store.clone().ok_or_else(|| {
            UploadError::ConfigurationMissing("remote storage is not configured".to_string())
        })
    }

    pub fn compressor(&self) -> Option<&Arc<dyn PayloadFilter>> {
        self.compressor.as_ref()
    }
}

/// Shared services for the uploader
pub struct UploaderContext {
    session: RwLock<Arc<Session>>,
    pub vault: Vault,
    pub notifier: Arc<dyn Notifier>,
}

impl UploaderContext {
    /// Create a context, connecting to S3 when remote settings are present
    pub async fn new(
        config: UploaderConfig,
        vault: Vault,
        notifier: Arc<dyn Notifier>,
    ) -> UploadResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let store = Self::connect(&config).await?;

        Ok(Self {
            session: RwLock::new(Arc::new(Session::build(config, store))),
            vault,
            notifier,
        })
    }

    /// Create a context around an already constructed store
    pub fn with_store(
        config: UploaderConfig,
        store: Option<Arc<dyn BlobStore>>,
        vault: Vault,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session: RwLock::new(Arc::new(Session::build(Arc::new(config), store))),
            vault,
            notifier,
        }
    }

    async fn connect(config: &Arc<UploaderConfig>) -> UploadResult<Option<Arc<dyn BlobStore>>> {
        if config.ensure_remote_configured().is_err() {
            tracing::info!("Remote storage not configured - local mode only");
            return Ok(None);
        }

        let store = S3BlobStore::new(Arc::clone(config)).await?;
        Ok(Some(Arc::new(store)))
    }

    /// Current session snapshot
    pub fn session(&self) -> Arc<Session> {
        match self.session.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Apply new settings: build a fresh client and swap it in
    pub async fn reconfigure(&self, config: UploaderConfig) -> UploadResult<()> {
        config.validate()?;
        let config = Arc::new(config);
        let store = Self::connect(&config).await?;
        self.swap(Session::build(config, store));
        Ok(())
    }

    /// Apply new settings with an explicit store
    pub fn reconfigure_with_store(&self, config: UploaderConfig, store: Option<Arc<dyn BlobStore>>) {
        self.swap(Session::build(Arc::new(config), store));
    }

    fn swap(&self, session: Session) {
        let session = Arc::new(session);
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
        tracing::info!("Uploader settings reloaded");
    }
}
