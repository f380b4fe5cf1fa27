/// Shared fixtures for integration tests
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vault_uploader::{
    blob_store::{BlobStore, MemoryBlobStore, Vault},
    notify::RecordingNotifier,
    Orchestrator, UploaderConfig, UploaderContext,
};

pub const URL_PREFIX: &str = "https://cdn.test/";

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(config: UploaderConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryBlobStore::new(URL_PREFIX));
        let notifier = Arc::new(RecordingNotifier::default());
        let context = UploaderContext::with_store(
            config,
            Some(store.clone() as Arc<dyn BlobStore>),
            Vault::new(dir.path().to_path_buf()),
            notifier.clone(),
        );

        Self {
            orchestrator: Arc::new(Orchestrator::new(Arc::new(context))),
            store,
            notifier,
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, data: &[u8]) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(path, data).expect("write file");
    }

    pub fn read_note(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).expect("read note")
    }
}

/// Config whose public URLs match the in-memory store's prefix
pub fn remote_config() -> UploaderConfig {
    UploaderConfig {
        bucket: "notes".to_string(),
        region: "us-east-1".to_string(),
        access_key: "AKIA".to_string(),
        secret_key: "secret".to_string(),
        use_custom_image_url: true,
        custom_image_url: URL_PREFIX.to_string(),
        ..Default::default()
    }
}
