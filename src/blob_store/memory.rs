/// In-memory blob store
///
/// Used for dry runs and tests. Records every PUT and can be told to reject
/// uploads to exercise failure paths.
use crate::{
    blob_store::BlobStore,
    error::{UploadError, UploadResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<String, Vec<u8>>,
    puts: Vec<PutRecord>,
    deletes: Vec<String>,
    failure: Option<String>,
}

#[derive(Debug)]
pub struct MemoryBlobStore {
    url_prefix: String,
    state: Mutex<MemoryState>,
}

impl MemoryBlobStore {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Reject every subsequent PUT with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Seed an object without recording a PUT
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.lock().objects.insert(key.to_string(), data);
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.lock().puts.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.lock().deletes.clone()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-call; the map is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> UploadResult<String> {
        let mut state = self.lock();
        if let Some(message) = &state.failure {
            return Err(UploadError::UploadTransport(message.clone()));
        }

        state.puts.push(PutRecord {
            key: key.to_string(),
            size: data.len(),
            content_type: content_type.to_string(),
        });
        state.objects.insert(key.to_string(), data);
        drop(state);

        Ok(self.url_for(key))
    }

    async fn exists(&self, key: &str) -> UploadResult<bool> {
        Ok(self.lock().objects.contains_key(key))
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        let mut state = self.lock();
        state.objects.remove(key);
        state.deletes.push(key.to_string());
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.url_prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_exists_delete() {
        let store = MemoryBlobStore::new("https://cdn/");
        let url = store.put("a/b.png", b"data".to_vec(), "image/png").await.unwrap();
        assert_eq!(url, "https://cdn/a/b.png");
        assert!(store.exists("a/b.png").await.unwrap());

        store.delete("a/b.png").await.unwrap();
        assert!(!store.exists("a/b.png").await.unwrap());
        assert_eq!(store.deletes(), vec!["a/b.png".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryBlobStore::new("https://cdn/");
        store.fail_with("503 Slow Down");
        let err = store.put("k", vec![], "image/png").await.unwrap_err();
        assert!(err.is_transport());
        assert!(store.puts().is_empty());
    }
}
