/// Local vault storage
///
/// Writes attachments into the note vault for local mode and upload fallback.
use crate::{
    error::{UploadError, UploadResult},
    media::MediaType,
};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// What the host filesystem adapter can tell us about paths
///
/// Chosen once when the vault is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultAdapter {
    /// Absolute base path is known; media can be embedded by absolute path
    PathCapable { base_path: PathBuf },
    /// Only vault-relative paths are available
    Opaque,
}

/// Local vault rooted at a directory
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    adapter: VaultAdapter,
}

impl Vault {
    /// Open a vault whose absolute location is known
    pub fn new(root: PathBuf) -> Self {
        let adapter = match root.canonicalize() {
            Ok(base_path) => VaultAdapter::PathCapable { base_path },
            Err(_) => VaultAdapter::Opaque,
        };
        Self { root, adapter }
    }

    /// Open a vault that hides its absolute location
    pub fn opaque(root: PathBuf) -> Self {
        Self {
            root,
            adapter: VaultAdapter::Opaque,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn adapter(&self) -> &VaultAdapter {
        &self.adapter
    }

    /// Resolve a vault-relative path, rejecting escapes out of the vault
    pub fn resolve(&self, rel_path: &str) -> UploadResult<PathBuf> {
        let rel = Path::new(rel_path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadError::Validation(format!(
                "Path escapes the vault: {}",
                rel_path
            )));
        }
        Ok(self.root.join(rel))
    }

    /// Write bytes to a vault-relative path, creating parent folders
    pub async fn write(&self, rel_path: &str, data: &[u8]) -> UploadResult<()> {
        let path = self.resolve(rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                UploadError::LocalWrite(format!("Failed to create folder for {}: {}", rel_path, e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| UploadError::LocalWrite(format!("Failed to write {}: {}", rel_path, e)))
    }

    pub async fn read(&self, rel_path: &str) -> UploadResult<Vec<u8>> {
        let path = self.resolve(rel_path)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(UploadError::NotFound(format!("File not found: {}", rel_path)))
            }
            Err(e) => Err(UploadError::Io(e)),
        }
    }

    pub async fn exists(&self, rel_path: &str) -> bool {
        match self.resolve(rel_path) {
            Ok(path) => fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Remove a file. Removing a missing file is not an error.
    pub async fn remove(&self, rel_path: &str) -> UploadResult<()> {
        let path = self.resolve(rel_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::Io(e)),
        }
    }

    /// Location string to embed for a locally stored attachment
    ///
    /// Images always use the vault-relative path. Video and audio use the
    /// absolute path when the adapter exposes one.
    pub fn media_location(&self, rel_path: &str, media_type: MediaType) -> String {
        match (&self.adapter, media_type) {
            (VaultAdapter::PathCapable { base_path }, MediaType::Video | MediaType::Audio) => {
                base_path.join(rel_path).to_string_lossy().replace('\\', "/")
            }
            _ => rel_path.to_string(),
        }
    }

    /// Vault-relative path of an absolute or root-joined path
    pub fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}
