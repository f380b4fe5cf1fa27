/// Host events delivered to the orchestrator
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Paste,
    Drop,
    /// A file was created in the vault (e.g. saved by the host's own attach command)
    FileCreated,
}

/// A file carried by an event
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    /// Declared MIME type; may be empty
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Vault-relative path when the file already exists in the vault
    pub source_path: Option<String>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
            source_path: None,
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Immutable event value handed over by the host
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub kind: EventKind,
    pub files: Vec<AttachedFile>,
    /// The host or another handler already claimed this event
    pub default_prevented: bool,
}

impl UploadEvent {
    pub fn new(kind: EventKind, files: Vec<AttachedFile>) -> Self {
        Self {
            kind,
            files,
            default_prevented: false,
        }
    }

    pub fn paste(files: Vec<AttachedFile>) -> Self {
        Self::new(EventKind::Paste, files)
    }

    pub fn drop(files: Vec<AttachedFile>) -> Self {
        Self::new(EventKind::Drop, files)
    }

    /// Files the host saved into the vault itself; give each a `source_path`
    pub fn file_created(files: Vec<AttachedFile>) -> Self {
        Self::new(EventKind::FileCreated, files)
    }

    pub fn prevented(mut self) -> Self {
        self.default_prevented = true;
        self
    }
}
