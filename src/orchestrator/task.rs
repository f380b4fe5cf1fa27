/// Upload task state
use crate::{
    error::{UploadError, UploadResult},
    hasher::ContentDigest,
    media::MediaType,
};
use std::sync::Arc;

/// Task lifecycle: `Pending -> Uploading -> {Succeeded | FailedFallback | FailedTerminal}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Uploading,
    Succeeded,
    /// Remote upload failed, file saved locally instead
    FailedFallback,
    FailedTerminal,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::FailedFallback | TaskStatus::FailedTerminal
        )
    }

    fn can_become(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Uploading) => true,
            (TaskStatus::Uploading, next) => next.is_terminal(),
            // A task rejected before dispatch (e.g. bad media/mode pairing) ends directly
            (TaskStatus::Pending, TaskStatus::FailedTerminal) => true,
            _ => false,
        }
    }
}

/// One unit of upload work
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: u64,
    pub payload: Arc<Vec<u8>>,
    pub original_name: String,
    pub declared_media_type: String,
    pub media_type: MediaType,
    pub extension: Option<String>,
    pub digest: ContentDigest,
    /// Key for the chosen mode: object key (remote) or vault path (local)
    pub target_key: String,
    /// Vault path used by local mode and by the fallback
    pub local_key: String,
    pub display_name: String,
    pub placeholder_token: String,
    pub is_local: bool,
    /// Vault path of the source file, for file-created events and batch runs
    pub source_path: Option<String>,
    status: TaskStatus,
    result_markup: Option<String>,
}

/// Fields needed to build a task
pub struct TaskSpec {
    pub id: u64,
    pub payload: Arc<Vec<u8>>,
    pub original_name: String,
    pub declared_media_type: String,
    pub media_type: MediaType,
    pub extension: Option<String>,
    pub digest: ContentDigest,
    pub target_key: String,
    pub local_key: String,
    pub display_name: String,
    pub is_local: bool,
    pub source_path: Option<String>,
}

/// Placeholder text reserving the insertion point of task `id`
pub fn placeholder_token(id: u64, display_name: &str) -> String {
    format!("![uploading... #{}]({})", id, display_name)
}

impl UploadTask {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            placeholder_token: placeholder_token(spec.id, &spec.display_name),
            id: spec.id,
            payload: spec.payload,
            original_name: spec.original_name,
            declared_media_type: spec.declared_media_type,
            media_type: spec.media_type,
            extension: spec.extension,
            digest: spec.digest,
            target_key: spec.target_key,
            local_key: spec.local_key,
            display_name: spec.display_name,
            is_local: spec.is_local,
            source_path: spec.source_path,
            status: TaskStatus::Pending,
            result_markup: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result_markup(&self) -> Option<&str> {
        self.result_markup.as_deref()
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Move to `Uploading`
    pub fn start(&mut self) -> UploadResult<()> {
        self.transition(TaskStatus::Uploading)
    }

    /// Move to a terminal state and record the final markup. Happens once.
    pub fn finish(&mut self, status: TaskStatus, markup: String) -> UploadResult<()> {
        if !status.is_terminal() {
            return Err(UploadError::Validation(format!(
                "{:?} is not a terminal state",
                status
            )));
        }
        self.transition(status)?;
        self.result_markup = Some(markup);
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> UploadResult<()> {
        if !self.status.can_become(next) {
            return Err(UploadError::Validation(format!(
                "Task {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
