/// Vault Uploader
///
/// Uploads media pasted or dropped into markdown notes to S3-compatible
/// storage (or a local vault folder) and rewrites the notes to reference the
/// stored copies by content-addressed name.

pub mod actions;
pub mod batch;
pub mod blob_store;
pub mod compress;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod front_matter;
pub mod hasher;
pub mod ignore;
pub mod links;
pub mod markup;
pub mod media;
pub mod naming;
pub mod notify;
pub mod orchestrator;

pub use config::UploaderConfig;
pub use context::UploaderContext;
pub use error::{UploadError, UploadResult};
pub use orchestrator::Orchestrator;
