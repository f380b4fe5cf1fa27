/// Document capability
///
/// Abstraction over the host editor buffer. Offsets are byte offsets into the
/// full text. Callers never cache an offset across an await point; they search
/// for their text again right before mutating.

pub mod memory;
pub mod replace;

pub use memory::InMemoryDocument;
pub use replace::{in_table_context, insert_at_cursor, replace_links, replace_placeholder};

use crate::error::UploadResult;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Byte range in a document
pub type TextRange = Range<usize>;

/// Editor document the uploader mutates
pub trait Document: Send {
    /// Vault-relative path of the note
    fn path(&self) -> &str;

    /// Full current text
    fn text(&self) -> String;

    /// First occurrence of `needle`
    fn find(&self, needle: &str) -> Option<TextRange> {
        if needle.is_empty() {
            return None;
        }
        self.text()
            .find(needle)
            .map(|start| start..start + needle.len())
    }

    /// Replace `range` with `replacement` in one step
    fn replace_range(&mut self, range: TextRange, replacement: &str) -> UploadResult<()>;

    fn cursor(&self) -> usize;

    fn set_cursor(&mut self, offset: usize);
}

/// Document shared between the tasks of one event
pub type SharedDocument = Arc<Mutex<dyn Document>>;

/// Wrap a concrete document for sharing
pub fn shared<D: Document + 'static>(doc: D) -> Arc<Mutex<D>> {
    Arc::new(Mutex::new(doc))
}
