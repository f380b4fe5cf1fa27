/// In-memory document backed by a note on disk
use crate::{
    document::{Document, TextRange},
    error::{UploadError, UploadResult},
};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    path: String,
    text: String,
    cursor: usize,
}

impl InMemoryDocument {
    /// Create a document with the cursor at the end of the text
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            cursor: text.len(),
            text,
        }
    }

    /// Load a note from `root/path`
    pub async fn load(root: &Path, path: &str) -> UploadResult<Self> {
        let text = fs::read_to_string(root.join(path)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UploadError::NotFound(format!("Note not found: {}", path))
            } else {
                UploadError::Io(e)
            }
        })?;
        Ok(Self::new(path, text))
    }

    /// Write the note back to `root/path`
    pub async fn save(&self, root: &Path) -> UploadResult<()> {
        fs::write(root.join(&self.path), &self.text)
            .await
            .map_err(|e| UploadError::LocalWrite(format!("Failed to save {}: {}", self.path, e)))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Document for InMemoryDocument {
    fn path(&self) -> &str {
        &self.path
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn find(&self, needle: &str) -> Option<TextRange> {
        if needle.is_empty() {
            return None;
        }
        self.text.find(needle).map(|start| start..start + needle.len())
    }

    fn replace_range(&mut self, range: TextRange, replacement: &str) -> UploadResult<()> {
        if range.start > range.end
            || range.end > self.text.len()
            || !self.text.is_char_boundary(range.start)
            || !self.text.is_char_boundary(range.end)
        {
            return Err(UploadError::Validation(format!(
                "Invalid range {:?} for document of {} bytes",
                range,
                self.text.len()
            )));
        }

        let removed = range.end - range.start;
        self.text.replace_range(range.clone(), replacement);

        // Keep the cursor anchored to the text it was next to
        if self.cursor >= range.end {
            self.cursor = self.cursor - removed + replacement.len();
        } else if self.cursor > range.start {
            self.cursor = range.start + replacement.len();
        }

        Ok(())
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, offset: usize) {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        self.cursor = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_shifts_cursor() {
        let mut doc = InMemoryDocument::new("a.md", "hello world");
        doc.set_cursor(11);
        doc.replace_range(0..5, "goodbye").unwrap();
        assert_eq!(doc.as_str(), "goodbye world");
        assert_eq!(doc.cursor(), 13);
    }

    #[test]
    fn test_replace_rejects_bad_range() {
        let mut doc = InMemoryDocument::new("a.md", "héllo");
        assert!(doc.replace_range(2..3, "x").is_err());
        assert!(doc.replace_range(0..99, "x").is_err());
    }

    #[test]
    fn test_find_first_occurrence() {
        let doc = InMemoryDocument::new("a.md", "ab ab");
        assert_eq!(doc.find("ab"), Some(0..2));
        assert_eq!(doc.find(""), None);
        assert_eq!(doc.find("zz"), None);
    }

    #[tokio::test]
    async fn test_load_and_save() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("n.md"), "text").unwrap();

        let mut doc = InMemoryDocument::load(dir.path(), "n.md").await.unwrap();
        doc.replace_range(0..4, "new").unwrap();
        doc.save(dir.path()).await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("n.md")).unwrap(), "new");
        assert!(matches!(
            InMemoryDocument::load(dir.path(), "missing.md").await,
            Err(UploadError::NotFound(_))
        ));
    }
}
