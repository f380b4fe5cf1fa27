/// Per-document overrides read from YAML front matter
use crate::{
    config::UploaderConfig,
    error::UploadResult,
    media::MediaType,
};
use serde_yaml::Value;

/// Settings a note can override in its front matter
///
/// Read-only input; the uploader never writes front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOverrides {
    /// `localUpload`
    pub local_upload: Option<bool>,
    /// `uploadFolder`
    pub upload_folder: Option<String>,
    /// `uploadOnDrag`
    pub upload_on_drag: Option<bool>,
    /// `uploadVideo`
    pub upload_video: Option<bool>,
    /// `uploadAudio`
    pub upload_audio: Option<bool>,
    /// `uploadPdf`
    pub upload_pdf: Option<bool>,
}

/// Split a note into its front matter block (without delimiters) and body
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }

    None
}

fn flag(map: &Value, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl DocumentOverrides {
    /// Parse overrides from a full note text
    pub fn parse(text: &str) -> UploadResult<Self> {
        let Some((yaml, _)) = split_front_matter(text) else {
            return Ok(Self::default());
        };

        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_yaml::from_str(yaml)?;
        if !value.is_mapping() {
            return Ok(Self::default());
        }

        let upload_folder = value
            .get("uploadFolder")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(Self {
            local_upload: flag(&value, "localUpload"),
            upload_folder,
            upload_on_drag: flag(&value, "uploadOnDrag"),
            upload_video: flag(&value, "uploadVideo"),
            upload_audio: flag(&value, "uploadAudio"),
            upload_pdf: flag(&value, "uploadPdf"),
        })
    }

    /// Parse overrides, treating malformed front matter as "no overrides"
    pub fn read(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed front matter: {}", e);
            Self::default()
        })
    }
}

/// Effective upload policy for one document: plugin defaults with
/// front-matter overrides applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub local_upload: bool,
    pub upload_on_drag: bool,
    pub upload_video: bool,
    pub upload_audio: bool,
    pub upload_pdf: bool,
}

impl UploadPolicy {
    pub fn resolve(config: &UploaderConfig, overrides: &DocumentOverrides) -> Self {
        Self {
            local_upload: overrides.local_upload.unwrap_or(config.local_upload),
            upload_on_drag: overrides.upload_on_drag.unwrap_or(config.drag_and_drop),
            upload_video: overrides.upload_video.unwrap_or(config.upload_video),
            upload_audio: overrides.upload_audio.unwrap_or(config.upload_audio),
            upload_pdf: overrides.upload_pdf.unwrap_or(config.upload_pdf),
        }
    }

    /// Whether files of this media type are intercepted
    pub fn is_enabled(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Image => true,
            MediaType::Video => self.upload_video,
            MediaType::Audio => self.upload_audio,
            MediaType::Pdf | MediaType::Presentation => self.upload_pdf,
        }
    }
}
