/// Media type classification
use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const PRESENTATION_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
];

/// Kinds of attachment the uploader knows how to embed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Pdf,
    Presentation,
}

impl MediaType {
    /// Classify a declared MIME type. Unrecognized types yield `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let essence = mime.split(';').next().unwrap_or("").trim();

        if essence.starts_with("image/") {
            Some(MediaType::Image)
        } else if essence.starts_with("video/") {
            Some(MediaType::Video)
        } else if essence.starts_with("audio/") {
            Some(MediaType::Audio)
        } else if essence == "application/pdf" {
            Some(MediaType::Pdf)
        } else if PRESENTATION_TYPES.contains(&essence) {
            Some(MediaType::Presentation)
        } else {
            None
        }
    }

    /// Classify by file extension (without the dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        mime_guess::from_ext(extension)
            .iter()
            .find_map(|mime| Self::from_mime(mime.essence_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Pdf => "pdf",
            MediaType::Presentation => "presentation",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "pdf" => Ok(MediaType::Pdf),
            "presentation" => Ok(MediaType::Presentation),
            other => Err(UploadError::UnknownMediaType(other.to_string())),
        }
    }
}

/// Content type to send with a PUT, guessed from the extension
pub fn content_type_for(extension: Option<&str>, declared: &str) -> String {
    if !declared.trim().is_empty() {
        return declared.trim().to_string();
    }

    extension
        .map(|ext| mime_guess::from_ext(ext).first_or_octet_stream().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
