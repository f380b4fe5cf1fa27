/// Markup synthesis for uploaded attachments
use crate::{
    error::{UploadError, UploadResult},
    links::{parse_links, LinkKind},
    media::MediaType,
};

const OFFICE_VIEWER: &str = "https://view.officeapps.live.com/op/embed.aspx?src=";

fn is_remote(location: &str) -> bool {
    location.contains("://")
}

/// Wrap a destination in angle brackets when it would break inline-link syntax
fn link_destination(location: &str) -> String {
    if location.contains([' ', '(', ')']) {
        format!("<{}>", location)
    } else {
        location.to_string()
    }
}

fn media_source(location: &str, is_local: bool) -> String {
    if is_local && !is_remote(location) {
        format!("file://{}", location)
    } else {
        location.to_string()
    }
}

/// Reject media/mode pairs that cannot be embedded
///
/// PDFs and presentations cannot be embedded from local storage.
pub fn check_combination(media_type: MediaType, is_local: bool) -> UploadResult<()> {
    match media_type {
        MediaType::Pdf if is_local => Err(UploadError::UnsupportedCombination(
            "PDF files cannot be embedded from local storage".to_string(),
        )),
        MediaType::Presentation if is_local => Err(UploadError::UnsupportedCombination(
            "Presentations cannot be embedded from local storage".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Produce the markup fragment that embeds `location`
pub fn synthesize(location: &str, media_type: MediaType, is_local: bool) -> UploadResult<String> {
    check_combination(media_type, is_local)?;
    match media_type {
        MediaType::Image => Ok(format!("![image]({})", link_destination(location))),
        MediaType::Video => Ok(format!(
            "<video src=\"{}\" controls></video>",
            media_source(location, is_local)
        )),
        MediaType::Audio => Ok(format!(
            "<audio src=\"{}\" controls></audio>",
            media_source(location, is_local)
        )),
        MediaType::Pdf => Ok(format!(
            "<iframe frameborder=0 border=0 width=100% height=800 src=\"{}\"></iframe>",
            location
        )),
        MediaType::Presentation => Ok(format!(
            "<iframe frameborder=0 border=0 width=100% height=800 src=\"{}{}\"></iframe>",
            OFFICE_VIEWER,
            urlencoding::encode(location)
        )),
    }
}

/// Like [`synthesize`], with the media type given by name
pub fn synthesize_named(location: &str, media_type: &str, is_local: bool) -> UploadResult<String> {
    synthesize(location, media_type.parse()?, is_local)
}

/// Recover the location from image markup produced by [`synthesize`]
pub fn image_location(markup: &str) -> Option<String> {
    parse_links(markup)
        .into_iter()
        .find(|link| link.kind == LinkKind::Inline && link.is_embed)
        .map(|link| link.path)
}

/// Inline marker left in place of a placeholder when a task fails for good
pub fn error_marker(message: &str) -> String {
    let single_line = message.replace(['\n', '\r'], " ");
    format!("[Upload failed: {}]", single_line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_markup() {
        let markup = synthesize("https://b.s3.amazonaws.com/a.png", MediaType::Image, false).unwrap();
        assert_eq!(markup, "![image](https://b.s3.amazonaws.com/a.png)");
    }

    #[test]
    fn test_image_round_trip() {
        for location in [
            "https://cdn.example.com/x/abc.png?v=1",
            "attachments/abc.png",
            "my folder/abc (1).png",
        ] {
            let markup = synthesize(location, MediaType::Image, false).unwrap();
            assert_eq!(image_location(&markup).as_deref(), Some(location));
        }
    }

    #[test]
    fn test_local_video_uses_file_scheme() {
        let markup = synthesize("attachments/clip.mp4", MediaType::Video, true).unwrap();
        assert_eq!(markup, "<video src=\"file://attachments/clip.mp4\" controls></video>");

        let remote = synthesize("https://cdn/clip.mp4", MediaType::Video, true).unwrap();
        assert!(remote.contains("src=\"https://cdn/clip.mp4\""));
    }

    #[test]
    fn test_audio_markup() {
        let markup = synthesize("https://cdn/a.mp3", MediaType::Audio, false).unwrap();
        assert_eq!(markup, "<audio src=\"https://cdn/a.mp3\" controls></audio>");
    }

    #[test]
    fn test_local_pdf_always_rejected() {
        for location in ["doc.pdf", "/abs/doc.pdf", "https://cdn/doc.pdf", ""] {
            assert!(matches!(
                synthesize(location, MediaType::Pdf, true),
                Err(UploadError::UnsupportedCombination(_))
            ));
        }
        assert!(synthesize("https://cdn/doc.pdf", MediaType::Pdf, false)
            .unwrap()
            .contains("src=\"https://cdn/doc.pdf\""));
    }

    #[test]
    fn test_presentation_uses_viewer() {
        let markup = synthesize("https://cdn/deck.pptx", MediaType::Presentation, false).unwrap();
        assert!(markup.contains("view.officeapps.live.com"));
        assert!(markup.contains("https%3A%2F%2Fcdn%2Fdeck.pptx"));
    }

    #[test]
    fn test_unknown_media_name() {
        assert!(matches!(
            synthesize_named("x", "hologram", false),
            Err(UploadError::UnknownMediaType(_))
        ));
    }

    #[test]
    fn test_error_marker_is_single_line() {
        assert_eq!(error_marker("bad\nrequest "), "[Upload failed: bad request]");
    }
}
