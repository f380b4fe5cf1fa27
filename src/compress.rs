/// Image compression filter applied before upload
use crate::{
    config::UploaderConfig,
    error::{UploadError, UploadResult},
};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

/// A transformation applied to a payload before it is stored
///
/// `Ok(None)` means "leave the payload unchanged".
pub trait PayloadFilter: Send + Sync {
    fn apply(&self, data: &[u8], content_type: &str) -> UploadResult<Option<Vec<u8>>>;
}

/// Downscales and re-encodes images above a size threshold
#[derive(Debug, Clone)]
pub struct ImageCompressor {
    threshold_bytes: usize,
    quality: u8,
    max_dimension: u32,
}

impl ImageCompressor {
    pub fn new(threshold_bytes: usize, quality: f64, max_dimension: u32) -> Self {
        let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
        Self {
            threshold_bytes,
            quality,
            max_dimension,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(
            config.compression_threshold_bytes(),
            config.image_compression_quality,
            config.max_image_width_or_height,
        )
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> UploadResult<Vec<u8>> {
        let mut buf = Vec::new();

        let result = if format == ImageFormat::Jpeg {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, self.quality))
        } else {
            img.write_to(&mut Cursor::new(&mut buf), format)
        };

        result.map_err(|e| UploadError::Validation(format!("Failed to encode image: {}", e)))?;
        Ok(buf)
    }
}

impl PayloadFilter for ImageCompressor {
    fn apply(&self, data: &[u8], content_type: &str) -> UploadResult<Option<Vec<u8>>> {
        if !content_type.starts_with("image/") || data.len() <= self.threshold_bytes {
            return Ok(None);
        }

        let format = image::guess_format(data)
            .map_err(|e| UploadError::Validation(format!("Unrecognized image data: {}", e)))?;
        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| UploadError::Validation(format!("Failed to decode image: {}", e)))?;

        let img = if img.width() > self.max_dimension || img.height() > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        let encoded = self.encode(&img, format)?;
        if encoded.len() >= data.len() {
            tracing::debug!(
                "Compression did not shrink image ({} -> {} bytes), keeping original",
                data.len(),
                encoded.len()
            );
            return Ok(None);
        }

        Ok(Some(encoded))
    }
}
