use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode WebP: {0}")]
    Encode(String),

    #[error("Transcode task failed: {0}")]
    TaskFailed(String),
}

/// Transcoded image ready for upload.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Decode, width-cap and WebP-encode images.
#[derive(Debug, Clone, Copy)]
pub struct WebpTranscoder {
    max_width: u32,
    quality: f32,
}

impl WebpTranscoder {
    pub fn new(max_width: u32, quality: f32) -> Self {
        Self {
            max_width: max_width.max(1),
            quality: quality.clamp(0.0, 100.0),
        }
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Target size for an image of `width` x `height`: unchanged when within the cap,
    /// otherwise scaled to `max_width` with the height rounded to the nearest pixel.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width {
            return (width, height);
        }
        let ratio = f64::from(self.max_width) / f64::from(width);
        let new_height = (f64::from(height) * ratio).round().max(1.0) as u32;
        (self.max_width, new_height)
    }

    /// CPU-bound; callers on the async runtime should use [`Self::transcode_blocking`].
    pub fn transcode(&self, data: &[u8]) -> Result<ProcessedImage, TranscodeError> {
        let img =
            image::load_from_memory(data).map_err(|e| TranscodeError::Decode(e.to_string()))?;

        let (width, height) = img.dimensions();
        let (target_width, target_height) = self.target_dimensions(width, height);
        let img = if (target_width, target_height) != (width, height) {
            tracing::debug!(
                from_width = width,
                from_height = height,
                to_width = target_width,
                to_height = target_height,
                "Resizing image"
            );
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            img
        };

        let data = self.encode_webp(&img)?;
        Ok(ProcessedImage {
            data,
            width: target_width,
            height: target_height,
        })
    }

    /// Run [`Self::transcode`] on the blocking thread pool.
    pub async fn transcode_blocking(&self, data: Bytes) -> Result<ProcessedImage, TranscodeError> {
        let transcoder = *self;
        tokio::task::spawn_blocking(move || transcoder.transcode(&data))
            .await
            .map_err(|e| TranscodeError::TaskFailed(e.to_string()))?
    }

    fn encode_webp(&self, img: &DynamicImage) -> Result<Bytes, TranscodeError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(TranscodeError::Encode("image has no pixels".to_string()));
        }

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(self.quality);

        if webp_data.is_empty() {
            return Err(TranscodeError::Encode("encoder produced no data".to_string()));
        }

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut cursor, format)
            .unwrap();
        buffer
    }

    fn decoded_dimensions(data: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(data, ImageFormat::WebP).unwrap();
        img.dimensions()
    }

    #[test]
    fn test_target_dimensions() {
        let transcoder = WebpTranscoder::new(1920, 85.0);
        assert_eq!(transcoder.target_dimensions(1000, 500), (1000, 500));
        assert_eq!(transcoder.target_dimensions(1920, 1080), (1920, 1080));
        assert_eq!(transcoder.target_dimensions(3840, 2160), (1920, 1080));
        // 1333 * (1920 / 4000) = 639.84
        assert_eq!(transcoder.target_dimensions(4000, 1333), (1920, 640));
    }

    #[test]
    fn test_small_png_keeps_size() {
        let transcoder = WebpTranscoder::new(1920, 85.0);
        let processed = transcoder
            .transcode(&create_test_image(100, 50, ImageFormat::Png))
            .unwrap();

        assert_eq!((processed.width, processed.height), (100, 50));
        assert_eq!(&processed.data[..4], b"RIFF");
        assert_eq!(decoded_dimensions(&processed.data), (100, 50));
    }

    #[test]
    fn test_wide_jpeg_is_capped() {
        let transcoder = WebpTranscoder::new(64, 85.0);
        let processed = transcoder
            .transcode(&create_test_image(200, 101, ImageFormat::Jpeg))
            .unwrap();

        // 101 * 64 / 200 = 32.32
        assert_eq!((processed.width, processed.height), (64, 32));
        assert_eq!(decoded_dimensions(&processed.data), (64, 32));
    }

    #[test]
    fn test_invalid_bytes_fail_decode() {
        let transcoder = WebpTranscoder::new(1920, 85.0);
        let result = transcoder.transcode(b"definitely not an image");
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_transcode_blocking() {
        let transcoder = WebpTranscoder::new(1920, 85.0);
        let data = Bytes::from(create_test_image(10, 10, ImageFormat::Png));
        let processed = transcoder.transcode_blocking(data).await.unwrap();
        assert_eq!((processed.width, processed.height), (10, 10));
    }
}
