//! Image resizing.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("cannot encode thumbnail: {0}")]
    Encode(String),
}

/// A decoded image and the format to write its thumbnails in.
pub struct SourceImage {
    image: DynamicImage,
    format: ImageFormat,
}

impl SourceImage {
    /// Decode `bytes`, guessing the format from the content.
    pub fn decode(bytes: &[u8]) -> Result<Self, ResizeError> {
        let format = image::guess_format(bytes).map_err(|e| ResizeError::Decode(e.to_string()))?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        // Formats without an encoder here are written as PNG.
        let format = match format {
            ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP => format,
            _ => ImageFormat::Png,
        };
        Ok(Self { image, format })
    }

    /// Format the thumbnails are encoded in.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Scale to `width` pixels wide, keeping the aspect ratio, and encode.
    pub fn thumbnail(&self, width: u32) -> Result<Vec<u8>, ResizeError> {
        let (src_w, src_h) = (self.image.width().max(1), self.image.height());
        let height = ((u64::from(src_h) * u64::from(width)) / u64::from(src_w)).max(1) as u32;
        let resized = self.image.resize_exact(width, height, FilterType::Triangle);

        let resized = match self.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            ImageFormat::Gif | ImageFormat::WebP => DynamicImage::ImageRgba8(resized.to_rgba8()),
            _ => resized,
        };

        let mut out = Cursor::new(Vec::new());
        resized
            .write_to(&mut out, self.format)
            .map_err(|e| ResizeError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}
