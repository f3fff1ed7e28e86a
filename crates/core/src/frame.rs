//! Decoded screen-capture frames.

use base64::{Engine as _, engine::general_purpose};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Frames are compared at this resolution.
pub const THUMBNAIL_WIDTH: u32 = 320;
pub const THUMBNAIL_HEIGHT: u32 = 180;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame is not a supported image: {0}")]
    Image(#[from] image::ImageError),
}

/// One screen capture: the bytes as received plus the decoded pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    encoded: Vec<u8>,
    format: ImageFormat,
    pixels: RgbImage,
}

impl Frame {
    /// Decodes a base64 frame, with or without a `data:image/...;base64,` prefix.
    pub fn from_base64(data: &str) -> Result<Self, FrameError> {
        let payload = match data.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => data,
        };
        let bytes = general_purpose::STANDARD.decode(payload.trim())?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(encoded: Vec<u8>) -> Result<Self, FrameError> {
        let format = image::guess_format(&encoded)?;
        let pixels = image::load_from_memory_with_format(&encoded, format)?.to_rgb8();
        Ok(Self {
            encoded,
            format,
            pixels,
        })
    }

    /// Wraps raw pixels, encoding them as PNG for collaborators that need bytes.
    pub fn from_rgb(pixels: RgbImage) -> Result<Self, FrameError> {
        let mut encoded = Cursor::new(Vec::new());
        pixels.write_to(&mut encoded, ImageFormat::Png)?;
        Ok(Self {
            encoded: encoded.into_inner(),
            format: ImageFormat::Png,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn thumbnail(&self) -> RgbImage {
        imageops::resize(
            &self.pixels,
            THUMBNAIL_WIDTH,
            THUMBNAIL_HEIGHT,
            FilterType::Lanczos3,
        )
    }

    /// `data:` URL suitable for an `image_url` chat content part.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.to_mime_type(),
            general_purpose::STANDARD.encode(&self.encoded)
        )
    }
}

/// Mean absolute per-channel difference, normalized to `[0, 1]`.
///
/// Images of different dimensions are treated as completely different.
pub fn mean_abs_difference(a: &RgbImage, b: &RgbImage) -> f64 {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return 1.0;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| u64::from(x.abs_diff(*y)))
        .sum();
    total as f64 / (a.as_raw().len() as f64 * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn difference_is_normalized() {
        let black = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let white = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let grey = RgbImage::from_pixel(4, 4, Rgb([51, 51, 51]));
        assert_eq!(mean_abs_difference(&black, &black), 0.0);
        assert_eq!(mean_abs_difference(&black, &white), 1.0);
        assert!((mean_abs_difference(&black, &grey) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn mismatched_sizes_count_as_changed() {
        let a = RgbImage::new(4, 4);
        let b = RgbImage::new(8, 4);
        assert_eq!(mean_abs_difference(&a, &b), 1.0);
    }

    #[test]
    fn base64_png_round_trips_through_decoder() {
        let frame = Frame::from_rgb(RgbImage::from_pixel(640, 360, Rgb([10, 20, 30]))).unwrap();
        let url = frame.data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let decoded = Frame::from_base64(&url).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 360));
        let thumb = decoded.thumbnail();
        assert_eq!(thumb.dimensions(), (THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Frame::from_base64("%%%"),
            Err(FrameError::Base64(_))
        ));
        let not_an_image = general_purpose::STANDARD.encode(b"hello world");
        assert!(matches!(
            Frame::from_base64(&not_an_image),
            Err(FrameError::Image(_))
        ));
    }
}
