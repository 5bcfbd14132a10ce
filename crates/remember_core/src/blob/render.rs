//! Image artifact rendering.
//!
//! # Responsibility
//! - Produce the encoded bytes of `original.jpg`, `preview.jpg` and
//!   `thumbnail.png` for a capture.
//!
//! # Invariants
//! - Thumbnails are square, `side × scale` pixels, aspect-fill cropped.
//! - Rendering is CPU-only and never touches the record store.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Cursor;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug)]
pub enum RenderError {
    Image(image::ImageError),
    EmptyImage,
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(err) => write!(f, "image rendering failed: {err}"),
            Self::EmptyImage => write!(f, "image has no pixels"),
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::EmptyImage => None,
        }
    }
}

impl From<image::ImageError> for RenderError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

/// Rendering parameters taken from store configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Thumbnail side in display points.
    pub thumbnail_side: u32,
    pub display_scale: f64,
    pub jpeg_quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            thumbnail_side: 80,
            display_scale: 2.0,
            jpeg_quality: 80,
        }
    }
}

/// Encoded artifact bytes, ready for the blob store.
#[derive(Debug, Clone)]
pub struct RenderedArtifacts {
    pub original: Vec<u8>,
    pub preview: Vec<u8>,
    pub thumbnail: Vec<u8>,
}

/// Thumbnail edge length in pixels, at least 1.
pub fn thumbnail_pixels(side: u32, scale: f64) -> u32 {
    let pixels = (f64::from(side) * scale).round();
    if pixels.is_finite() && pixels >= 1.0 {
        pixels as u32
    } else {
        1
    }
}

/// Square aspect-fill thumbnail of `preview`.
pub fn thumbnail(preview: &DynamicImage, side: u32, scale: f64) -> DynamicImage {
    let pixels = thumbnail_pixels(side, scale);
    preview.resize_to_fill(pixels, pixels, FilterType::Triangle)
}

/// Scales `image` down to fit within `max_width × max_height`, keeping the
/// aspect ratio. Images that already fit are returned unchanged.
pub fn fit_preview(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image.clone();
    }
    image.resize(max_width.max(1), max_height.max(1), FilterType::Triangle)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> RenderResult<Vec<u8>> {
    ensure_pixels(image)?;
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
    Ok(bytes)
}

pub fn encode_png(image: &DynamicImage) -> RenderResult<Vec<u8>> {
    ensure_pixels(image)?;
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encodes all three image artifacts of a capture.
pub fn render_artifacts(
    image: &DynamicImage,
    preview: &DynamicImage,
    options: &RenderOptions,
) -> RenderResult<RenderedArtifacts> {
    let thumb = thumbnail(preview, options.thumbnail_side, options.display_scale);
    Ok(RenderedArtifacts {
        original: encode_jpeg(image, options.jpeg_quality)?,
        preview: encode_jpeg(preview, options.jpeg_quality)?,
        thumbnail: encode_png(&thumb)?,
    })
}

fn ensure_pixels(image: &DynamicImage) -> RenderResult<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(RenderError::EmptyImage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{fit_preview, render_artifacts, thumbnail, thumbnail_pixels, RenderOptions};
    use image::{DynamicImage, GenericImageView};

    #[test]
    fn thumbnail_is_square_at_display_scale() {
        let wide = DynamicImage::new_rgb8(400, 100);
        let thumb = thumbnail(&wide, 80, 2.0);
        assert_eq!(thumb.dimensions(), (160, 160));
        assert_eq!(thumbnail_pixels(80, 3.0), 240);
        assert_eq!(thumbnail_pixels(80, 0.0), 1);
    }

    #[test]
    fn fit_preview_keeps_aspect_ratio() {
        let tall = DynamicImage::new_rgb8(1000, 2000);
        let fitted = fit_preview(&tall, 500, 500);
        assert_eq!(fitted.dimensions(), (250, 500));

        let small = DynamicImage::new_rgb8(10, 10);
        assert_eq!(fit_preview(&small, 500, 500).dimensions(), (10, 10));
    }

    #[test]
    fn rendered_artifacts_decode_with_expected_formats() {
        let image = DynamicImage::new_rgba8(64, 48);
        let rendered = render_artifacts(&image, &image, &RenderOptions::default()).unwrap();

        assert_eq!(
            image::guess_format(&rendered.original).unwrap(),
            image::ImageFormat::Jpeg
        );
        let thumb = image::load_from_memory(&rendered.thumbnail).unwrap();
        assert_eq!(thumb.dimensions(), (160, 160));
    }
}
