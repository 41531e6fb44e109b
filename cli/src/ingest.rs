use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tracing::debug;

/// Longest side of a stored photo, in pixels.
pub const MAX_PHOTO_DIMENSION: u32 = 800;

const JPEG_QUALITY: u8 = 85;

/// Decode an image file and turn it into the bytes the photo store keeps:
/// RGB, at most 800x800 with the aspect ratio kept, JPEG encoded.
pub fn load_photo(path: &Path) -> Result<Vec<u8>> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    let bytes = encode_photo(img)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Prepared photo");
    Ok(bytes)
}

pub fn encode_photo(img: DynamicImage) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let img = if width > MAX_PHOTO_DIMENSION || height > MAX_PHOTO_DIMENSION {
        img.resize(MAX_PHOTO_DIMENSION, MAX_PHOTO_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .context("Failed to encode photo as JPEG")?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};

    #[test]
    fn test_large_photo_is_bounded() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(1600, 400));
        let bytes = encode_photo(img).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (800, 200));
    }

    #[test]
    fn test_small_photo_keeps_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tiny.png");
        DynamicImage::ImageRgba8(RgbaImage::new(30, 20))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let bytes = load_photo(&path).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (30, 20));
    }

    #[test]
    fn test_not_an_image() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(load_photo(&path).is_err());
    }
}
