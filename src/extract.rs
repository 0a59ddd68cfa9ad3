//! Crop extraction: cut one natural-space rectangle out of the source and re-encode it.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};
use tracing::*;

use crate::{GridError, PixelRect, Position};

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Turns a cropped raster into an encoded buffer.
///
/// Implementations are shared by every concurrent extraction job and must not keep
/// per-call state.
pub trait CellEncoder: Send + Sync {
    /// Encodes `image` into a standalone file buffer.
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, ImageError>;

    /// File extension for buffers produced by this encoder.
    fn extension(&self) -> &'static str;
}

/// The built-in output formats.
///
/// # Example
/// ```
/// use gridcrop::{CellEncoder, CropFormat};
/// use image::{DynamicImage, RgbImage};
///
/// let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
/// let bytes = CropFormat::Png.encode(&img).unwrap();
/// assert_eq!(&bytes[1..4], b"PNG");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CropFormat {
    /// Lossy JPEG; alpha is dropped. Quality is 1-100.
    Jpeg { quality: u8 },
    Png,
}

impl Default for CropFormat {
    fn default() -> Self {
        CropFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CellEncoder for CropFormat {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
        let mut buffer = Cursor::new(Vec::new());
        match *self {
            CropFormat::Jpeg { quality } => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
            }
            CropFormat::Png => image.write_to(&mut buffer, ImageFormat::Png)?,
        }
        Ok(buffer.into_inner())
    }

    fn extension(&self) -> &'static str {
        match self {
            CropFormat::Jpeg { .. } => "jpg",
            CropFormat::Png => "png",
        }
    }
}

/// Cuts cells out of a source raster and encodes them.
pub struct CropExtractor {
    encoder: Box<dyn CellEncoder>,
}

impl std::fmt::Debug for CropExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropExtractor")
            .field("encoder", &self.encoder.extension())
            .finish()
    }
}

impl Default for CropExtractor {
    fn default() -> Self {
        Self::new(CropFormat::default())
    }
}

impl CropExtractor {
    pub fn new(encoder: impl CellEncoder + 'static) -> Self {
        Self {
            encoder: Box::new(encoder),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.encoder.extension()
    }

    /// Crops `rect` out of `source` and encodes it.
    ///
    /// `rect` is expected to lie inside `source` (see [`PixelRect::snap`]); the decoded crop
    /// is exactly `rect.width × rect.height`.
    pub fn extract(
        &self,
        source: &DynamicImage,
        position: Position,
        rect: PixelRect,
    ) -> Result<Vec<u8>, GridError> {
        trace!("Extracting position {} from {:?}", position, rect);
        let cropped = source.crop_imm(rect.x, rect.y, rect.width, rect.height);
        self.encoder.encode(&cropped).map_err(|source| {
            error!("Encoding position {} failed: {}", position, source);
            GridError::EncodeFailure { position, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn quadrants() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(20, 10, |x, y| match (x < 10, y < 5) {
            (true, true) => Rgb([255, 0, 0]),
            (false, true) => Rgb([0, 255, 0]),
            (true, false) => Rgb([0, 0, 255]),
            (false, false) => Rgb([255, 255, 255]),
        }))
    }

    #[test]
    fn png_crop_has_exact_size_and_content() {
        let extractor = CropExtractor::new(CropFormat::Png);
        let rect = PixelRect {
            x: 10,
            y: 5,
            width: 10,
            height: 5,
        };
        let bytes = extractor.extract(&quadrants(), 4, rect).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (10, 5));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(decoded.to_rgb8().get_pixel(9, 4), &Rgb([255, 255, 255]));
    }

    #[test]
    fn jpeg_drops_alpha_and_keeps_size() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(33, 17, Rgba([10, 20, 30, 128])));
        let extractor = CropExtractor::default();
        let rect = PixelRect {
            x: 1,
            y: 2,
            width: 31,
            height: 13,
        };
        let bytes = extractor.extract(&source, 1, rect).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (31, 13));
        assert_eq!(extractor.extension(), "jpg");
    }

    struct Broken;

    impl CellEncoder for Broken {
        fn encode(&self, _image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
            Err(ImageError::IoError(std::io::Error::other("disk full")))
        }

        fn extension(&self) -> &'static str {
            "bin"
        }
    }

    #[test]
    fn encoder_errors_carry_the_position() {
        let extractor = CropExtractor::new(Broken);
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let err = extractor.extract(&quadrants(), 7, rect).unwrap_err();
        assert!(matches!(err, GridError::EncodeFailure { position: 7, .. }));
        assert!(err.to_string().contains("position 7"));
    }
}
