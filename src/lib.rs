//! This crate partitions a photographed surface (a tray holding several items) into a
//! configurable grid and extracts every cell as an independent, full-resolution encoded image.
//! It uses the `image` and `imageproc` crates for raster work, `rayon` to encode cells in
//! parallel and `insta`/`proptest` for testing.
//!
//! Cells are numbered by their 1-based row-major [`Position`]; that number is the key used to
//! correlate a crop with whatever a classifier later says about it.
//!
//! # Example
//! ```
//! use gridcrop::*;
//! use image::{DynamicImage, RgbImage};
//!
//! let img = DynamicImage::ImageRgb8(RgbImage::new(1200, 800));
//! // The image is shown on screen at half its size.
//! let dims = ImageDimensions::new(1200, 800, 600.0, 400.0).unwrap();
//! let config = GridConfig::default();
//!
//! let crops = CapturePipeline::default()
//!     .extract_all(&config, &dims, Some(&img))
//!     .unwrap();
//! assert_eq!(crops.len(), 6);
//! assert_eq!(crops.positions().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
//! ```

/// Debug helpers that write overlay previews and extracted crops to disk.
///
/// # Example
/// ```no_run
/// # #[cfg(feature = "drawing")] {
/// use gridcrop::{*, drawing::*};
///
/// let img = image::open("tray.jpg").unwrap();
/// let dims = ImageDimensions::from_image(&img);
/// let config = GridConfig::default();
///
/// gridcrop::debug::save_overlay_preview(&img, &dims, &config, "preview.png", &GridDrawingConfig::default()).unwrap();
/// # }
/// ```
pub mod debug;
/// This module draws the grid overlay: one outline and one centred position label per cell.
/// It is feature-gated under the `drawing` feature.
///
/// The main components of this module are:
/// - [`drawing::GridDrawingConfig`]: colours, line thickness and optional label font.
/// - [`drawing::Drawable`]: implemented by [`CellMapping`] and [`GridLayout`].
/// - [`drawing::OverlayRenderer`]: owns the transparent layer and redraws it from scratch.
#[cfg(feature = "drawing")]
pub mod drawing;
pub mod extract;
pub mod grid;
pub mod grid_like;
pub mod pipeline;
pub mod session;

pub use extract::{CellEncoder, CropExtractor, CropFormat};
pub use grid::*;
pub use grid_like::GridLike;
pub use pipeline::{CapturePipeline, Crop, CropResult};
pub use session::{BatchOutcome, ExtractionBatch, Session, SessionState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Invalid grid configuration: rows={rows}, cols={cols} (both must be at least 1)")]
    InvalidGridConfig { rows: u32, cols: u32 },

    #[error("No image is loaded")]
    ImageNotLoaded,

    #[error("Failed to encode crop at position {position}: {source}")]
    EncodeFailure {
        position: Position,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid image dimensions: width={width}, height={height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error(
        "Source image is {actual_width}x{actual_height} but the grid was mapped for {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Cell out of range: row={row}, col={col}")]
    CellOutOfRange { row: u32, col: u32 },

    #[error("Cannot {intent} while the session is {state:?}")]
    InvalidTransition {
        state: SessionState,
        intent: &'static str,
    },

    #[error("Predictions do not match the crops: {0}")]
    PredictionMismatch(String),

    #[error("Failed to load font: {0}")]
    InvalidFont(String),

    #[error("Failed to convert image: {0}")]
    ImageConversionError(String),
}
