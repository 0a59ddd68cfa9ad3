use super::*;
use image::{DynamicImage, GenericImageView};
use imageproc::rect::Rect;

/// 1-based row-major cell index; the correlation key between a crop and its classification.
pub type Position = u32;

/// Intrinsic size of the source image together with the size it is currently shown at.
///
/// # Example
/// ```
/// use gridcrop::ImageDimensions;
///
/// let dims = ImageDimensions::new(1200, 800, 600.0, 400.0).unwrap();
/// assert_eq!(dims.scale(), (2.0, 2.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageDimensions {
    pub natural_width: u32,
    pub natural_height: u32,
    pub display_width: f64,
    pub display_height: f64,
}

impl ImageDimensions {
    pub fn new(
        natural_width: u32,
        natural_height: u32,
        display_width: f64,
        display_height: f64,
    ) -> Result<Self, GridError> {
        if natural_width == 0 || natural_height == 0 {
            error!(
                "Invalid natural dimensions: width={}, height={}",
                natural_width, natural_height
            );
            return Err(GridError::InvalidDimensions {
                width: natural_width as f64,
                height: natural_height as f64,
            });
        }
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(display_width) || !usable(display_height) {
            error!(
                "Invalid display dimensions: width={}, height={}",
                display_width, display_height
            );
            return Err(GridError::InvalidDimensions {
                width: display_width,
                height: display_height,
            });
        }
        Ok(Self {
            natural_width,
            natural_height,
            display_width,
            display_height,
        })
    }

    /// Dimensions of an image displayed at its own size.
    pub fn native(width: u32, height: u32) -> Result<Self, GridError> {
        Self::new(width, height, width as f64, height as f64)
    }

    /// Native dimensions of `image`. Zero-sized images are clamped to one pixel so the
    /// result is always usable; extraction still reports the mismatch.
    pub fn from_image(image: &DynamicImage) -> Self {
        let (w, h) = image.dimensions();
        let (w, h) = (w.max(1), h.max(1));
        Self {
            natural_width: w,
            natural_height: h,
            display_width: w as f64,
            display_height: h as f64,
        }
    }

    /// Returns a copy with a different on-screen size.
    pub fn with_display(&self, display_width: f64, display_height: f64) -> Result<Self, GridError> {
        Self::new(
            self.natural_width,
            self.natural_height,
            display_width,
            display_height,
        )
    }

    /// Natural pixels per display pixel, per axis.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.natural_width as f64 / self.display_width,
            self.natural_height as f64 / self.display_height,
        )
    }
}

/// A cell address in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Row-major 1-based position of this cell in a grid with `cols` columns.
    ///
    /// # Example
    /// ```
    /// use gridcrop::Cell;
    ///
    /// assert_eq!(Cell::new(0, 0).position(3), 1);
    /// assert_eq!(Cell::new(0, 2).position(3), 3);
    /// assert_eq!(Cell::new(1, 2).position(3), 6);
    /// ```
    pub fn position(&self, cols: u32) -> Position {
        self.row * cols + self.col + 1
    }

    /// Inverse of [`Cell::position`]. A `cols` of zero is treated as a single column.
    pub fn from_position(position: Position, cols: u32) -> Self {
        let cols = cols.max(1);
        let index = position.saturating_sub(1);
        Self {
            row: index / cols,
            col: index % cols,
        }
    }
}

/// Fractional rectangle in either display or natural space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CellRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CellRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Scales the rectangle per axis.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// Integer rectangle in natural space; what actually gets cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Snaps a fractional rectangle onto the pixel grid of a `bound_w × bound_h` image.
    ///
    /// Both edges are rounded half-up and the size is the distance between the rounded
    /// edges, so neighbouring cells share their edge exactly. The result is clamped into the
    /// image and is never narrower than one pixel.
    ///
    /// # Example
    /// ```
    /// use gridcrop::{CellRect, PixelRect};
    ///
    /// let rect = PixelRect::snap(&CellRect::new(0.5, 10.2, 33.3, 20.0), 100, 100);
    /// assert_eq!((rect.x, rect.y, rect.width, rect.height), (1, 10, 33, 20));
    /// ```
    pub fn snap(rect: &CellRect, bound_w: u32, bound_h: u32) -> Self {
        let (x, width) = snap_axis(rect.x, rect.width, bound_w);
        let (y, height) = snap_axis(rect.y, rect.height, bound_h);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

fn snap_axis(start: f64, length: f64, bound: u32) -> (u32, u32) {
    let bound = bound.max(1);
    let near = round_half_up(start).clamp(0.0, (bound - 1) as f64) as u32;
    let far = round_half_up(start + length).clamp(0.0, bound as f64) as u32;
    let size = far.saturating_sub(near).max(1);
    (near, size)
}

impl From<&PixelRect> for Rect {
    fn from(rect: &PixelRect) -> Self {
        Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height)
    }
}
