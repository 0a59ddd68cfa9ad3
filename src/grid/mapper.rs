use super::*;
use crate::grid_like::GridLike;
use smallvec::SmallVec;

// Typical trays stay well under this many cells.
const DEFAULT_SMALLVEC_SIZE: usize = 32;

/// A type alias for SmallVec with a stack-allocated buffer sized for common grids.
pub type SmallVecCells<T> = SmallVec<[T; DEFAULT_SMALLVEC_SIZE]>;

/// One cell's geometry in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CellMapping {
    pub cell: Cell,
    pub position: Position,
    /// Rectangle over the image as rendered; used for the overlay.
    pub display: CellRect,
    /// Rectangle over the full-resolution source; used for cropping.
    pub natural: CellRect,
}

impl CellMapping {
    /// The natural rectangle snapped to source pixels.
    pub fn pixel_rect(&self, dims: &ImageDimensions) -> PixelRect {
        PixelRect::snap(&self.natural, dims.natural_width, dims.natural_height)
    }
}

/// Maps a single cell to its display and natural rectangles.
///
/// The display rectangle is computed from the display size and margins; the natural one is
/// the same rectangle scaled by the natural/display ratio on each axis.
///
/// # Example
/// ```
/// use gridcrop::{map_cell, GridConfig, ImageDimensions, PixelRect};
///
/// let config = GridConfig::new(1, 1, 0.1, 0.2).unwrap();
/// let dims = ImageDimensions::new(1200, 800, 600.0, 400.0).unwrap();
/// let mapping = map_cell(&config, &dims, 0, 0).unwrap();
/// assert!((mapping.display.x - 60.0).abs() < 1e-9);
/// assert!((mapping.natural.width - 960.0).abs() < 1e-9);
/// assert_eq!(
///     mapping.pixel_rect(&dims),
///     PixelRect { x: 120, y: 160, width: 960, height: 480 }
/// );
/// ```
pub fn map_cell(
    config: &GridConfig,
    dims: &ImageDimensions,
    row: u32,
    col: u32,
) -> Result<CellMapping, GridError> {
    config.validate()?;
    if row >= config.rows() || col >= config.cols() {
        return Err(GridError::CellOutOfRange { row, col });
    }
    let display = display_rect(config, dims.display_width, dims.display_height, row, col);
    let (sx, sy) = dims.scale();
    let cell = Cell::new(row, col);
    Ok(CellMapping {
        cell,
        position: cell.position(config.cols()),
        display,
        natural: display.scaled(sx, sy),
    })
}

fn display_rect(config: &GridConfig, width: f64, height: f64, row: u32, col: u32) -> CellRect {
    let start_x = width * config.margin_x();
    let start_y = height * config.margin_y();
    let grid_w = width * (1.0 - 2.0 * config.margin_x());
    let grid_h = height * (1.0 - 2.0 * config.margin_y());
    let cell_w = grid_w / config.cols() as f64;
    let cell_h = grid_h / config.rows() as f64;
    CellRect::new(
        start_x + col as f64 * cell_w,
        start_y + row as f64 * cell_h,
        cell_w,
        cell_h,
    )
}

/// Every cell mapping of a configuration, in Position order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GridLayout {
    pub dims: ImageDimensions,
    pub rows: u32,
    pub cols: u32,
    pub cells: SmallVecCells<CellMapping>,
}

impl GridLayout {
    /// Computes the layout of `config` over an image of size `dims`.
    ///
    /// # Example
    /// ```
    /// use gridcrop::{GridConfig, GridLayout, ImageDimensions};
    ///
    /// let dims = ImageDimensions::native(300, 200).unwrap();
    /// let layout = GridLayout::new(&GridConfig::default(), dims).unwrap();
    /// assert_eq!(layout.cells.len(), 6);
    /// assert_eq!(layout.mapping(6).unwrap().cell.row, 1);
    /// ```
    pub fn new(config: &GridConfig, dims: ImageDimensions) -> Result<Self, GridError> {
        config.validate()?;
        trace!("Mapping {:?} over {:?}", config, dims);
        let cells = config
            .cells()
            .map(|cell| map_cell(config, &dims, cell.row, cell.col))
            .collect::<Result<SmallVecCells<_>, _>>()?;
        Ok(Self {
            dims,
            rows: config.rows(),
            cols: config.cols(),
            cells,
        })
    }

    /// Looks up a mapping by its 1-based position.
    pub fn mapping(&self, position: Position) -> Option<&CellMapping> {
        let index = (position as usize).checked_sub(1)?;
        self.cells.get(index)
    }

    /// Natural rectangles snapped to source pixels, tagged with their positions.
    pub fn pixel_rects(&self) -> impl Iterator<Item = (Position, PixelRect)> + '_ {
        self.cells
            .iter()
            .map(|mapping| (mapping.position, mapping.pixel_rect(&self.dims)))
    }
}

impl GridLike for GridLayout {
    fn row_count(&self) -> u32 {
        self.rows
    }

    fn column_count(&self) -> u32 {
        self.cols
    }
}
