use super::*;

/// Upper bound for either margin; keeps the grid area strictly positive.
pub const MAX_MARGIN: f64 = 0.49;
/// Size of one margin nudge.
pub const MARGIN_STEP: f64 = 0.02;

const DEFAULT_ROWS: u32 = 2;
const DEFAULT_COLS: u32 = 3;
const DEFAULT_MARGIN: f64 = 0.1;

/// The axis a margin applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y,
}

/// Configuration for partitioning an image into cells.
///
/// Margins are the fraction of each axis excluded from the grid on *both* sides.
///
/// # Example
/// ```
/// use gridcrop::GridConfig;
///
/// let config = GridConfig::default();
/// assert_eq!(config.rows(), 2);
/// assert_eq!(config.cols(), 3);
/// assert_eq!(config.margin_x(), 0.1);
/// assert_eq!(config.margin_y(), 0.1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig {
    rows: u32,
    cols: u32,
    margin_x: f64,
    margin_y: f64,
}

impl GridConfig {
    /// Creates a new `GridConfig` with the specified parameters.
    ///
    /// Margins are clamped into `[0, MAX_MARGIN]`; counts below one are rejected.
    ///
    /// # Example
    /// ```
    /// use gridcrop::GridConfig;
    ///
    /// let config = GridConfig::new(1, 4, 0.7, -0.1).unwrap();
    /// assert_eq!(config.margin_x(), 0.49);
    /// assert_eq!(config.margin_y(), 0.0);
    ///
    /// assert!(GridConfig::new(0, 4, 0.1, 0.1).is_err());
    /// ```
    pub fn new(rows: u32, cols: u32, margin_x: f64, margin_y: f64) -> Result<Self, GridError> {
        check_counts(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            margin_x: clamp_margin(margin_x),
            margin_y: clamp_margin(margin_y),
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn margin_x(&self) -> f64 {
        self.margin_x
    }

    pub fn margin_y(&self) -> f64 {
        self.margin_y
    }

    /// Returns the margin for the given axis.
    pub fn margin(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.margin_x,
            Axis::Y => self.margin_y,
        }
    }

    /// Replaces the row and column counts. On error the configuration is left untouched.
    pub fn set_counts(&mut self, rows: u32, cols: u32) -> Result<(), GridError> {
        check_counts(rows, cols)?;
        debug!("Grid counts set to {}x{}", rows, cols);
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Moves a margin by `delta`, saturating at `0` and [`MAX_MARGIN`]. Returns the new margin.
    ///
    /// # Example
    /// ```
    /// use gridcrop::{Axis, GridConfig};
    ///
    /// let mut config = GridConfig::default();
    /// assert_eq!(config.adjust_margin(Axis::X, 1.0), 0.49);
    /// assert_eq!(config.adjust_margin(Axis::X, -5.0), 0.0);
    /// ```
    pub fn adjust_margin(&mut self, axis: Axis, delta: f64) -> f64 {
        let slot = match axis {
            Axis::X => &mut self.margin_x,
            Axis::Y => &mut self.margin_y,
        };
        *slot = clamp_margin(*slot + delta);
        trace!("Margin {:?} adjusted by {} to {}", axis, delta, *slot);
        *slot
    }

    /// Grows the grid along `axis` by one [`MARGIN_STEP`].
    pub fn widen(&mut self, axis: Axis) -> f64 {
        self.adjust_margin(axis, -MARGIN_STEP)
    }

    /// Shrinks the grid along `axis` by one [`MARGIN_STEP`].
    pub fn narrow(&mut self, axis: Axis) -> f64 {
        self.adjust_margin(axis, MARGIN_STEP)
    }

    /// Re-checks every invariant. Fields are private, so this only fails for
    /// configurations that arrived through deserialization.
    pub fn validate(&self) -> Result<(), GridError> {
        check_counts(self.rows, self.cols)?;
        let margin_ok = |m: f64| (0.0..=MAX_MARGIN).contains(&m);
        if !margin_ok(self.margin_x) || !margin_ok(self.margin_y) {
            error!(
                "Margins out of range: margin_x={}, margin_y={}",
                self.margin_x, self.margin_y
            );
            return Err(GridError::InvalidGridConfig {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Restores the default configuration.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            margin_x: DEFAULT_MARGIN,
            margin_y: DEFAULT_MARGIN,
        }
    }
}

fn check_counts(rows: u32, cols: u32) -> Result<(), GridError> {
    if rows < 1 || cols < 1 || rows.checked_mul(cols).is_none() {
        error!("Invalid grid counts: rows={}, cols={}", rows, cols);
        return Err(GridError::InvalidGridConfig { rows, cols });
    }
    Ok(())
}

fn clamp_margin(margin: f64) -> f64 {
    if margin.is_nan() {
        return 0.0;
    }
    margin.clamp(0.0, MAX_MARGIN)
}
