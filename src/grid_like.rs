use crate::grid::{Cell, GridConfig};

/// A trait for types laid out as `row_count × column_count` cells.
pub trait GridLike {
    /// Returns the number of rows.
    fn row_count(&self) -> u32;

    /// Returns the number of columns.
    fn column_count(&self) -> u32;

    /// Returns the number of cells.
    fn cell_count(&self) -> usize {
        self.row_count() as usize * self.column_count() as usize
    }

    /// Returns an iterator over every cell in row-major order, i.e. in Position order.
    ///
    /// # Example
    /// ```
    /// use gridcrop::{Cell, GridConfig, GridLike};
    ///
    /// let config = GridConfig::new(2, 2, 0.0, 0.0).unwrap();
    /// let cells: Vec<Cell> = config.cells().collect();
    /// assert_eq!(cells, vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 0), Cell::new(1, 1)]);
    /// ```
    fn cells(&self) -> impl Iterator<Item = Cell> {
        let cols = self.column_count();
        (0..self.row_count()).flat_map(move |row| (0..cols).map(move |col| Cell::new(row, col)))
    }
}

impl GridLike for GridConfig {
    fn row_count(&self) -> u32 {
        self.rows()
    }

    fn column_count(&self) -> u32 {
        self.cols()
    }
}
