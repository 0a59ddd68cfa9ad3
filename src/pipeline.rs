//! The capture pipeline: validate, map, extract, and return crops in Position order.

use std::collections::BTreeMap;

use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;
use tracing::*;

use crate::{
    extract::{CellEncoder, CropExtractor},
    Cell, GridConfig, GridError, GridLayout, ImageDimensions, PixelRect, Position,
};

/// One extracted cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Crop {
    pub position: Position,
    pub cell: Cell,
    pub rect: PixelRect,
    /// Encoded image file contents.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Vec<u8>,
}

/// Every crop of a grid, index-aligned with Position (`crops[i].position == i + 1`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CropResult {
    crops: Vec<Crop>,
    extension: &'static str,
}

impl CropResult {
    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// File extension of the encoded crops.
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn iter(&self) -> impl Iterator<Item = &Crop> {
        self.crops.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.crops.iter().map(|crop| crop.position)
    }

    /// Looks up a crop by its 1-based position.
    pub fn get(&self, position: Position) -> Option<&Crop> {
        let index = (position as usize).checked_sub(1)?;
        self.crops.get(index)
    }

    pub fn into_vec(self) -> Vec<Crop> {
        self.crops
    }

    /// Pairs each crop with the prediction returned for its position.
    ///
    /// Predictions may arrive in any order but must cover every position exactly once.
    ///
    /// # Example
    /// ```
    /// use gridcrop::*;
    /// use image::{DynamicImage, RgbImage};
    ///
    /// let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
    /// let config = GridConfig::new(1, 2, 0.0, 0.0).unwrap();
    /// let crops = CapturePipeline::default()
    ///     .extract_all(&config, &ImageDimensions::from_image(&img), Some(&img))
    ///     .unwrap();
    ///
    /// let joined = crops.join_by_position(vec![(2, "croissant"), (1, "bagel")]).unwrap();
    /// assert_eq!(joined[0].1, "bagel");
    /// assert_eq!(joined[1].0.position, 2);
    /// ```
    pub fn join_by_position<P>(
        &self,
        predictions: impl IntoIterator<Item = (Position, P)>,
    ) -> Result<Vec<(&Crop, P)>, GridError> {
        let mut by_position = BTreeMap::new();
        for (position, prediction) in predictions {
            if self.get(position).is_none() {
                return Err(GridError::PredictionMismatch(format!(
                    "unknown position {position}"
                )));
            }
            if by_position.insert(position, prediction).is_some() {
                return Err(GridError::PredictionMismatch(format!(
                    "duplicate position {position}"
                )));
            }
        }
        if by_position.len() != self.crops.len() {
            let missing: Vec<Position> = self
                .positions()
                .filter(|p| !by_position.contains_key(p))
                .collect();
            return Err(GridError::PredictionMismatch(format!(
                "missing positions {missing:?}"
            )));
        }
        Ok(self.crops.iter().zip(by_position.into_values()).collect())
    }
}

impl<'a> IntoIterator for &'a CropResult {
    type Item = &'a Crop;
    type IntoIter = std::slice::Iter<'a, Crop>;

    fn into_iter(self) -> Self::IntoIter {
        self.crops.iter()
    }
}

/// Drives a whole extraction batch.
///
/// # Example
/// ```
/// use gridcrop::*;
///
/// let pipeline = CapturePipeline::new(CropFormat::Png).with_parallel(false);
/// let err = pipeline
///     .extract_all(&GridConfig::default(), &ImageDimensions::native(10, 10).unwrap(), None)
///     .unwrap_err();
/// assert!(matches!(err, GridError::ImageNotLoaded));
/// ```
#[derive(Debug)]
pub struct CapturePipeline {
    extractor: CropExtractor,
    /// Encode cells on the rayon pool (default: true)
    enable_parallel: bool,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self {
            extractor: CropExtractor::default(),
            enable_parallel: true,
        }
    }
}

impl CapturePipeline {
    pub fn new(encoder: impl CellEncoder + 'static) -> Self {
        Self {
            extractor: CropExtractor::new(encoder),
            enable_parallel: true,
        }
    }

    pub fn with_parallel(mut self, enable_parallel: bool) -> Self {
        self.enable_parallel = enable_parallel;
        self
    }

    /// Extracts every cell of `config` from `source`.
    ///
    /// Either every position succeeds or the whole batch fails; a partial result is never
    /// returned.
    pub fn extract_all(
        &self,
        config: &GridConfig,
        dims: &ImageDimensions,
        source: Option<&DynamicImage>,
    ) -> Result<CropResult, GridError> {
        config.validate()?;
        let source = source.ok_or_else(|| {
            error!("Extraction requested without a source image");
            GridError::ImageNotLoaded
        })?;
        let (actual_width, actual_height) = source.dimensions();
        if (actual_width, actual_height) != (dims.natural_width, dims.natural_height) {
            error!(
                "Source is {}x{}, expected {}x{}",
                actual_width, actual_height, dims.natural_width, dims.natural_height
            );
            return Err(GridError::DimensionMismatch {
                expected_width: dims.natural_width,
                expected_height: dims.natural_height,
                actual_width,
                actual_height,
            });
        }

        let layout = GridLayout::new(config, *dims)?;
        let jobs: Vec<(Position, Cell, PixelRect)> = layout
            .cells
            .iter()
            .map(|mapping| (mapping.position, mapping.cell, mapping.pixel_rect(dims)))
            .collect();
        debug!(
            "Extracting {} cells (parallel={})",
            jobs.len(),
            self.enable_parallel
        );

        let run = |&(position, cell, rect): &(Position, Cell, PixelRect)| {
            self.extractor
                .extract(source, position, rect)
                .map(|data| Crop {
                    position,
                    cell,
                    rect,
                    data,
                })
        };
        let finished: Vec<Crop> = if self.enable_parallel {
            jobs.par_iter().map(run).collect::<Result<_, _>>()?
        } else {
            jobs.iter().map(run).collect::<Result<_, _>>()?
        };

        Ok(CropResult {
            crops: Self::order_by_position(finished),
            extension: self.extractor.extension(),
        })
    }

    /// Puts finished crops back into Position order, independent of completion order.
    fn order_by_position(mut finished: Vec<Crop>) -> Vec<Crop> {
        finished.sort_unstable_by_key(|crop| crop.position);
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CropFormat;
    use image::{ImageError, Luma, RgbImage};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noise(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(image::GrayImage::from_fn(width, height, |_, _| {
            Luma([rand::random::<u8>()])
        }))
    }

    #[test]
    fn tray_scenario_returns_ordered_full_resolution_crops() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1200, 800));
        let dims = ImageDimensions::new(1200, 800, 600.0, 400.0).unwrap();
        let config = GridConfig::new(2, 2, 0.0, 0.0).unwrap();
        let result = CapturePipeline::new(CropFormat::Png)
            .extract_all(&config, &dims, Some(&img))
            .unwrap();

        assert_eq!(result.positions().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(
            result.get(4).unwrap().rect,
            PixelRect {
                x: 600,
                y: 400,
                width: 600,
                height: 400
            }
        );
        let decoded = image::load_from_memory(&result.get(1).unwrap().data).unwrap();
        assert_eq!(decoded.dimensions(), (600, 400));
        assert_eq!(result.extension(), "png");
    }

    #[test]
    fn mismatched_source_is_rejected() {
        let img = noise(30, 30);
        let dims = ImageDimensions::native(40, 30).unwrap();
        let err = CapturePipeline::default()
            .extract_all(&GridConfig::default(), &dims, Some(&img))
            .unwrap_err();
        assert!(matches!(err, GridError::DimensionMismatch { actual_width: 30, .. }));
    }

    /// Fails only on the third call, whichever cell that turns out to be.
    struct FailsOnce {
        calls: AtomicUsize,
    }

    impl CellEncoder for FailsOnce {
        fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 2 {
                return Err(ImageError::IoError(std::io::Error::other("encoder gave up")));
            }
            CropFormat::Png.encode(image)
        }

        fn extension(&self) -> &'static str {
            "png"
        }
    }

    #[test]
    fn one_failed_cell_fails_the_batch() {
        let img = noise(60, 40);
        let dims = ImageDimensions::from_image(&img);
        for parallel in [false, true] {
            let pipeline = CapturePipeline::new(FailsOnce {
                calls: AtomicUsize::new(0),
            })
            .with_parallel(parallel);
            let err = pipeline
                .extract_all(&GridConfig::default(), &dims, Some(&img))
                .unwrap_err();
            assert!(matches!(err, GridError::EncodeFailure { .. }));
        }
    }

    #[test]
    fn order_follows_positions_not_arrival() {
        let crop = |position| Crop {
            position,
            cell: Cell::from_position(position, 2),
            rect: PixelRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            data: vec![position as u8],
        };
        let ordered = CapturePipeline::order_by_position(vec![crop(3), crop(1), crop(4), crop(2)]);
        let order: Vec<u8> = ordered.iter().map(|c| c.data[0]).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn join_rejects_incomplete_or_foreign_predictions() {
        let img = noise(30, 20);
        let result = CapturePipeline::new(CropFormat::Png)
            .extract_all(
                &GridConfig::default(),
                &ImageDimensions::from_image(&img),
                Some(&img),
            )
            .unwrap();

        let missing = result.join_by_position((1..=5).map(|p| (p, p * 10)));
        assert!(matches!(missing, Err(GridError::PredictionMismatch(msg)) if msg.contains("[6]")));

        let foreign = result.join_by_position(vec![(7, ())]);
        assert!(matches!(foreign, Err(GridError::PredictionMismatch(_))));

        let duplicate = result.join_by_position(vec![(1, 'a'), (1, 'b')]);
        assert!(matches!(duplicate, Err(GridError::PredictionMismatch(_))));

        let joined = result
            .join_by_position((1..=6).rev().map(|p| (p, p * 10)))
            .unwrap();
        for (crop, prediction) in joined {
            assert_eq!(prediction, crop.position * 10);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn batch_has_one_crop_per_cell_in_order(
            rows in 1..6u32,
            cols in 1..6u32,
            margin_x in 0.0..0.49f64,
            margin_y in 0.0..0.49f64,
            width in 1..80u32,
            height in 1..80u32,
            parallel in any::<bool>(),
        ) {
            let img = noise(width, height);
            let config = GridConfig::new(rows, cols, margin_x, margin_y).unwrap();
            let result = CapturePipeline::new(CropFormat::Png)
                .with_parallel(parallel)
                .extract_all(&config, &ImageDimensions::from_image(&img), Some(&img))
                .unwrap();
            prop_assert_eq!(result.len(), (rows * cols) as usize);
            let expected: Vec<Position> = (1..=rows * cols).collect();
            prop_assert_eq!(result.positions().collect::<Vec<_>>(), expected);
            for crop in &result {
                prop_assert!(crop.rect.x + crop.rect.width <= width);
                prop_assert!(crop.rect.y + crop.rect.height <= height);
                prop_assert_eq!(crop.cell.position(cols), crop.position);
            }
        }
    }
}
