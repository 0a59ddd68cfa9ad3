//! The capture session: one controller owning the bound image, the grid configuration and
//! the last extraction result, driven by named intents.
//!
//! ```text
//! Idle ─load_image─► ImageLoaded ─configure_grid─► GridConfigured ─begin_extraction─► Extracting
//!                                                        ▲                                 │
//!                                      config change ────┘◄──── failure ───────────────────┤
//!                                                                                           ▼
//!                                                                                       Extracted
//! ```
//! Any state returns to `Idle` on [`Session::reset`]; loading a new image always lands in
//! `ImageLoaded` with a default configuration.
//!
//! Every change of image or configuration bumps the session token. Results of a batch that
//! was started under an older token are dropped instead of being applied.

use std::sync::Arc;

use image::DynamicImage;
use tracing::*;

use crate::{
    Axis, CapturePipeline, CropResult, GridConfig, GridError, ImageDimensions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SessionState {
    Idle,
    ImageLoaded,
    GridConfigured,
    Extracting,
    Extracted,
}

/// What happened to a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was current; its crops are now the session's result.
    Applied,
    /// The image or configuration changed while the batch ran; its result was discarded.
    Stale,
}

/// Everything one extraction needs, detached from the session so it can run elsewhere.
#[derive(Debug, Clone)]
pub struct ExtractionBatch {
    token: u64,
    pub config: GridConfig,
    pub dims: ImageDimensions,
    pub source: Arc<DynamicImage>,
}

impl ExtractionBatch {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn run(&self, pipeline: &CapturePipeline) -> Result<CropResult, GridError> {
        pipeline.extract_all(&self.config, &self.dims, Some(&self.source))
    }
}

/// # Example
/// ```
/// use gridcrop::*;
/// use image::{DynamicImage, RgbImage};
///
/// let mut session = Session::new();
/// session
///     .load_image(DynamicImage::ImageRgb8(RgbImage::new(1200, 800)), 600.0, 400.0)
///     .unwrap();
/// session.set_counts(2, 2).unwrap();
///
/// let batch = session.begin_extraction().unwrap();
/// let result = batch.run(&CapturePipeline::default());
/// assert_eq!(session.complete_extraction(batch.token(), result).unwrap(), BatchOutcome::Applied);
/// assert_eq!(session.crops().unwrap().len(), 4);
/// ```
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    config: GridConfig,
    image: Option<Arc<DynamicImage>>,
    dims: Option<ImageDimensions>,
    crops: Option<CropResult>,
    token: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            config: GridConfig::default(),
            image: None,
            dims: None,
            crops: None,
            token: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn dims(&self) -> Option<&ImageDimensions> {
        self.dims.as_ref()
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_deref()
    }

    pub fn crops(&self) -> Option<&CropResult> {
        self.crops.as_ref()
    }

    /// Current token; strictly increases over the life of the session.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Binds a new image shown at `display_width × display_height`.
    ///
    /// Resets the configuration to its default and discards any previous crops. On error the
    /// session is left as it was.
    pub fn load_image(
        &mut self,
        image: DynamicImage,
        display_width: f64,
        display_height: f64,
    ) -> Result<(), GridError> {
        let dims = ImageDimensions::new(
            image.width(),
            image.height(),
            display_width,
            display_height,
        )?;
        info!(
            "Loaded {}x{} image displayed at {}x{}",
            dims.natural_width, dims.natural_height, display_width, display_height
        );
        self.image = Some(Arc::new(image));
        self.dims = Some(dims);
        self.config.reset();
        self.invalidate(SessionState::ImageLoaded);
        Ok(())
    }

    /// Records a new on-screen size. Crop rectangles are relative, so this does not
    /// invalidate a running batch.
    pub fn resize_display(&mut self, display_width: f64, display_height: f64) -> Result<(), GridError> {
        let dims = self.dims.ok_or(GridError::ImageNotLoaded)?;
        self.dims = Some(dims.with_display(display_width, display_height)?);
        debug!("Display resized to {}x{}", display_width, display_height);
        Ok(())
    }

    /// Shows the grid for the bound image.
    pub fn configure_grid(&mut self) -> Result<(), GridError> {
        match self.state {
            SessionState::Idle => Err(GridError::ImageNotLoaded),
            SessionState::Extracting => Err(self.refuse("configure the grid")),
            _ => {
                self.transition(SessionState::GridConfigured);
                Ok(())
            }
        }
    }

    pub fn set_counts(&mut self, rows: u32, cols: u32) -> Result<(), GridError> {
        if self.state == SessionState::Idle {
            return Err(self.refuse("set grid counts"));
        }
        self.config.set_counts(rows, cols)?;
        self.invalidate(SessionState::GridConfigured);
        Ok(())
    }

    /// Nudges a margin; never fails. Without a bound image only the stored value moves.
    pub fn adjust_margin(&mut self, axis: Axis, delta: f64) -> f64 {
        let margin = self.config.adjust_margin(axis, delta);
        if self.state != SessionState::Idle {
            self.invalidate(SessionState::GridConfigured);
        }
        margin
    }

    pub fn widen(&mut self, axis: Axis) -> f64 {
        self.adjust_margin(axis, -crate::MARGIN_STEP)
    }

    pub fn narrow(&mut self, axis: Axis) -> f64 {
        self.adjust_margin(axis, crate::MARGIN_STEP)
    }

    /// Starts a batch under a fresh token.
    pub fn begin_extraction(&mut self) -> Result<ExtractionBatch, GridError> {
        let (source, dims) = match (&self.image, self.dims) {
            (Some(source), Some(dims)) => (Arc::clone(source), dims),
            _ => {
                error!("Extraction requested without a loaded image");
                return Err(GridError::ImageNotLoaded);
            }
        };
        if !matches!(
            self.state,
            SessionState::GridConfigured | SessionState::Extracted
        ) {
            return Err(self.refuse("start an extraction"));
        }
        self.config.validate()?;
        self.token += 1;
        self.transition(SessionState::Extracting);
        Ok(ExtractionBatch {
            token: self.token,
            config: self.config.clone(),
            dims,
            source,
        })
    }

    /// Applies a finished batch if it is still current.
    ///
    /// A stale batch is dropped, errors included, and the session is untouched. A current
    /// failure sends the session back to `GridConfigured` and is returned to the caller.
    pub fn complete_extraction(
        &mut self,
        token: u64,
        result: Result<CropResult, GridError>,
    ) -> Result<BatchOutcome, GridError> {
        if token != self.token || self.state != SessionState::Extracting {
            warn!(
                "Dropping stale batch {} (current token {}, state {:?})",
                token, self.token, self.state
            );
            return Ok(BatchOutcome::Stale);
        }
        match result {
            Ok(crops) => {
                info!("Batch {} produced {} crops", token, crops.len());
                self.crops = Some(crops);
                self.transition(SessionState::Extracted);
                Ok(BatchOutcome::Applied)
            }
            Err(e) => {
                error!("Batch {} failed: {}", token, e);
                self.transition(SessionState::GridConfigured);
                Err(e)
            }
        }
    }

    /// Runs a batch to completion on the calling thread.
    pub fn extract_with(&mut self, pipeline: &CapturePipeline) -> Result<&CropResult, GridError> {
        let batch = self.begin_extraction()?;
        let result = batch.run(pipeline);
        self.complete_extraction(batch.token(), result)?;
        self.crops.as_ref().ok_or(GridError::ImageNotLoaded)
    }

    /// Drops the image, the configuration and any result.
    pub fn reset(&mut self) {
        self.image = None;
        self.dims = None;
        self.config.reset();
        self.invalidate(SessionState::Idle);
    }

    fn invalidate(&mut self, next: SessionState) {
        self.token += 1;
        self.crops = None;
        self.transition(next);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn refuse(&self, intent: &'static str) -> GridError {
        error!("Cannot {} while {:?}", intent, self.state);
        GridError::InvalidTransition {
            state: self.state,
            intent,
        }
    }
}
