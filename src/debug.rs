use std::path::{Path, PathBuf};

#[cfg(feature = "drawing")]
use crate::drawing::*;
use image::DynamicImage;
use tracing::*;

use super::*;

/// Saves the displayed-size preview: the image with the grid overlay blended on top.
///
/// # Arguments
/// * `image` - The source image.
/// * `dims` - Natural and display size; the preview is written at display size.
/// * `config` - The grid to draw.
/// * `output_path` - The path to save the preview to.
/// * `drawing` - The drawing configuration.
///
/// # Errors
/// Returns [`GridError`] if rendering or saving fails.
#[cfg(feature = "drawing")]
pub fn save_overlay_preview(
    image: &DynamicImage,
    dims: &ImageDimensions,
    config: &GridConfig,
    output_path: impl AsRef<Path>,
    drawing: &GridDrawingConfig,
) -> Result<(), GridError> {
    let mut renderer = OverlayRenderer::new(drawing.clone());
    let layer = renderer.render(config, dims)?;
    let preview = composite(image, layer);
    preview
        .save(output_path.as_ref())
        .map_err(|e| GridError::ImageConversionError(e.to_string()))?;
    debug!("Saved overlay preview to {}", output_path.as_ref().display());
    Ok(())
}

/// Writes each crop to `dir/crop_<position>.<ext>` and returns the written paths in
/// Position order.
///
/// # Example
/// ```no_run
/// use gridcrop::*;
///
/// let img = image::open("tray.jpg").unwrap();
/// let crops = CapturePipeline::default()
///     .extract_all(&GridConfig::default(), &ImageDimensions::from_image(&img), Some(&img))
///     .unwrap();
/// gridcrop::debug::save_crops(&crops, "crops").unwrap();
/// ```
pub fn save_crops(result: &CropResult, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, GridError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| GridError::ImageConversionError(e.to_string()))?;
    result
        .iter()
        .map(|crop| {
            let path = dir.join(format!("crop_{}.{}", crop.position, result.extension()));
            std::fs::write(&path, &crop.data)
                .map_err(|e| GridError::ImageConversionError(e.to_string()))?;
            trace!("Wrote {}", path.display());
            Ok(path)
        })
        .collect()
}
