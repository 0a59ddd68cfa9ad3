//! This module draws the grid overlay shown over the displayed image.
//! It is feature-gated under the `drawing` feature and works purely in display space; nothing
//! drawn here influences extraction.
//!
//! # Examples
//!
//! ```rust
//! use gridcrop::{GridConfig, ImageDimensions, drawing::*};
//!
//! let dims = ImageDimensions::new(1200, 800, 600.0, 400.0).unwrap();
//! let mut renderer = OverlayRenderer::new(GridDrawingConfig::default());
//!
//! let layer = renderer.render(&GridConfig::default(), &dims).unwrap();
//! assert_eq!(layer.dimensions(), (600, 400));
//! ```

use std::{fmt, path::Path};

use ab_glyph::{FontArc, PxScale};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::*;

use crate::{CellMapping, GridConfig, GridError, GridLayout, ImageDimensions};

// Segment masks (bit 0 = top, then clockwise, bit 6 = middle) for 0-9.
const SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Configuration for drawing the overlay.
///
/// # Examples
///
/// ```
/// use gridcrop::drawing::GridDrawingConfig;
/// use image::Rgba;
///
/// let config = GridDrawingConfig {
///     line_color: Rgba([255, 0, 0, 255]), // Red outlines
///     line_thickness: 1,
///     ..GridDrawingConfig::default()
/// };
/// ```
#[derive(Clone)]
pub struct GridDrawingConfig {
    /// Colour of the cell outlines.
    pub line_color: Rgba<u8>,
    /// Thickness of the cell outlines, drawn inward.
    pub line_thickness: u32,
    /// Colour of the position labels.
    pub label_color: Rgba<u8>,
    /// Drop shadow behind labels, offset by one pixel.
    pub label_shadow: Option<Rgba<u8>>,
    /// Font for the labels; without one, digits are drawn as seven-segment glyphs.
    pub font: Option<FontArc>,
}

// Manually implement Debug for GridDrawingConfig
impl fmt::Debug for GridDrawingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridDrawingConfig")
            .field("line_color", &self.line_color)
            .field("line_thickness", &self.line_thickness)
            .field("label_color", &self.label_color)
            .field("label_shadow", &self.label_shadow)
            .field("font", &self.font.as_ref().map(|_| "<font>"))
            .finish()
    }
}

impl Default for GridDrawingConfig {
    fn default() -> Self {
        GridDrawingConfig {
            line_color: Rgba([255, 255, 255, 230]),
            line_thickness: 2,
            label_color: Rgba([255, 255, 255, 255]),
            label_shadow: Some(Rgba([0, 0, 0, 179])),
            font: None,
        }
    }
}

impl GridDrawingConfig {
    /// Loads a TrueType/OpenType font for the labels.
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, GridError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| GridError::InvalidFont(format!("{}: {e}", path.display())))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| GridError::InvalidFont(format!("{}: {e}", path.display())))?;
        self.font = Some(font);
        Ok(self)
    }
}

/// Trait for types that can be drawn on the overlay layer.
///
/// This trait is implemented for [`CellMapping`] and [`GridLayout`].
pub trait Drawable {
    /// Draws the object on the provided layer using the given configuration.
    ///
    /// # Errors
    /// Returns [`GridError`] if drawing fails.
    fn draw(&self, layer: &mut RgbaImage, config: &GridDrawingConfig) -> Result<(), GridError>;
}

impl Drawable for CellMapping {
    fn draw(&self, layer: &mut RgbaImage, config: &GridDrawingConfig) -> Result<(), GridError> {
        let rect = &self.display;
        let left = rect.x.round() as i32;
        let top = rect.y.round() as i32;
        let width = ((rect.x + rect.width).round() as i32 - left).max(1) as u32;
        let height = ((rect.y + rect.height).round() as i32 - top).max(1) as u32;

        for inset in 0..config.line_thickness {
            if width <= 2 * inset || height <= 2 * inset {
                break;
            }
            let outline = Rect::at(left + inset as i32, top + inset as i32)
                .of_size(width - 2 * inset, height - 2 * inset);
            draw_hollow_rect_mut(layer, outline, config.line_color);
        }

        let label = self.position.to_string();
        let label_height = (rect.width.min(rect.height) / 4.0).max(1.0);
        let (cx, cy) = rect.center();
        let (cx, cy) = (cx.round() as i32, cy.round() as i32);
        if let Some(shadow) = config.label_shadow {
            draw_label(layer, config, &label, label_height, cx + 1, cy + 1, shadow);
        }
        draw_label(layer, config, &label, label_height, cx, cy, config.label_color);
        Ok(())
    }
}

impl Drawable for GridLayout {
    fn draw(&self, layer: &mut RgbaImage, config: &GridDrawingConfig) -> Result<(), GridError> {
        for mapping in self.cells.iter() {
            mapping.draw(layer, config)?;
        }
        Ok(())
    }
}

/// Draws `text` centred on `(cx, cy)`.
fn draw_label(
    layer: &mut RgbaImage,
    config: &GridDrawingConfig,
    text: &str,
    label_height: f64,
    cx: i32,
    cy: i32,
    color: Rgba<u8>,
) {
    match &config.font {
        Some(font) => {
            let scale = PxScale::from(label_height as f32);
            let (w, h) = text_size(scale, font, text);
            let x = cx - (w / 2) as i32;
            let y = cy - (h / 2) as i32;
            draw_text_mut(layer, color, x, y, scale, font, text);
        }
        None => draw_segment_digits(layer, text, label_height, cx, cy, color),
    }
}

/// Fallback label renderer: digits built from filled rectangles, no font required.
fn draw_segment_digits(
    layer: &mut RgbaImage,
    text: &str,
    label_height: f64,
    cx: i32,
    cy: i32,
    color: Rgba<u8>,
) {
    let h = (label_height.round() as u32).max(5);
    let w = (h * 3 / 5).max(3);
    let s = (h / 8).max(1);
    let spacing = 2 * s;
    let digits: Vec<u8> = text
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| SEGMENTS[d as usize])
        .collect();
    if digits.is_empty() {
        return;
    }
    let total = digits.len() as u32 * w + (digits.len() as u32 - 1) * spacing;
    let mut ox = cx - (total / 2) as i32;
    let oy = cy - (h / 2) as i32;

    let upper = (h + s) / 2;
    let mid = ((h - s) / 2) as i32;
    let lower = h - (h - s) / 2;
    let right = (w - s) as i32;
    let bottom = (h - s) as i32;
    for mask in digits {
        let segments = [
            (0, 0, w, s),          // top
            (right, 0, s, upper),  // upper right
            (right, mid, s, lower), // lower right
            (0, bottom, w, s),     // bottom
            (0, mid, s, lower),    // lower left
            (0, 0, s, upper),      // upper left
            (0, mid, w, s),        // middle
        ];
        for (bit, &(dx, dy, sw, sh)) in segments.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                draw_filled_rect_mut(layer, Rect::at(ox + dx, oy + dy).of_size(sw, sh), color);
            }
        }
        ox += (w + spacing) as i32;
    }
}

/// Owns the transparent layer placed over the displayed image.
///
/// Every [`render`](OverlayRenderer::render) starts from a cleared layer, so repeated calls
/// never accumulate strokes.
#[derive(Debug)]
pub struct OverlayRenderer {
    drawing: GridDrawingConfig,
    layer: RgbaImage,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(GridDrawingConfig::default())
    }
}

impl OverlayRenderer {
    pub fn new(drawing: GridDrawingConfig) -> Self {
        Self {
            drawing,
            layer: RgbaImage::new(1, 1),
        }
    }

    /// Clears the layer, resizes it to the display size and draws every cell.
    pub fn render(
        &mut self,
        config: &GridConfig,
        dims: &ImageDimensions,
    ) -> Result<&RgbaImage, GridError> {
        let layout = GridLayout::new(config, *dims)?;
        let width = (dims.display_width.round() as u32).max(1);
        let height = (dims.display_height.round() as u32).max(1);
        if self.layer.dimensions() != (width, height) {
            self.layer = RgbaImage::from_pixel(width, height, TRANSPARENT);
        } else {
            self.layer.pixels_mut().for_each(|p| *p = TRANSPARENT);
        }
        debug!(
            "Rendering {}x{} overlay on a {}x{} layer",
            config.rows(),
            config.cols(),
            width,
            height
        );
        layout.draw(&mut self.layer, &self.drawing)?;
        Ok(&self.layer)
    }

    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }
}

/// Blends `layer` over `base` scaled to the layer's size, for previews.
pub fn composite(base: &DynamicImage, layer: &RgbaImage) -> RgbaImage {
    let (width, height) = layer.dimensions();
    let mut canvas = imageops::resize(&base.to_rgba8(), width, height, imageops::FilterType::Triangle);
    imageops::overlay(&mut canvas, layer, 0, 0);
    canvas
}
