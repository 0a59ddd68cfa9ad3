use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gridcrop::{Axis, CapturePipeline, CropFormat, Session};
use tracing::*;
use tracing_subscriber::EnvFilter;

/// Split a photographed tray into a grid and save every cell as its own image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to split
    input: PathBuf,

    /// Number of grid rows
    #[arg(long, default_value_t = 2)]
    rows: u32,

    /// Number of grid columns
    #[arg(long, default_value_t = 3)]
    cols: u32,

    /// Fraction of the width excluded on each side (0 - 0.49)
    #[arg(long, default_value_t = 0.1)]
    margin_x: f64,

    /// Fraction of the height excluded on each side (0 - 0.49)
    #[arg(long, default_value_t = 0.1)]
    margin_y: f64,

    /// Width the image is displayed at; defaults to its natural width
    #[arg(long, requires = "display_height")]
    display_width: Option<f64>,

    /// Height the image is displayed at; defaults to its natural height
    #[arg(long, requires = "display_width")]
    display_height: Option<f64>,

    /// Encoding of the saved crops
    #[arg(long, value_enum, default_value_t = OutputFormat::Jpeg)]
    format: OutputFormat,

    /// JPEG quality (1 - 100)
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Directory the crops are written to
    #[arg(long, default_value = "crops")]
    output_dir: PathBuf,

    /// Also save a preview of the grid overlay to this file
    #[arg(long, value_name = "FILE")]
    overlay: Option<PathBuf>,

    /// Font used for the overlay labels
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Encode cells one after another instead of in parallel
    #[arg(long)]
    sequential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Jpeg,
    Png,
}

impl Args {
    fn crop_format(&self) -> CropFormat {
        match self.format {
            OutputFormat::Jpeg => CropFormat::Jpeg {
                quality: self.quality,
            },
            OutputFormat::Png => CropFormat::Png,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let written = run(&args)?;
    info!(
        "Wrote {} crops to {}",
        written.len(),
        args.output_dir.display()
    );
    Ok(())
}

/// Drives a session end to end and returns the crop paths in Position order.
fn run(args: &Args) -> Result<Vec<PathBuf>> {
    let img = image::open(&args.input)
        .with_context(|| format!("Failed to open image {}", args.input.display()))?;
    let display_width = args.display_width.unwrap_or(img.width() as f64);
    let display_height = args.display_height.unwrap_or(img.height() as f64);

    let mut session = Session::new();
    session
        .load_image(img, display_width, display_height)
        .context("Failed to bind image")?;
    session
        .set_counts(args.rows, args.cols)
        .context("Invalid grid size")?;
    let margin_x = session.adjust_margin(Axis::X, args.margin_x - session.config().margin_x());
    let margin_y = session.adjust_margin(Axis::Y, args.margin_y - session.config().margin_y());
    if (margin_x - args.margin_x).abs() > f64::EPSILON || (margin_y - args.margin_y).abs() > f64::EPSILON
    {
        warn!(
            "Margins clamped to x={:.2}, y={:.2}",
            margin_x, margin_y
        );
    }
    session.configure_grid()?;

    if let Some(path) = &args.overlay {
        save_overlay(args, &session, path)?;
    }

    let pipeline = CapturePipeline::new(args.crop_format()).with_parallel(!args.sequential);
    let crops = session.extract_with(&pipeline).context("Extraction failed")?;
    for crop in crops {
        debug!(
            "Position {} (row {}, col {}): {}x{} at ({}, {}), {} bytes",
            crop.position,
            crop.cell.row,
            crop.cell.col,
            crop.rect.width,
            crop.rect.height,
            crop.rect.x,
            crop.rect.y,
            crop.data.len()
        );
    }
    let written = gridcrop::debug::save_crops(crops, &args.output_dir)
        .with_context(|| format!("Failed to write crops to {}", args.output_dir.display()))?;
    Ok(written)
}

#[cfg(feature = "drawing")]
fn save_overlay(args: &Args, session: &Session, path: &std::path::Path) -> Result<()> {
    let mut drawing = gridcrop::drawing::GridDrawingConfig::default();
    if let Some(font) = &args.font {
        drawing = drawing.with_font_file(font)?;
    }
    let image = session.image().context("No image loaded")?;
    let dims = session.dims().context("No image loaded")?;
    gridcrop::debug::save_overlay_preview(image, dims, session.config(), path, &drawing)
        .context("Failed to save overlay preview")?;
    info!("Saved overlay preview to {}", path.display());
    Ok(())
}

#[cfg(not(feature = "drawing"))]
fn save_overlay(_args: &Args, _session: &Session, path: &std::path::Path) -> Result<()> {
    warn!(
        "Built without the `drawing` feature; not writing {}",
        path.display()
    );
    Ok(())
}

/// Tests for the command-line front end.
#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gridcrop-cli-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_tray(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("tray.png");
        DynamicImage::ImageRgb8(RgbImage::from_fn(1200, 800, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
        .save(&path)
        .unwrap();
        path
    }

    #[test]
    fn defaults_match_the_initial_grid() {
        let args = Args::try_parse_from(["gridcrop", "tray.jpg"]).unwrap();
        assert_eq!((args.rows, args.cols), (2, 3));
        assert_eq!((args.margin_x, args.margin_y), (0.1, 0.1));
        assert_eq!(args.crop_format(), CropFormat::Jpeg { quality: 90 });
        assert!(!args.sequential);
    }

    #[test]
    fn display_size_needs_both_axes() {
        assert!(Args::try_parse_from(["gridcrop", "tray.jpg", "--display-width", "600"]).is_err());
        let args = Args::try_parse_from([
            "gridcrop",
            "tray.jpg",
            "--display-width",
            "600",
            "--display-height",
            "400",
        ])
        .unwrap();
        assert_eq!(args.display_width, Some(600.0));
    }

    #[test_case("png", CropFormat::Png ; "png")]
    #[test_case("jpeg", CropFormat::Jpeg { quality: 75 } ; "jpeg")]
    fn parses_format(name: &str, expected: CropFormat) {
        let args =
            Args::try_parse_from(["gridcrop", "tray.jpg", "--format", name, "--quality", "75"]).unwrap();
        assert_eq!(args.crop_format(), expected);
    }

    #[test]
    fn run_writes_full_resolution_crops() {
        let dir = scratch("run");
        let input = write_tray(&dir);
        let output_dir = dir.join("out");
        let overlay = dir.join("overlay.png");
        let args = Args::try_parse_from([
            "gridcrop",
            input.to_str().unwrap(),
            "--rows",
            "2",
            "--cols",
            "2",
            "--margin-x",
            "0",
            "--margin-y",
            "0",
            "--display-width",
            "600",
            "--display-height",
            "400",
            "--format",
            "png",
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--overlay",
            overlay.to_str().unwrap(),
        ])
        .unwrap();

        let written = run(&args).unwrap();
        assert_eq!(written.len(), 4);
        for path in &written {
            assert_eq!(image::open(path).unwrap().dimensions(), (600, 400));
        }
        let last = image::open(&written[3]).unwrap().to_rgb8();
        assert_eq!(last.get_pixel(0, 0), &Rgb([(600 % 256) as u8, (400 % 256) as u8, 128]));
        #[cfg(feature = "drawing")]
        assert_eq!(
            image::open(&overlay).unwrap().dimensions(),
            (600, 400)
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn run_reports_missing_input() {
        let args = Args::try_parse_from(["gridcrop", "/nonexistent/tray.jpg"]).unwrap();
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to open image"));
    }
}
