//! Loading images and masks from disk and writing results back.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use log::debug;

use crate::control::{Phase, Status};
use crate::engine::Inpainter;
use crate::error::{Error, Result};
use crate::mask::{BinaryMask, Shape};

/// Where the mask for a file comes from.
///
/// A mask image and shapes can be combined; shapes are painted on top of the
/// decoded mask.
#[derive(Debug, Clone, Default)]
pub struct MaskSource {
    /// Mask image; any pixel with an RGB channel above 128 is masked.
    pub mask_path: Option<PathBuf>,
    /// Rectangles and ellipses to mask.
    pub shapes: Vec<Shape>,
    /// Grow each shape by 10% per side (at least 5 pixels) before painting.
    pub expand: bool,
}

impl MaskSource {
    /// Build the mask for an image of `width x height`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask image cannot be read, or
    /// [`Error::DimensionMismatch`] if its size differs from the image.
    pub fn build(&self, width: u32, height: u32) -> Result<BinaryMask> {
        let mut mask = match &self.mask_path {
            Some(path) => {
                let decoded = BinaryMask::from_image(&image::open(path)?);
                if decoded.dimensions() != (width, height) {
                    return Err(Error::DimensionMismatch {
                        image_width: width,
                        image_height: height,
                        mask_width: decoded.width(),
                        mask_height: decoded.height(),
                    });
                }
                decoded
            }
            None => BinaryMask::new(width, height),
        };
        for shape in &self.shapes {
            let shape = if self.expand {
                shape.expanded(width, height)
            } else {
                *shape
            };
            mask.paint(&shape);
        }
        Ok(mask)
    }
}

/// Result of processing a single file.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Input path.
    pub path: PathBuf,
    /// Whether processing succeeded (including skips).
    pub success: bool,
    /// Whether the file was skipped because its mask was empty.
    pub skipped: bool,
    /// Masked pixels in the file's mask.
    pub masked_pixels: usize,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            masked_pixels: 0,
            message: String::new(),
        }
    }

    fn failed(path: &Path, message: String) -> Self {
        Self {
            message,
            ..Self::new(path)
        }
    }
}

impl Inpainter {
    /// Inpaint a single image file and write the result to `output`.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, source: &MaskSource) -> ProcessResult {
        let mut result = ProcessResult::new(input);
        let control = self.control();

        let mut image = match image::open(input) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        control.report(Phase::Detect, 0);
        let mask = match source.build(image.width(), image.height()) {
            Ok(mask) => mask,
            Err(e) => {
                result.message = format!("Failed to build mask: {e}");
                return result;
            }
        };
        result.masked_pixels = mask.count_masked();
        if result.masked_pixels == 0 {
            result.skipped = true;
            result.success = true;
            result.message = "Mask is empty".to_string();
            return result;
        }

        let report = match self.run(&mut image, &mask) {
            Ok(report) => report,
            Err(e) => {
                result.message = format!("Failed to inpaint: {e}");
                return result;
            }
        };
        if report.status == Status::Cancelled {
            result.message = "Cancelled".to_string();
            return result;
        }
        debug!("{}: {report:?}", input.display());

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        match save_image(&image, output) {
            Ok(()) => {
                result.success = true;
                result.message = format!(
                    "Inpainted {} pixels ({})",
                    result.masked_pixels,
                    self.options().algorithm
                );
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Inpaint every supported image in `input_dir` into `output_dir`.
    ///
    /// Files are processed in parallel when the `parallel` feature is
    /// enabled. Every file uses the same mask source, so shape-based masks
    /// are the practical choice here.
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        source: &MaskSource,
    ) -> Vec<ProcessResult> {
        let inputs: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let process = |input: &PathBuf| match input.file_name() {
            Some(name) => self.process_file(input, &output_dir.join(name), source),
            None => ProcessResult::failed(input, "Missing file name".to_string()),
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            inputs.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            inputs.iter().map(process).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an image, choosing the encoder from the file extension.
///
/// JPEG drops alpha and is written at quality 100; PNG, WebP and BMP keep
/// the alpha channel.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_inpainted.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_inpainted.{ext}"))
}
