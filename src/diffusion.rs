//! Iterative diffusion smoothing of masked pixels.
//!
//! Each pass replaces the RGB of every masked pixel with the mean of its 8
//! neighbors as they were at the start of the pass. Reads come from a snapshot
//! taken before the pass, so the result does not depend on scan direction.
//!
//! The outermost rows and columns are never relaxed; they have no full
//! neighborhood. Masked pixels there keep their content.

use image::RgbaImage;
use log::debug;

use crate::control::{RunControl, Status};
use crate::error::Result;
use crate::mask::BinaryMask;
use crate::patch::round_channel;

/// What a smoothing run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingOutcome {
    /// Whether every pass ran.
    pub status: Status,
    /// Passes completed.
    pub passes: u32,
}

/// Relax masked pixels toward their neighborhood mean for `passes` sweeps.
///
/// `mask` is read only. Alpha of every relaxed pixel is set to 255 on every
/// pass.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
/// before touching the image.
pub fn smooth(
    image: &mut RgbaImage,
    mask: &BinaryMask,
    passes: u32,
    control: &RunControl,
) -> Result<SmoothingOutcome> {
    mask.ensure_matches(image)?;

    let mut outcome = SmoothingOutcome {
        status: Status::Completed,
        passes: 0,
    };
    let (width, height) = image.dimensions();
    if passes == 0 || width < 3 || height < 3 || mask.is_clear() {
        return Ok(outcome);
    }

    let interior = interior_indices(mask);
    if interior.is_empty() {
        return Ok(outcome);
    }
    debug!(
        "smoothing {} pixels for {passes} passes ({} masked on the border left as is)",
        interior.len(),
        mask.count_masked() - interior.len()
    );

    let stride = width as usize * 4;
    let mut previous = vec![0_u8; image.as_raw().len()];
    for pass in 0..passes {
        if control.is_cancelled() {
            debug!("smoothing cancelled after {pass} passes");
            outcome.status = Status::Cancelled;
            return Ok(outcome);
        }
        previous.copy_from_slice(image.as_raw());
        relax(image, &previous, &interior, stride);
        outcome.passes = pass + 1;
        control.progress((pass + 1) as usize, passes as usize);
    }
    Ok(outcome)
}

/// Flat indices of masked pixels at least one pixel inside the border.
fn interior_indices(mask: &BinaryMask) -> Vec<usize> {
    let (width, height) = mask.dimensions();
    let mut indices = Vec::new();
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            if mask.get(x, y) {
                indices.push(mask.index(x, y));
            }
        }
    }
    indices
}

/// One double-buffered relaxation sweep.
fn relax(image: &mut RgbaImage, previous: &[u8], interior: &[usize], stride: usize) {
    let out: &mut [u8] = image;
    for &idx in interior {
        let center = idx * 4;
        let above = center - stride;
        let below = center + stride;
        for ch in 0..3 {
            let sum = u32::from(previous[above - 4 + ch])
                + u32::from(previous[above + ch])
                + u32::from(previous[above + 4 + ch])
                + u32::from(previous[center - 4 + ch])
                + u32::from(previous[center + 4 + ch])
                + u32::from(previous[below - 4 + ch])
                + u32::from(previous[below + ch])
                + u32::from(previous[below + 4 + ch]);
            #[allow(clippy::cast_precision_loss)]
            let mean = sum as f32 / 8.0;
            out[center + ch] = round_channel(mean);
        }
        out[center + 3] = 255;
    }
}
