//! Square patch geometry and the per-pixel helpers shared by the fill stages.

use image::RgbaImage;

use crate::error::{Error, Result};
use crate::mask::{neighbor_indices, BinaryMask};

/// Smallest accepted patch side.
pub const MIN_PATCH_SIZE: u32 = 3;
/// Largest accepted patch side.
pub const MAX_PATCH_SIZE: u32 = 31;

/// Side length and half-width of a square, odd-sized patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGeometry {
    size: u32,
    half: u32,
}

impl PatchGeometry {
    /// Validate a patch side length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPatchSize`] unless `size` is odd and within
    /// `3..=31`.
    pub fn new(size: u32) -> Result<Self> {
        if size % 2 == 0 || !(MIN_PATCH_SIZE..=MAX_PATCH_SIZE).contains(&size) {
            return Err(Error::InvalidPatchSize(size));
        }
        Ok(Self {
            size,
            half: size / 2,
        })
    }

    /// Patch side length.
    #[must_use]
    pub fn size(self) -> u32 {
        self.size
    }

    /// Distance from the center to the patch edge.
    #[must_use]
    pub fn half(self) -> u32 {
        self.half
    }

    /// Number of pixels covered by the patch.
    #[must_use]
    pub fn area(self) -> usize {
        self.size as usize * self.size as usize
    }

    /// Whether a patch centered at `(x, y)` lies fully inside a
    /// `width x height` image.
    #[must_use]
    pub fn fits(self, x: u32, y: u32, width: u32, height: u32) -> bool {
        x >= self.half
            && y >= self.half
            && x.saturating_add(self.half) < width
            && y.saturating_add(self.half) < height
    }

    /// Clamp a real-valued position to the nearest full-patch center.
    ///
    /// The image must be at least `size x size`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn clamp_center(self, x: f32, y: f32, width: u32, height: u32) -> (u32, u32) {
        let lo = self.half as f32;
        let hi_x = (width - self.half - 1) as f32;
        let hi_y = (height - self.half - 1) as f32;
        (
            x.floor().clamp(lo, hi_x) as u32,
            y.floor().clamp(lo, hi_y) as u32,
        )
    }

    /// Per-offset error weights in row-major patch order.
    ///
    /// With `center_weighting`, each offset gets `1 / (d + 1)` where `d` is its
    /// Euclidean distance from the center; otherwise every weight is 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn offset_weights(self, center_weighting: bool) -> Vec<f32> {
        let half = self.half as i32;
        let mut weights = Vec::with_capacity(self.area());
        for dy in -half..=half {
            for dx in -half..=half {
                if center_weighting {
                    let d = ((dx * dx + dy * dy) as f32).sqrt();
                    weights.push(1.0 / (d + 1.0));
                } else {
                    weights.push(1.0);
                }
            }
        }
        weights
    }
}

/// The neighborhood of a masked pixel, captured as the fill target.
#[derive(Debug, Clone)]
pub struct Patch {
    center: (u32, u32),
    geometry: PatchGeometry,
    pixels: Vec<[u8; 3]>,
    known: Vec<bool>,
}

impl Patch {
    /// Capture the patch centered at `(x, y)`.
    ///
    /// Returns `None` when the full patch does not fit inside the image.
    #[must_use]
    pub fn extract(
        image: &RgbaImage,
        mask: &BinaryMask,
        geometry: PatchGeometry,
        x: u32,
        y: u32,
    ) -> Option<Self> {
        if !geometry.fits(x, y, image.width(), image.height()) {
            return None;
        }
        let mut pixels = Vec::with_capacity(geometry.area());
        let mut known = Vec::with_capacity(geometry.area());
        for py in y - geometry.half..=y + geometry.half {
            for px in x - geometry.half..=x + geometry.half {
                let p = image.get_pixel(px, py).0;
                pixels.push([p[0], p[1], p[2]]);
                known.push(!mask.get(px, py));
            }
        }
        Some(Self {
            center: (x, y),
            geometry,
            pixels,
            known,
        })
    }

    /// Center coordinate of the patch.
    #[must_use]
    pub fn center(&self) -> (u32, u32) {
        self.center
    }

    /// Number of positions with ground truth.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.iter().filter(|&&k| k).count()
    }

    /// Weighted mean squared RGB error against the patch centered at
    /// `(sx, sy)`, over this patch's known positions only.
    ///
    /// Returns `None` when no position is known. The caller guarantees the
    /// source patch fits inside `image`.
    #[must_use]
    pub fn weighted_error(&self, image: &RgbaImage, sx: u32, sy: u32, weights: &[f32]) -> Option<f32> {
        let half = self.geometry.half;
        let size = self.geometry.size as usize;
        let stride = image.width() as usize * 4;
        let raw = image.as_raw();

        let mut sum = 0.0_f32;
        let mut weight_sum = 0.0_f32;
        for row in 0..size {
            let base = (sy - half) as usize + row;
            let row_start = base * stride + (sx - half) as usize * 4;
            for col in 0..size {
                let i = row * size + col;
                if !self.known[i] {
                    continue;
                }
                let s = row_start + col * 4;
                let t = self.pixels[i];
                let dr = f32::from(t[0]) - f32::from(raw[s]);
                let dg = f32::from(t[1]) - f32::from(raw[s + 1]);
                let db = f32::from(t[2]) - f32::from(raw[s + 2]);
                sum += (dr * dr + dg * dg + db * db) * weights[i];
                weight_sum += weights[i];
            }
        }

        (weight_sum > 0.0).then(|| sum / weight_sum)
    }
}

/// Whether the patch centered at `(x, y)` covers no masked pixel.
///
/// The caller guarantees the patch fits inside the mask.
#[must_use]
pub fn footprint_is_known(mask: &BinaryMask, geometry: PatchGeometry, x: u32, y: u32) -> bool {
    let bits = mask.as_slice();
    let width = mask.width() as usize;
    let size = geometry.size as usize;
    let left = (x - geometry.half) as usize;
    (y - geometry.half..=y + geometry.half).all(|py| {
        let start = py as usize * width + left;
        !bits[start..start + size].iter().any(|&b| b)
    })
}

/// Round a channel value to the nearest `u8`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Mean RGB of the known 8-neighbors of `(x, y)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn neighbor_average(image: &RgbaImage, mask: &BinaryMask, x: u32, y: u32) -> Option<[u8; 3]> {
    let raw = image.as_raw();
    let mut sum = [0.0_f32; 3];
    let mut count = 0usize;
    for idx in neighbor_indices(x, y, image.width(), image.height()) {
        if mask.is_masked_at(idx) {
            continue;
        }
        for (ch, acc) in sum.iter_mut().enumerate() {
            *acc += f32::from(raw[idx * 4 + ch]);
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f32;
    Some(sum.map(|s| round_channel(s / n)))
}

/// RGB of the closest known 8-neighbor of `(x, y)`, edge-adjacent ones first.
#[must_use]
pub fn nearest_known_neighbor(
    image: &RgbaImage,
    mask: &BinaryMask,
    x: u32,
    y: u32,
) -> Option<[u8; 3]> {
    let raw = image.as_raw();
    neighbor_indices(x, y, image.width(), image.height())
        .find(|&idx| !mask.is_masked_at(idx))
        .map(|idx| [raw[idx * 4], raw[idx * 4 + 1], raw[idx * 4 + 2]])
}

/// Write `rgb` at `(x, y)` with full opacity.
#[inline]
pub fn write_opaque(image: &mut RgbaImage, x: u32, y: u32, rgb: [u8; 3]) {
    image.put_pixel(x, y, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
}
