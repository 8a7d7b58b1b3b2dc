//! Binary occupancy masks and the shapes used to build them.
//!
//! A [`BinaryMask`] marks every pixel whose content is unknown (`true`) and
//! must be synthesized. Masks are plain owned buffers; the engine borrows them
//! for the duration of a call and never keeps them.

use std::str::FromStr;

use image::{DynamicImage, RgbaImage};

use crate::error::{Error, Result};

/// Channel value above which a mask image pixel counts as masked.
const MASK_IMAGE_THRESHOLD: u8 = 128;

/// Fraction of a region's size added on each side by [`Region::expanded`].
const REGION_EXPAND_RATIO: f32 = 0.1;

/// Minimum number of pixels added on each side by [`Region::expanded`].
const REGION_EXPAND_MIN: u32 = 5;

/// Offsets of the 8-connected neighborhood, 4-neighbors first.
pub(crate) const NEIGHBORS_8: [(i32, i32); 8] = [
    (0, -1),
    (-1, 0),
    (1, 0),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Iterate the in-bounds 8-neighbors of `(x, y)` as flat indices.
pub(crate) fn neighbor_indices(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> impl Iterator<Item = usize> {
    NEIGHBORS_8.iter().filter_map(move |&(dx, dy)| {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < width && ny < height).then(|| ny as usize * width as usize + nx as usize)
    })
}

/// A `width x height` grid of booleans, `true` meaning "unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BinaryMask {
    /// Create an all-false (nothing masked) mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Create a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    /// Wrap a row-major vector of mask bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskDecode`] if `bits.len() != width * height`.
    pub fn from_vec(width: u32, height: u32, bits: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if bits.len() != expected {
            return Err(Error::MaskDecode(format!(
                "expected {expected} mask bits for {width}x{height}, got {}",
                bits.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bits,
        })
    }

    /// Build a mask from a painted mask image.
    ///
    /// A pixel is masked when any of its R, G, B channels exceeds 128, so
    /// white strokes on a black (or transparent) background select the
    /// region to repair. Grayscale images are expanded to RGB first.
    #[must_use]
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let bits = rgba
            .pixels()
            .map(|px| px.0[..3].iter().any(|&c| c > MASK_IMAGE_THRESHOLD))
            .collect();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            bits,
        }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` of the mask.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fail unless the mask has the same dimensions as `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the sizes differ.
    pub fn ensure_matches(&self, image: &RgbaImage) -> Result<()> {
        let (image_width, image_height) = image.dimensions();
        if (image_width, image_height) != self.dimensions() {
            return Err(Error::DimensionMismatch {
                image_width,
                image_height,
                mask_width: self.width,
                mask_height: self.height,
            });
        }
        Ok(())
    }

    /// Row-major mask bits.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// Whether the pixel at `(x, y)` is masked. Out-of-bounds reads are `false`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    /// Set the mask bit at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, masked: bool) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.bits[idx] = masked;
        }
    }

    /// Number of masked pixels.
    #[must_use]
    pub fn count_masked(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// True when no pixel is masked.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Number of unmasked pixels among the in-bounds 8-neighbors of `(x, y)`.
    #[must_use]
    pub fn known_neighbors(&self, x: u32, y: u32) -> u8 {
        let mut count = 0;
        for idx in neighbor_indices(x, y, self.width, self.height) {
            if !self.bits[idx] {
                count += 1;
            }
        }
        count
    }

    /// Mark every pixel covered by `shape`, clipped to the mask bounds.
    pub fn paint(&mut self, shape: &Shape) {
        match *shape {
            Shape::Rect(region) => self.paint_rect(region),
            Shape::Ellipse(region) => self.paint_ellipse(region),
        }
    }

    fn paint_rect(&mut self, region: Region) {
        let x2 = region.x.saturating_add(region.width).min(self.width);
        let y2 = region.y.saturating_add(region.height).min(self.height);
        for y in region.y..y2 {
            for x in region.x..x2 {
                let idx = self.index(x, y);
                self.bits[idx] = true;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn paint_ellipse(&mut self, region: Region) {
        if region.width == 0 || region.height == 0 {
            return;
        }
        let rx = region.width as f32 / 2.0;
        let ry = region.height as f32 / 2.0;
        let cx = region.x as f32 + rx;
        let cy = region.y as f32 + ry;

        let x2 = region.x.saturating_add(region.width).min(self.width);
        let y2 = region.y.saturating_add(region.height).min(self.height);
        for y in region.y..y2 {
            for x in region.x..x2 {
                // Sample at the pixel center.
                let nx = (x as f32 + 0.5 - cx) / rx;
                let ny = (y as f32 + 0.5 - cy) / ry;
                if nx * nx + ny * ny <= 1.0 {
                    let idx = self.index(x, y);
                    self.bits[idx] = true;
                }
            }
        }
    }

    #[inline]
    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub(crate) fn is_masked_at(&self, idx: usize) -> bool {
        self.bits[idx]
    }

    #[inline]
    pub(crate) fn clear_at(&mut self, idx: usize) {
        self.bits[idx] = false;
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Grow the region by 10% of its size on each side (at least 5 pixels),
    /// clipped to an image of `img_w x img_h`.
    ///
    /// Hand-drawn rectangles tend to miss the soft outer edge of an overlay;
    /// expanding them pulls that edge into the mask.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn expanded(self, img_w: u32, img_h: u32) -> Self {
        let grow_x = ((self.width as f32 * REGION_EXPAND_RATIO).round() as u32).max(REGION_EXPAND_MIN);
        let grow_y =
            ((self.height as f32 * REGION_EXPAND_RATIO).round() as u32).max(REGION_EXPAND_MIN);

        let x = self.x.saturating_sub(grow_x);
        let y = self.y.saturating_sub(grow_y);
        let x2 = self.x.saturating_add(self.width).saturating_add(grow_x).min(img_w);
        let y2 = self.y.saturating_add(self.height).saturating_add(grow_y).min(img_h);

        Self {
            x,
            y,
            width: x2.saturating_sub(x),
            height: y2.saturating_sub(y),
        }
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Parse `"x,y,w,h"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(Error::MaskDecode(format!(
                "expected x,y,width,height but got {s:?}"
            )));
        };
        let parse = |v: &str| {
            v.parse::<u32>()
                .map_err(|e| Error::MaskDecode(format!("invalid number {v:?} in {s:?}: {e}")))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

/// A shape that can be painted into a [`BinaryMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Filled rectangle.
    Rect(Region),
    /// Filled ellipse inscribed in the region.
    Ellipse(Region),
}

impl Shape {
    /// The same shape with its bounding region expanded; see [`Region::expanded`].
    #[must_use]
    pub fn expanded(self, img_w: u32, img_h: u32) -> Self {
        match self {
            Self::Rect(r) => Self::Rect(r.expanded(img_w, img_h)),
            Self::Ellipse(r) => Self::Ellipse(r.expanded(img_w, img_h)),
        }
    }
}
