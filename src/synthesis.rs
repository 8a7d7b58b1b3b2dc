//! Patch-based texture synthesis.
//!
//! Masked pixels are filled one at a time in frontier order. For each pixel
//! the surrounding patch is compared against randomly sampled fully-known
//! source patches, and the best match's center color is blended in. The mask
//! shrinks as pixels are filled, so later pixels see earlier fills as context.
//!
//! Filling always finishes: pixels near the image edge use a neighbor
//! average, pixels with no valid source use the nearest known neighbor, and
//! anything left when the iteration budget runs out is filled by
//! nearest-known-pixel propagation.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use image::RgbaImage;
use log::{debug, trace, warn};
use rand::Rng;

use crate::control::{RunControl, Status};
use crate::error::Result;
use crate::frontier::Frontier;
use crate::mask::{neighbor_indices, BinaryMask};
use crate::patch::{
    footprint_is_known, nearest_known_neighbor, neighbor_average, round_channel, write_opaque,
    Patch, PatchGeometry,
};

/// Share of candidates drawn near the target pixel; the rest are uniform.
const NEAR_SAMPLE_RATIO: f32 = 0.7;

/// Blend weight of the matched source pixel relative to one known neighbor.
const SOURCE_WEIGHT: f32 = 2.0;

/// Tuning parameters for [`synthesize`].
#[derive(Debug, Clone)]
pub struct SynthesisParams {
    /// Patch side length (odd, 3..=31).
    pub patch_size: u32,
    /// Candidate source patches drawn per frontier pixel.
    pub samples: u32,
    /// Score added per pixel of distance between target and source.
    pub distance_penalty: f32,
    /// Weight patch errors by `1 / (d + 1)` from the patch center.
    pub center_weighting: bool,
    /// Lower bound of the near-sampling radius.
    pub near_radius_min: f32,
    /// Upper bound of the near-sampling radius.
    pub near_radius_max: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            patch_size: 7,
            samples: 500,
            distance_penalty: 0.1,
            center_weighting: true,
            near_radius_min: 50.0,
            near_radius_max: 100.0,
        }
    }
}

/// What a synthesis run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    /// Whether the run finished or was cancelled.
    pub status: Status,
    /// Masked pixels at the start of the run.
    pub masked: usize,
    /// Frontier pixels processed.
    pub iterations: usize,
    /// Pixels filled from a matched source patch.
    pub patch_fills: usize,
    /// Pixels too close to the edge for a full patch, filled by neighbor average.
    pub edge_fills: usize,
    /// Pixels with no valid source patch, filled from the nearest known neighbor.
    pub fallback_fills: usize,
    /// Pixels filled by the final nearest-pixel propagation.
    pub propagated_fills: usize,
    /// Pixels still masked when the run returned (zero unless cancelled).
    pub remaining: usize,
}

impl SynthesisOutcome {
    fn new(masked: usize) -> Self {
        Self {
            status: Status::Completed,
            masked,
            iterations: 0,
            patch_fills: 0,
            edge_fills: 0,
            fallback_fills: 0,
            propagated_fills: 0,
            remaining: masked,
        }
    }
}

/// Fill every masked pixel of `image` by patch-based texture synthesis.
///
/// Mutates `image` and clears `mask` as pixels are filled. On success the
/// mask is all-false; on cancellation it holds the pixels not yet filled.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch) or
/// [`Error::InvalidPatchSize`](crate::Error::InvalidPatchSize) before touching
/// either buffer.
pub fn synthesize<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    mask: &mut BinaryMask,
    params: &SynthesisParams,
    rng: &mut R,
    control: &RunControl,
) -> Result<SynthesisOutcome> {
    mask.ensure_matches(image)?;
    let geometry = PatchGeometry::new(params.patch_size)?;

    let masked = mask.count_masked();
    let mut outcome = SynthesisOutcome::new(masked);
    if masked == 0 {
        return Ok(outcome);
    }

    let (width, height) = image.dimensions();
    let budget = masked * 2;
    let weights = geometry.offset_weights(params.center_weighting);
    let mut frontier = Frontier::from_mask(mask);
    let mut remaining = masked;

    debug!(
        "synthesizing {masked} pixels ({width}x{height}, patch {}, {} samples)",
        geometry.size(),
        params.samples
    );

    while outcome.iterations < budget {
        if control.is_cancelled() {
            debug!("synthesis cancelled with {remaining} pixels left");
            outcome.status = Status::Cancelled;
            outcome.remaining = remaining;
            return Ok(outcome);
        }
        let Some(entry) = frontier.pop() else {
            break;
        };
        outcome.iterations += 1;
        let (x, y) = (entry.x, entry.y);

        let color = match Patch::extract(image, mask, geometry, x, y) {
            None => {
                outcome.edge_fills += 1;
                neighbor_average(image, mask, x, y)
            }
            Some(target) => {
                let candidates =
                    sample_candidates(geometry, x, y, width, height, remaining, params, rng);
                let best =
                    best_candidate(image, mask, &target, geometry, &weights, &candidates, params);
                match best {
                    Some((sx, sy)) => {
                        outcome.patch_fills += 1;
                        Some(blend_source(image, mask, sx, sy, x, y))
                    }
                    None => {
                        trace!("no source patch for ({x}, {y}), copying nearest neighbor");
                        outcome.fallback_fills += 1;
                        nearest_known_neighbor(image, mask, x, y)
                    }
                }
            }
        };

        match color {
            Some(rgb) => write_opaque(image, x, y, rgb),
            None => image.get_pixel_mut(x, y).0[3] = 255,
        }
        let idx = mask.index(x, y);
        mask.clear_at(idx);
        remaining -= 1;
        frontier.on_filled(mask, x, y);
        control.progress(masked - remaining, masked);
    }

    if remaining > 0 {
        if outcome.iterations >= budget {
            warn!("synthesis budget of {budget} iterations exhausted with {remaining} pixels left");
        }
        outcome.propagated_fills = propagate_nearest(image, mask);
    }
    outcome.remaining = 0;

    debug!(
        "synthesis done: {} patch, {} edge, {} fallback, {} propagated",
        outcome.patch_fills, outcome.edge_fills, outcome.fallback_fills, outcome.propagated_fills
    );
    Ok(outcome)
}

/// Draw candidate source centers around `(x, y)`.
///
/// The first 70% are biased toward the target within a radius that grows with
/// the remaining masked area; the rest are uniform over all full-patch
/// centers. The number drawn never depends on the mask, so the random stream
/// stays aligned across runs with the same seed.
#[allow(
    clippy::too_many_arguments,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sample_candidates<R: Rng + ?Sized>(
    geometry: PatchGeometry,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    remaining: usize,
    params: &SynthesisParams,
    rng: &mut R,
) -> Vec<(u32, u32)> {
    let samples = params.samples as usize;
    let near = (samples as f32 * NEAR_SAMPLE_RATIO) as usize;
    let radius = (remaining as f32).clamp(
        params.near_radius_min,
        params.near_radius_max.max(params.near_radius_min),
    );
    let half = geometry.half();

    let mut candidates = Vec::with_capacity(samples);
    for s in 0..samples {
        let candidate = if s < near {
            let angle = rng.random::<f32>() * TAU;
            let dist = rng.random::<f32>() * radius;
            geometry.clamp_center(
                x as f32 + angle.cos() * dist,
                y as f32 + angle.sin() * dist,
                width,
                height,
            )
        } else {
            (
                rng.random_range(half..=width - half - 1),
                rng.random_range(half..=height - half - 1),
            )
        };
        candidates.push(candidate);
    }
    candidates
}

/// Score every candidate and return the lowest-scoring valid one.
///
/// Ties go to the earliest candidate, so parallel and sequential scoring
/// select the same source.
fn best_candidate(
    image: &RgbaImage,
    mask: &BinaryMask,
    target: &Patch,
    geometry: PatchGeometry,
    weights: &[f32],
    candidates: &[(u32, u32)],
    params: &SynthesisParams,
) -> Option<(u32, u32)> {
    let score = |&(sx, sy): &(u32, u32)| {
        score_candidate(image, mask, target, geometry, weights, sx, sy, params.distance_penalty)
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .enumerate()
            .filter_map(|(i, c)| score(c).map(|s| (s, i)))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, i)| candidates[i])
    }

    #[cfg(not(feature = "parallel"))]
    {
        select_sequential(candidates, score)
    }
}

#[cfg_attr(all(feature = "parallel", not(test)), allow(dead_code))]
fn select_sequential(
    candidates: &[(u32, u32)],
    score: impl Fn(&(u32, u32)) -> Option<f32>,
) -> Option<(u32, u32)> {
    let mut best: Option<(f32, usize)> = None;
    for (i, c) in candidates.iter().enumerate() {
        if let Some(s) = score(c) {
            if best.is_none_or(|(b, _)| s < b) {
                best = Some((s, i));
            }
        }
    }
    best.map(|(_, i)| candidates[i])
}

#[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
fn score_candidate(
    image: &RgbaImage,
    mask: &BinaryMask,
    target: &Patch,
    geometry: PatchGeometry,
    weights: &[f32],
    sx: u32,
    sy: u32,
    distance_penalty: f32,
) -> Option<f32> {
    if !footprint_is_known(mask, geometry, sx, sy) {
        return None;
    }
    let error = target.weighted_error(image, sx, sy, weights)?;
    let (tx, ty) = target.center();
    let dx = sx as f32 - tx as f32;
    let dy = sy as f32 - ty as f32;
    Some(error + (dx * dx + dy * dy).sqrt() * distance_penalty)
}

/// Blend the source center with the known neighbors of the target.
///
/// The source counts twice as much as any single neighbor, which keeps the
/// matched texture while softening blockiness.
#[allow(clippy::cast_precision_loss)]
fn blend_source(image: &RgbaImage, mask: &BinaryMask, sx: u32, sy: u32, x: u32, y: u32) -> [u8; 3] {
    let raw = image.as_raw();
    let src = mask.index(sx, sy) * 4;
    let mut sum = [0.0_f32; 3];
    for (ch, acc) in sum.iter_mut().enumerate() {
        *acc = f32::from(raw[src + ch]) * SOURCE_WEIGHT;
    }
    let mut weight = SOURCE_WEIGHT;
    for idx in neighbor_indices(x, y, image.width(), image.height()) {
        if mask.is_masked_at(idx) {
            continue;
        }
        for (ch, acc) in sum.iter_mut().enumerate() {
            *acc += f32::from(raw[idx * 4 + ch]);
        }
        weight += 1.0;
    }
    sum.map(|s| round_channel(s / weight))
}

/// Fill every masked pixel with the color of a nearest known pixel.
///
/// Breadth-first from all known pixels bordering the mask, so each masked
/// pixel takes the color of a known pixel at minimal 8-connected distance. If
/// the image has no known pixel at all, masked pixels only become opaque.
/// Clears the mask and returns the number of pixels filled.
fn propagate_nearest(image: &mut RgbaImage, mask: &mut BinaryMask) -> usize {
    let (width, height) = image.dimensions();
    let w = width as usize;
    let mut queue = VecDeque::new();
    for idx in 0..mask.as_slice().len() {
        if mask.is_masked_at(idx) {
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((idx % w) as u32, (idx / w) as u32);
        if neighbor_indices(x, y, width, height).any(|n| mask.is_masked_at(n)) {
            queue.push_back(idx);
        }
    }

    let mut filled = 0;
    while let Some(idx) = queue.pop_front() {
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((idx % w) as u32, (idx / w) as u32);
        let p = image.get_pixel(x, y).0;
        for n in neighbor_indices(x, y, width, height) {
            if !mask.is_masked_at(n) {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let (nx, ny) = ((n % w) as u32, (n / w) as u32);
            write_opaque(image, nx, ny, [p[0], p[1], p[2]]);
            mask.clear_at(n);
            queue.push_back(n);
            filled += 1;
        }
    }

    if !mask.is_clear() {
        trace!("no known pixels to propagate from; marking masked pixels opaque");
        for idx in 0..mask.as_slice().len() {
            if mask.is_masked_at(idx) {
                #[allow(clippy::cast_possible_truncation)]
                let (x, y) = ((idx % w) as u32, (idx / w) as u32);
                image.get_pixel_mut(x, y).0[3] = 255;
                mask.clear_at(idx);
                filled += 1;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancelToken;
    use image::Rgba;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    /// Vertical stripes of period 4 with a hole punched into them.
    fn striped(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if (x / 2) % 2 == 0 {
                Rgba([220, 40, 40, 255])
            } else {
                Rgba([40, 40, 220, 255])
            }
        })
    }

    fn hole(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> BinaryMask {
        BinaryMask::from_fn(width, height, |x, y| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        })
    }

    fn punch(image: &mut RgbaImage, mask: &BinaryMask) {
        for (x, y, px) in image.enumerate_pixels_mut() {
            if mask.get(x, y) {
                *px = Rgba([0, 0, 0, 0]);
            }
        }
    }

    fn rng() -> Pcg64Mcg {
        Pcg64Mcg::seed_from_u64(7)
    }

    #[test]
    fn clears_mask_and_makes_filled_pixels_opaque() {
        let mut img = striped(40, 40);
        let original_mask = hole(40, 40, 15, 15, 6);
        punch(&mut img, &original_mask);
        let mut mask = original_mask.clone();

        let outcome = synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::default(),
        )
        .unwrap();

        assert_eq!(outcome.status, Status::Completed);
        assert!(mask.is_clear());
        assert_eq!(outcome.masked, 36);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(
            outcome.patch_fills + outcome.edge_fills + outcome.fallback_fills + outcome.propagated_fills,
            36
        );
        for (x, y, px) in img.enumerate_pixels() {
            if original_mask.get(x, y) {
                assert_eq!(px.0[3], 255, "pixel ({x},{y}) was not filled");
            }
        }
    }

    #[test]
    fn fill_stays_within_source_palette_on_flat_image() {
        let mut img = RgbaImage::from_pixel(30, 30, Rgba([10, 200, 30, 255]));
        let mut mask = hole(30, 30, 12, 12, 5);
        punch(&mut img, &mask);

        synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::default(),
        )
        .unwrap();

        assert!(img.pixels().all(|p| *p == Rgba([10, 200, 30, 255])));
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let mut a = striped(32, 32);
        let base_mask = hole(32, 32, 10, 12, 7);
        punch(&mut a, &base_mask);
        let mut b = a.clone();

        let params = SynthesisParams {
            samples: 120,
            ..SynthesisParams::default()
        };
        let mut mask_a = base_mask.clone();
        let mut mask_b = base_mask;
        synthesize(&mut a, &mut mask_a, &params, &mut rng(), &RunControl::default()).unwrap();
        synthesize(&mut b, &mut mask_b, &params, &mut rng(), &RunControl::default()).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn edge_pixels_use_neighbor_average() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([100, 100, 100, 255]));
        let mut mask = BinaryMask::new(20, 20);
        mask.set(0, 10, true);
        img.put_pixel(0, 10, Rgba([0, 0, 0, 0]));

        let outcome = synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::default(),
        )
        .unwrap();

        assert_eq!(outcome.edge_fills, 1);
        assert_eq!(*img.get_pixel(0, 10), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn huge_hole_falls_back_instead_of_stalling() {
        // Almost everything is masked, so no fully-known 5x5 source exists.
        let mut img = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
        img.put_pixel(8, 8, Rgba([50, 60, 70, 255]));
        let mut mask = BinaryMask::from_fn(16, 16, |x, y| (x, y) != (8, 8));

        let params = SynthesisParams {
            patch_size: 5,
            samples: 50,
            ..SynthesisParams::default()
        };
        let outcome =
            synthesize(&mut img, &mut mask, &params, &mut rng(), &RunControl::default()).unwrap();

        assert!(mask.is_clear());
        assert!(outcome.fallback_fills > 0);
        assert!(img.pixels().all(|p| *p == Rgba([50, 60, 70, 255])));
    }

    #[test]
    fn fully_masked_image_becomes_opaque() {
        let mut img = RgbaImage::from_pixel(6, 6, Rgba([9, 8, 7, 0]));
        let mut mask = BinaryMask::from_fn(6, 6, |_, _| true);
        let outcome = synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::default(),
        )
        .unwrap();
        assert!(mask.is_clear());
        assert_eq!(outcome.propagated_fills, 36);
        assert!(img.pixels().all(|p| *p == Rgba([9, 8, 7, 255])));
    }

    #[test]
    fn cancellation_leaves_partial_mask() {
        let mut img = striped(24, 24);
        let mut mask = hole(24, 24, 8, 8, 6);
        let token = CancelToken::new();
        token.cancel();

        let outcome = synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::with_cancel(token),
        )
        .unwrap();

        assert_eq!(outcome.status, Status::Cancelled);
        assert_eq!(outcome.remaining, 36);
        assert_eq!(mask.count_masked(), 36);
    }

    #[test]
    fn rejects_mismatched_mask_without_mutation() {
        let mut img = striped(10, 10);
        let before = img.clone();
        let mut mask = BinaryMask::from_fn(5, 5, |_, _| true);
        let result = synthesize(
            &mut img,
            &mut mask,
            &SynthesisParams::default(),
            &mut rng(),
            &RunControl::default(),
        );
        assert!(matches!(result, Err(crate::Error::DimensionMismatch { .. })));
        assert_eq!(img, before);
    }

    #[test]
    fn sequential_selection_prefers_lowest_then_earliest() {
        let candidates = [(1, 1), (2, 2), (3, 3), (4, 4)];
        let scores = [Some(5.0), None, Some(1.0), Some(1.0)];
        let best = select_sequential(&candidates, |c| scores[(c.0 - 1) as usize]);
        assert_eq!(best, Some((3, 3)));
        assert_eq!(select_sequential(&candidates, |_| None), None);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_selection_matches_sequential() {
        let img = striped(40, 40);
        let mut mask = hole(40, 40, 18, 18, 4);
        let geometry = PatchGeometry::new(5).unwrap();
        let weights = geometry.offset_weights(true);
        let params = SynthesisParams::default();
        mask.set(30, 30, true);
        let target = Patch::extract(&img, &mask, geometry, 18, 18).unwrap();
        let candidates =
            sample_candidates(geometry, 18, 18, 40, 40, 16, &params, &mut rng());

        let parallel = best_candidate(&img, &mask, &target, geometry, &weights, &candidates, &params);
        let sequential = select_sequential(&candidates, |&(sx, sy)| {
            score_candidate(&img, &mask, &target, geometry, &weights, sx, sy, params.distance_penalty)
        });
        assert!(parallel.is_some());
        assert_eq!(parallel, sequential);
    }
}
