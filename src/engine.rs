//! Algorithm selection and the single entry point tying the stages together.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use log::debug;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::control::{CancelToken, EngineState, Phase, ProgressSink, RunControl, Status};
use crate::diffusion::{self, SmoothingOutcome};
use crate::error::Result;
use crate::hybrid;
use crate::mask::BinaryMask;
use crate::patch::PatchGeometry;
use crate::synthesis::{self, SynthesisOutcome, SynthesisParams};

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x5EED_1A7C_4D2B_9F01;

/// Inpainting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Algorithm {
    /// Patch-based texture synthesis. Keeps detail, may leave seams.
    Texture,
    /// Neighbor-average relaxation. Smooth, blurs texture.
    Diffusion,
    /// Texture synthesis, then diffusion over the original mask.
    #[default]
    Hybrid,
}

impl Algorithm {
    /// Whether the algorithm runs the patch matcher.
    #[must_use]
    pub fn uses_patches(self) -> bool {
        matches!(self, Self::Texture | Self::Hybrid)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Texture => "texture",
            Self::Diffusion => "diffusion",
            Self::Hybrid => "hybrid",
        })
    }
}

/// Options controlling an inpainting run.
#[derive(Debug, Clone)]
pub struct InpaintOptions {
    /// Which algorithm to run.
    pub algorithm: Algorithm,
    /// Patch side length for texture synthesis (odd, 3..=31).
    pub patch_size: u32,
    /// Diffusion passes (Diffusion and Hybrid).
    pub passes: u32,
    /// Candidate source patches drawn per pixel.
    pub samples: u32,
    /// Score penalty per pixel of distance to the source patch.
    pub distance_penalty: f32,
    /// Weight patch errors toward the patch center.
    pub center_weighting: bool,
    /// Seed for candidate sampling.
    pub seed: u64,
}

impl Default for InpaintOptions {
    fn default() -> Self {
        let synthesis = SynthesisParams::default();
        Self {
            algorithm: Algorithm::default(),
            patch_size: synthesis.patch_size,
            passes: 10,
            samples: synthesis.samples,
            distance_penalty: synthesis.distance_penalty,
            center_weighting: synthesis.center_weighting,
            seed: DEFAULT_SEED,
        }
    }
}

impl InpaintOptions {
    /// Options for `algorithm` with the given patch size and pass count.
    #[must_use]
    pub fn new(algorithm: Algorithm, patch_size: u32, passes: u32) -> Self {
        Self {
            algorithm,
            patch_size,
            passes,
            ..Self::default()
        }
    }

    fn synthesis_params(&self) -> SynthesisParams {
        SynthesisParams {
            patch_size: self.patch_size,
            samples: self.samples,
            distance_penalty: self.distance_penalty,
            center_weighting: self.center_weighting,
            ..SynthesisParams::default()
        }
    }
}

/// Summary of a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpaintReport {
    /// Completed or cancelled.
    pub status: Status,
    /// Terminal engine state.
    pub state: EngineState,
    /// Masked pixels in the input mask.
    pub masked_pixels: usize,
    /// Texture synthesis report, if that stage ran.
    pub synthesis: Option<SynthesisOutcome>,
    /// Diffusion report, if that stage ran.
    pub smoothing: Option<SmoothingOutcome>,
}

impl InpaintReport {
    fn empty(status: Status, masked_pixels: usize) -> Self {
        Self {
            status,
            state: status.into(),
            masked_pixels,
            synthesis: None,
            smoothing: None,
        }
    }
}

/// Configured inpainting engine.
///
/// Holds only options and the cancellation/progress hooks, so one value can
/// serve any number of images, including concurrently from several threads.
#[derive(Clone, Default)]
pub struct Inpainter {
    options: InpaintOptions,
    cancel: CancelToken,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for Inpainter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inpainter")
            .field("options", &self.options)
            .field("cancel", &self.cancel)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Inpainter {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: InpaintOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
            sink: None,
        }
    }

    /// Use `token` for cooperative cancellation.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Send progress reports to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// The configured options.
    #[must_use]
    pub fn options(&self) -> &InpaintOptions {
        &self.options
    }

    /// The cancellation token checked by this engine.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn control(&self) -> RunControl {
        RunControl::new(self.cancel.clone(), self.sink.clone())
    }

    /// Validate input without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch) or
    /// [`Error::InvalidPatchSize`](crate::Error::InvalidPatchSize).
    pub fn validate(&self, image: &RgbaImage, mask: &BinaryMask) -> Result<()> {
        mask.ensure_matches(image)?;
        if self.options.algorithm.uses_patches() {
            PatchGeometry::new(self.options.patch_size)?;
        }
        Ok(())
    }

    /// Inpaint `image` in place wherever `mask` is set.
    ///
    /// An all-false mask is a successful no-op. On cancellation the image
    /// holds a valid partial fill and the report's status is
    /// [`Status::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch) or
    /// [`Error::InvalidPatchSize`](crate::Error::InvalidPatchSize) before the
    /// image is modified.
    pub fn run(&self, image: &mut RgbaImage, mask: &BinaryMask) -> Result<InpaintReport> {
        let control = self.control();
        control.report(Phase::Analyze, 0);

        if let Err(e) = self.validate(image, mask) {
            debug!("rejected input: {e}");
            control.enter(EngineState::Failed);
            return Err(e);
        }

        let masked_pixels = mask.count_masked();
        if masked_pixels == 0 {
            control.enter(EngineState::Completed);
            control.report(Phase::Finalize, 100);
            return Ok(InpaintReport::empty(Status::Completed, 0));
        }
        debug!(
            "inpainting {masked_pixels} pixels with {} (patch {}, passes {})",
            self.options.algorithm, self.options.patch_size, self.options.passes
        );

        let params = self.options.synthesis_params();
        let mut rng = Pcg64Mcg::seed_from_u64(self.options.seed);
        let mut report = InpaintReport::empty(Status::Completed, masked_pixels);

        match self.options.algorithm {
            Algorithm::Texture => {
                control.enter(EngineState::Synthesizing);
                let mut working = mask.clone();
                let outcome =
                    synthesis::synthesize(image, &mut working, &params, &mut rng, &control)?;
                report.status = outcome.status;
                report.synthesis = Some(outcome);
            }
            Algorithm::Diffusion => {
                control.enter(EngineState::Smoothing);
                let outcome = diffusion::smooth(image, mask, self.options.passes, &control)?;
                report.status = outcome.status;
                report.smoothing = Some(outcome);
            }
            Algorithm::Hybrid => {
                // The orchestrator announces smoothing itself when it starts.
                control.enter(EngineState::Synthesizing);
                let outcome = hybrid::hybrid_fill(
                    image,
                    mask,
                    &params,
                    self.options.passes,
                    &mut rng,
                    &control,
                )?;
                report.status = outcome.status;
                report.synthesis = Some(outcome.synthesis);
                report.smoothing = outcome.smoothing;
            }
        }

        report.state = report.status.into();
        control.enter(report.state);
        if report.status == Status::Completed {
            control.report(Phase::Finalize, 100);
        }
        Ok(report)
    }
}

/// Inpaint `image` with default tuning and return the repaired image.
///
/// The buffer is repaired in place and handed back; dimensions never change.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch) if
/// the mask size differs from the image size, or
/// [`Error::InvalidPatchSize`](crate::Error::InvalidPatchSize) for an unusable
/// patch size.
pub fn inpaint(
    mut image: RgbaImage,
    mask: &BinaryMask,
    algorithm: Algorithm,
    patch_size: u32,
    passes: u32,
) -> Result<RgbaImage> {
    Inpainter::new(InpaintOptions::new(algorithm, patch_size, passes)).run(&mut image, mask)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use image::Rgba;
    use std::sync::Mutex;

    fn noisy(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 37 + y * 91) % 251) as u8;
            Rgba([v, v.wrapping_mul(3), 255 - v, 255])
        })
    }

    #[test]
    fn algorithm_defaults_and_displays() {
        assert_eq!(Algorithm::default(), Algorithm::Hybrid);
        assert_eq!(Algorithm::Texture.to_string(), "texture");
        assert!(Algorithm::Hybrid.uses_patches());
        assert!(!Algorithm::Diffusion.uses_patches());
    }

    #[test]
    fn empty_mask_is_noop_for_every_algorithm() {
        for algo in [Algorithm::Texture, Algorithm::Diffusion, Algorithm::Hybrid] {
            let img = noisy(24, 24);
            let out = inpaint(img.clone(), &BinaryMask::new(24, 24), algo, 7, 5).unwrap();
            assert_eq!(out, img, "{algo} changed an image with an empty mask");
        }
    }

    #[test]
    fn invalid_patch_size_fails_before_mutation() {
        let mut img = noisy(16, 16);
        let before = img.clone();
        let mask = BinaryMask::from_fn(16, 16, |x, y| x == 8 && y == 8);
        let engine = Inpainter::new(InpaintOptions::new(Algorithm::Texture, 6, 0));
        assert!(matches!(
            engine.run(&mut img, &mask),
            Err(Error::InvalidPatchSize(6))
        ));
        assert_eq!(img, before);

        // Diffusion ignores the patch size.
        let engine = Inpainter::new(InpaintOptions::new(Algorithm::Diffusion, 6, 1));
        assert!(engine.run(&mut img, &mask).is_ok());
    }

    #[test]
    fn report_tracks_stages_and_final_state() {
        let mut img = noisy(32, 32);
        let mask = BinaryMask::from_fn(32, 32, |x, y| (12..16).contains(&x) && (12..16).contains(&y));
        let options = InpaintOptions {
            samples: 80,
            ..InpaintOptions::new(Algorithm::Hybrid, 5, 3)
        };
        let report = Inpainter::new(options).run(&mut img, &mask).unwrap();

        assert_eq!(report.status, Status::Completed);
        assert_eq!(report.state, EngineState::Completed);
        assert_eq!(report.masked_pixels, 16);
        assert_eq!(report.synthesis.as_ref().map(|s| s.remaining), Some(0));
        assert_eq!(report.smoothing.map(|s| s.passes), Some(3));
    }

    #[test]
    fn progress_ends_with_finalize() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let engine = Inpainter::new(InpaintOptions {
            samples: 50,
            ..InpaintOptions::new(Algorithm::Texture, 5, 0)
        })
        .with_progress(move |phase: Phase, pct: u8| sink_seen.lock().unwrap().push((phase, pct)));

        let mut img = noisy(20, 20);
        let mask = BinaryMask::from_fn(20, 20, |x, y| (8..11).contains(&x) && (8..11).contains(&y));
        engine.run(&mut img, &mask).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&(Phase::Analyze, 0)));
        assert_eq!(seen.last(), Some(&(Phase::Finalize, 100)));
        assert!(seen.iter().any(|(p, _)| *p == Phase::Inpaint));
        let inpaint: Vec<u8> = seen
            .iter()
            .filter(|(p, _)| *p == Phase::Inpaint)
            .map(|(_, pct)| *pct)
            .collect();
        assert!(inpaint.windows(2).all(|w| w[0] <= w[1]));
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<EngineState>>,
        smoothing_seen_at: Mutex<Option<u8>>,
        last_percent: Mutex<u8>,
    }

    impl ProgressSink for Recorder {
        fn report(&self, _phase: Phase, percent: u8) {
            *self.last_percent.lock().unwrap() = percent;
        }

        fn state_changed(&self, state: EngineState) {
            if state == EngineState::Smoothing {
                *self.smoothing_seen_at.lock().unwrap() = Some(*self.last_percent.lock().unwrap());
            }
            self.states.lock().unwrap().push(state);
        }
    }

    struct Shared(Arc<Recorder>);

    impl ProgressSink for Shared {
        fn report(&self, phase: Phase, percent: u8) {
            self.0.report(phase, percent);
        }

        fn state_changed(&self, state: EngineState) {
            self.0.state_changed(state);
        }
    }

    #[test]
    fn hybrid_announces_smoothing_when_it_starts() {
        let recorder = Arc::new(Recorder::default());
        let engine = Inpainter::new(InpaintOptions {
            samples: 50,
            ..InpaintOptions::new(Algorithm::Hybrid, 5, 3)
        })
        .with_progress(Shared(Arc::clone(&recorder)));

        let mut img = noisy(24, 24);
        let mask = BinaryMask::from_fn(24, 24, |x, y| (9..13).contains(&x) && (9..13).contains(&y));
        engine.run(&mut img, &mask).unwrap();

        assert_eq!(
            *recorder.states.lock().unwrap(),
            vec![
                EngineState::Synthesizing,
                EngineState::Smoothing,
                EngineState::Completed
            ]
        );
        // Synthesis had reported its full band before smoothing began.
        assert_eq!(*recorder.smoothing_seen_at.lock().unwrap(), Some(85));
    }

    #[test]
    fn rejected_input_announces_failed() {
        let recorder = Arc::new(Recorder::default());
        let engine = Inpainter::default().with_progress(Shared(Arc::clone(&recorder)));
        let mut img = noisy(8, 8);
        assert!(engine.run(&mut img, &BinaryMask::new(4, 4)).is_err());
        assert_eq!(*recorder.states.lock().unwrap(), vec![EngineState::Failed]);
    }

    #[test]
    fn cancelled_run_reports_cancelled_state() {
        let token = CancelToken::new();
        let engine = Inpainter::new(InpaintOptions::default()).with_cancel(token.clone());
        token.cancel();

        let mut img = noisy(20, 20);
        let mask = BinaryMask::from_fn(20, 20, |x, y| (5..9).contains(&x) && (5..9).contains(&y));
        let report = engine.run(&mut img, &mask).unwrap();
        assert_eq!(report.status, Status::Cancelled);
        assert_eq!(report.state, EngineState::Cancelled);
        assert!(engine.cancel_token().is_cancelled());
    }
}
