//! Texture synthesis followed by diffusion smoothing.
//!
//! Synthesis alone leaves seams at patch boundaries and diffusion alone
//! washes out texture. Running synthesis to completion on a working copy of
//! the mask and then a few diffusion passes over the original mask keeps the
//! synthesized detail while damping the seams.

use image::RgbaImage;
use log::debug;
use rand::Rng;

use crate::control::{EngineState, RunControl, Status};
use crate::diffusion::{smooth, SmoothingOutcome};
use crate::error::Result;
use crate::mask::BinaryMask;
use crate::synthesis::{synthesize, SynthesisOutcome, SynthesisParams};

/// Share of the progress range given to synthesis when smoothing follows.
const SYNTHESIS_BAND_END: u8 = 85;

/// What a hybrid run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridOutcome {
    /// Overall status.
    pub status: Status,
    /// Synthesis stage report.
    pub synthesis: SynthesisOutcome,
    /// Smoothing stage report, if it ran.
    pub smoothing: Option<SmoothingOutcome>,
}

/// Fill `mask` by texture synthesis, then smooth the original region for
/// `passes` sweeps.
///
/// `mask` is left untouched; synthesis works on a copy.
///
/// # Errors
///
/// Propagates input validation errors from [`synthesize`] before any
/// mutation.
pub fn hybrid_fill<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    mask: &BinaryMask,
    params: &SynthesisParams,
    passes: u32,
    rng: &mut R,
    control: &RunControl,
) -> Result<HybridOutcome> {
    let mut working = mask.clone();
    let synthesis_band = if passes > 0 { SYNTHESIS_BAND_END } else { 100 };
    let synthesis = synthesize(
        image,
        &mut working,
        params,
        rng,
        &control.with_band(0, synthesis_band),
    )?;

    if synthesis.status == Status::Cancelled || passes == 0 {
        return Ok(HybridOutcome {
            status: synthesis.status,
            synthesis,
            smoothing: None,
        });
    }

    debug!("synthesis left {} pixels masked; smoothing seams", working.count_masked());
    control.enter(EngineState::Smoothing);
    let smoothing = smooth(
        image,
        mask,
        passes,
        &control.with_band(SYNTHESIS_BAND_END, 100),
    )?;
    Ok(HybridOutcome {
        status: smoothing.status,
        synthesis,
        smoothing: Some(smoothing),
    })
}
