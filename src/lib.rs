//! Mask-driven raster inpainting.
//!
//! Given an RGBA image and a same-sized binary mask, this crate replaces the
//! masked pixels with plausible content derived from the rest of the image.
//! Three algorithms are available:
//!
//! - **Texture**: patch-based texture synthesis. Masked pixels are filled
//!   outside-in, each one copied from the best-matching known patch.
//! - **Diffusion**: repeated 8-neighbor averaging over the masked region.
//! - **Hybrid** (default): texture synthesis followed by a few diffusion
//!   passes to soften seams.
//!
//! # Quick Start
//!
//! ```no_run
//! use mask_inpaint::{inpaint, Algorithm, BinaryMask};
//!
//! let img = image::open("photo.png").unwrap().to_rgba8();
//! let mut mask = BinaryMask::new(img.width(), img.height());
//! for y in 40..60 {
//!     for x in 100..160 {
//!         mask.set(x, y, true);
//!     }
//! }
//! let repaired = inpaint(img, &mask, Algorithm::Hybrid, 7, 10).unwrap();
//! repaired.save("repaired.png").unwrap();
//! ```
//!
//! # Cancellation and progress
//!
//! [`Inpainter`] exposes the full surface: a [`CancelToken`] that can be
//! triggered from another thread, and a [`ProgressSink`] receiving
//! `(Phase, percent)` reports.
//!
//! ```no_run
//! use mask_inpaint::{BinaryMask, CancelToken, InpaintOptions, Inpainter, Phase, Status};
//!
//! let token = CancelToken::new();
//! let engine = Inpainter::new(InpaintOptions::default())
//!     .with_cancel(token.clone())
//!     .with_progress(|phase: Phase, pct: u8| eprintln!("{phase}: {pct}%"));
//!
//! let mut img = image::open("photo.png").unwrap().to_rgba8();
//! let mask = BinaryMask::from_image(&image::open("mask.png").unwrap());
//! let report = engine.run(&mut img, &mask).unwrap();
//! assert_eq!(report.status, Status::Completed);
//! ```

#![deny(missing_docs)]

pub mod control;
pub mod diffusion;
mod engine;
pub mod error;
mod files;
pub mod frontier;
pub mod hybrid;
pub mod mask;
pub mod patch;
pub mod synthesis;

pub use control::{CancelToken, EngineState, Phase, ProgressSink, Status};
pub use engine::{inpaint, Algorithm, InpaintOptions, InpaintReport, Inpainter, DEFAULT_SEED};
pub use error::{Error, Result};
pub use files::{default_output_path, is_supported_image, save_image, MaskSource, ProcessResult};
pub use mask::{BinaryMask, Region, Shape};
