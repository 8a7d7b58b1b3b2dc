//! Cooperative cancellation, progress reporting and run status.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

/// Shared cancellation flag.
///
/// Clone the token, hand one copy to the thread running the engine and call
/// [`CancelToken::cancel`] from anywhere else. The engine polls it once per
/// frontier pixel and once per diffusion pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Coarse phase tag attached to progress reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building or locating the mask.
    Detect,
    /// Validating input and counting masked pixels.
    Analyze,
    /// Filling masked pixels.
    Inpaint,
    /// Run finished.
    Finalize,
}

impl Phase {
    /// Lowercase tag for display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Analyze => "analyze",
            Self::Inpaint => "inpaint",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of advisory progress reports.
///
/// Implemented for any `Fn(Phase, u8) + Send + Sync` closure; closures
/// ignore state changes.
pub trait ProgressSink: Send + Sync {
    /// Called with the current phase and an overall percentage in `0..=100`.
    fn report(&self, phase: Phase, percent: u8);

    /// Called when the engine enters `state`, before that stage does any work.
    fn state_changed(&self, state: EngineState) {
        let _ = state;
    }
}

impl<F> ProgressSink for F
where
    F: Fn(Phase, u8) + Send + Sync,
{
    fn report(&self, phase: Phase, percent: u8) {
        self(phase, percent);
    }
}

/// Final outcome of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Every masked pixel was processed.
    Completed,
    /// Cancellation was observed; the image holds a valid partial fill.
    Cancelled,
}

/// Lifecycle of a single engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not started.
    Idle,
    /// Patch matcher running.
    Synthesizing,
    /// Diffusion smoother running.
    Smoothing,
    /// Finished normally.
    Completed,
    /// Stopped by cancellation.
    Cancelled,
    /// Rejected invalid input.
    Failed,
}

impl EngineState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl From<Status> for EngineState {
    fn from(status: Status) -> Self {
        match status {
            Status::Completed => Self::Completed,
            Status::Cancelled => Self::Cancelled,
        }
    }
}

/// Cancellation token plus optional progress sink, handed to every stage.
///
/// The `band` maps a stage's local progress into a slice of the overall
/// percentage so that sequenced stages report a monotonic total.
#[derive(Clone)]
pub struct RunControl {
    cancel: CancelToken,
    sink: Option<Arc<dyn ProgressSink>>,
    band: (u8, u8),
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            sink: None,
            band: (0, 100),
        }
    }
}

impl fmt::Debug for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("cancel", &self.cancel)
            .field("has_sink", &self.sink.is_some())
            .field("band", &self.band)
            .finish()
    }
}

impl RunControl {
    /// Control with the given token and sink.
    #[must_use]
    pub fn new(cancel: CancelToken, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            cancel,
            sink,
            band: (0, 100),
        }
    }

    /// Control that only carries a cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self::new(cancel, None)
    }

    /// A copy whose stage progress maps into `start..=end` percent.
    #[must_use]
    pub fn with_band(&self, start: u8, end: u8) -> Self {
        Self {
            cancel: self.cancel.clone(),
            sink: self.sink.clone(),
            band: (start.min(100), end.clamp(start.min(100), 100)),
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forward a report to the sink, if any.
    pub fn report(&self, phase: Phase, percent: u8) {
        if let Some(sink) = &self.sink {
            sink.report(phase, percent.min(100));
        }
    }

    /// Announce that the run is entering `state`.
    pub fn enter(&self, state: EngineState) {
        debug!("engine state -> {state:?}");
        if let Some(sink) = &self.sink {
            sink.state_changed(state);
        }
    }

    /// Report `done` of `total` units of inpainting work within the band.
    ///
    /// Only emits on whole-percent boundaries of the stage to keep the sink
    /// call rate low.
    pub fn progress(&self, done: usize, total: usize) {
        if self.sink.is_none() || total == 0 {
            return;
        }
        let step = (total / 100).max(1);
        if done % step != 0 && done != total {
            return;
        }
        let (start, end) = self.band;
        let span = usize::from(end - start);
        let offset = span * done.min(total) / total;
        #[allow(clippy::cast_possible_truncation)]
        let percent = start + offset as u8;
        self.report(Phase::Inpaint, percent);
    }
}
