//! Self-rescheduling render loop state
//!
//! The host fires one frame callback per display refresh. Each fired frame
//! consumes the pending [`FrameHandle`]; the viewer requests the next one
//! before drawing, so exactly one frame is outstanding while the view lives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

/// Shared "view is still mounted" flag
///
/// Cloned into every asynchronous callback; once killed it never revives.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the view dead, returning whether it was live before this call
    pub fn kill(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-issued id of a scheduled frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

#[derive(Debug)]
pub struct RenderLoop {
    liveness: Liveness,
    pending: Option<FrameHandle>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(liveness: Liveness) -> Self {
        Self {
            liveness,
            pending: None,
            frames: 0,
        }
    }

    /// Record the frame the host will fire next
    pub fn schedule(&mut self, frame: FrameHandle) {
        if let Some(stale) = self.pending.replace(frame) {
            trace!("Frame {:?} superseded by {:?}", stale, frame);
        }
    }

    /// Consume the pending frame; false means the tick must do nothing
    pub fn begin_tick(&mut self) -> bool {
        if !self.liveness.is_live() {
            return false;
        }
        self.pending.take().is_some()
    }

    pub fn finish_tick(&mut self) {
        self.frames += 1;
    }

    /// Stop rescheduling, returning the frame the host still has queued
    pub fn stop(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}
