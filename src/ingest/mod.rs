//! Frame ingestion sources.
//!
//! All sources produce `Frame` instances that flow into one pipeline cycle.
//! The ingestion layer is responsible for:
//! - Opening and releasing the capture handle
//! - Numbering frames
//! - Reporting capture health
//!
//! Camera device drivers are external collaborators; this crate ships the
//! synthetic `stub://` source and the `scripted://` scene replay source.

pub mod camera;

pub use camera::{CameraConfig, CameraSource, CameraStats, MAX_FRAME_DIMENSION};

use anyhow::Result;

use crate::frame::Frame;

/// Anything that yields frames to the pipeline.
pub trait FrameSource: Send {
    /// Open the capture handle.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame. `Ok(None)` means no frame was received this time.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the capture handle. Must be safe to call more than once.
    fn release(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> CameraStats;
}
