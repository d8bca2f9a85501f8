//! Captured frames.
//!
//! - `Frame`: owned pixel buffer plus geometry, produced by an ingest source.
//! - `FrameView`: borrowed read-only view handed to perception backends.
//!
//! A frame lives for exactly one pipeline cycle. Nothing downstream of
//! perception sees pixels; the narration policy only sees detections.

/// Owned frame from a camera source. Not `Clone`; one frame, one cycle.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1-based capture counter from the source.
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// All-black RGB frame; used by synthetic sources and tests.
    pub fn blank(width: u32, height: u32, sequence: u64) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![0u8; len], width, height, sequence)
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Read-only view of a frame for inference.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn sequence(&self) -> u64 {
        self.frame.sequence
    }

    /// Packed RGB pixels, row-major.
    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}
