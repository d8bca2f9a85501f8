use anyhow::Result;

use crate::detect::backend::{DetectorBackend, TextRecognizer};
use crate::detect::result::{RawDetection, TextCandidate};
use crate::frame::FrameView;

/// Stub backend for running without a model. Sees nothing.
#[derive(Default)]
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _view: &FrameView<'_>) -> Result<Vec<RawDetection>> {
        self.frames_seen += 1;
        Ok(Vec::new())
    }

    fn warm_up(&mut self) -> Result<()> {
        log::warn!("stub detector active: no objects will ever be reported");
        Ok(())
    }
}

impl TextRecognizer for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn recognize(
        &mut self,
        _view: &FrameView<'_>,
        _confidence_threshold: f32,
    ) -> Result<Vec<TextCandidate>> {
        self.frames_seen += 1;
        Ok(Vec::new())
    }
}
