use anyhow::Result;

use crate::detect::result::{RawDetection, TextCandidate};
use crate::frame::FrameView;

/// Object detector backend.
///
/// Backends are black boxes to the narration policy: pixels flow in through a
/// `FrameView`, raw detections flow out. A backend may fail (model missing,
/// inference error); callers go through [`detect_or_empty`] so that a failure
/// degrades to an empty frame instead of an error.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, view: &FrameView<'_>) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Text recognizer backend.
pub trait TextRecognizer: Send {
    fn name(&self) -> &'static str;

    /// Recognize text on a frame, keeping candidates above `confidence_threshold`.
    fn recognize(
        &mut self,
        view: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<TextCandidate>>;
}

/// Run a detector, failing closed.
pub fn detect_or_empty<D: DetectorBackend + ?Sized>(
    detector: &mut D,
    view: &FrameView<'_>,
) -> Vec<RawDetection> {
    match detector.detect(view) {
        Ok(detections) => detections,
        Err(err) => {
            log::warn!(
                "detector '{}' failed on frame {}: {}",
                detector.name(),
                view.sequence(),
                err
            );
            Vec::new()
        }
    }
}

/// Run a text recognizer, failing closed.
pub fn recognize_or_empty<R: TextRecognizer + ?Sized>(
    recognizer: &mut R,
    view: &FrameView<'_>,
    confidence_threshold: f32,
) -> Vec<TextCandidate> {
    match recognizer.recognize(view, confidence_threshold) {
        Ok(texts) => texts,
        Err(err) => {
            log::warn!(
                "text recognizer '{}' failed on frame {}: {}",
                recognizer.name(),
                view.sequence(),
                err
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use anyhow::anyhow;

    struct BrokenModel;

    impl DetectorBackend for BrokenModel {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&mut self, _view: &FrameView<'_>) -> Result<Vec<RawDetection>> {
            Err(anyhow!("model not loaded"))
        }
    }

    impl TextRecognizer for BrokenModel {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn recognize(&mut self, _view: &FrameView<'_>, _threshold: f32) -> Result<Vec<TextCandidate>> {
            Err(anyhow!("reader crashed"))
        }
    }

    #[test]
    fn failures_degrade_to_empty() {
        let frame = Frame::blank(64, 48, 1);
        let mut model = BrokenModel;
        assert!(detect_or_empty(&mut model, &frame.view()).is_empty());
        assert!(recognize_or_empty(&mut model, &frame.view(), 0.5).is_empty());
    }
}
