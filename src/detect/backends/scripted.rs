//! Scene-script replay backend.
//!
//! A scene script is a JSON array of steps, one per frame:
//!
//! ```json
//! [
//!   {"objects": [{"class": "stairs", "confidence": 0.92,
//!                 "bbox": {"x": 100, "y": 200, "w": 400, "h": 280}}],
//!    "texts": []},
//!   {"objects": [], "texts": [{"content": "EXIT", "confidence": 0.9}]}
//! ]
//! ```
//!
//! Frame `n` (1-based) replays step `(n - 1) % len`, so short scripts loop.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::backend::{DetectorBackend, TextRecognizer};
use crate::detect::result::{RawDetection, TextCandidate};
use crate::frame::FrameView;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneStep {
    #[serde(default)]
    pub objects: Vec<RawDetection>,
    #[serde(default)]
    pub texts: Vec<TextCandidate>,
}

/// Replays a scene script. Cheap to clone; the detector and the text
/// recognizer slots can share one script.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    steps: Arc<Vec<SceneStep>>,
}

impl ScriptedBackend {
    pub fn from_steps(steps: Vec<SceneStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(anyhow!("scene script must contain at least one step"));
        }
        Ok(Self {
            steps: Arc::new(steps),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read scene script {}: {}", path.display(), e))?;
        let steps: Vec<SceneStep> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid scene script {}: {}", path.display(), e))?;
        Self::from_steps(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn step_for(&self, sequence: u64) -> &SceneStep {
        let index = sequence.saturating_sub(1) % self.steps.len() as u64;
        &self.steps[index as usize]
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, view: &FrameView<'_>) -> Result<Vec<RawDetection>> {
        Ok(self.step_for(view.sequence()).objects.clone())
    }
}

impl TextRecognizer for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(
        &mut self,
        view: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<TextCandidate>> {
        Ok(self
            .step_for(view.sequence())
            .texts
            .iter()
            .filter(|text| text.confidence > confidence_threshold)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;
    use crate::frame::Frame;

    fn script() -> ScriptedBackend {
        ScriptedBackend::from_steps(vec![
            SceneStep {
                objects: vec![RawDetection::new(
                    "person",
                    0.8,
                    BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                )],
                texts: vec![],
            },
            SceneStep {
                objects: vec![],
                texts: vec![
                    TextCandidate::new("EXIT", 0.9),
                    TextCandidate::new("blurry", 0.3),
                ],
            },
        ])
        .unwrap()
    }

    #[test]
    fn replays_steps_in_a_loop() {
        let mut backend = script();
        let f1 = Frame::blank(4, 4, 1);
        let f2 = Frame::blank(4, 4, 2);
        let f3 = Frame::blank(4, 4, 3);

        assert_eq!(backend.detect(&f1.view()).unwrap().len(), 1);
        assert!(backend.detect(&f2.view()).unwrap().is_empty());
        assert_eq!(backend.detect(&f3.view()).unwrap()[0].class_name, "person");
    }

    #[test]
    fn text_below_threshold_is_dropped() {
        let mut backend = script();
        let frame = Frame::blank(4, 4, 2);
        let texts = backend.recognize(&frame.view(), 0.5).unwrap();
        assert_eq!(texts, vec![TextCandidate::new("EXIT", 0.9)]);
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(ScriptedBackend::from_steps(vec![]).is_err());
    }
}
