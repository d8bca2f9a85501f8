use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detect::{BoundingBox, RawDetection};
use crate::narrate::policy::ClassPolicy;

/// Default minimum detector confidence for a detection to be scored at all.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.5;

const AREA_WEIGHT: f32 = 0.7;
const VERTICAL_WEIGHT: f32 = 0.3;

/// A detection after scoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDetection {
    #[serde(flatten)]
    pub detection: RawDetection,
    /// Static per-class rank, 1..=5.
    pub priority: u8,
    /// 0 = very close, 1 = far.
    pub distance: f32,
    /// danger × (1 − distance) × confidence.
    pub urgency: f32,
}

impl AnnotatedDetection {
    pub fn class_name(&self) -> &str {
        &self.detection.class_name
    }

    pub fn confidence(&self) -> f32 {
        self.detection.confidence
    }
}

/// Detections of one frame, most urgent first.
///
/// Ties keep detector order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet(Vec<AnnotatedDetection>);

impl DetectionSet {
    pub fn new(mut detections: Vec<AnnotatedDetection>) -> Self {
        // sort_by is stable
        detections.sort_by(|a, b| b.urgency.total_cmp(&a.urgency));
        Self(detections)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[AnnotatedDetection] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnotatedDetection> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&AnnotatedDetection> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Heuristic closeness from box geometry: bigger and lower boxes are nearer.
///
/// Always in `[0, 1]`. A degenerate frame yields 1 (far).
pub fn estimate_distance(bbox: &BoundingBox, frame_height: u32, frame_width: u32) -> f32 {
    let frame_area = frame_height as f32 * frame_width as f32;
    if frame_area <= 0.0 {
        return 1.0;
    }
    let relative_area = bbox.area() / frame_area;
    let vertical_position = bbox.bottom() / frame_height as f32;
    let closeness = relative_area * AREA_WEIGHT + vertical_position * VERTICAL_WEIGHT * relative_area;
    (1.0 - closeness).clamp(0.0, 1.0)
}

/// Turns raw detections into a ranked `DetectionSet`.
#[derive(Clone, Debug)]
pub struct UrgencyScorer {
    policy: Arc<ClassPolicy>,
    confidence_floor: f32,
}

impl UrgencyScorer {
    pub fn new(policy: Arc<ClassPolicy>, confidence_floor: f32) -> Self {
        Self {
            policy,
            confidence_floor,
        }
    }

    pub fn confidence_floor(&self) -> f32 {
        self.confidence_floor
    }

    pub fn score(
        &self,
        detection: &RawDetection,
        frame_height: u32,
        frame_width: u32,
    ) -> AnnotatedDetection {
        let rule = self.policy.rule(&detection.class_name);
        let distance = estimate_distance(&detection.bbox, frame_height, frame_width);
        let confidence = detection.confidence.clamp(0.0, 1.0);
        AnnotatedDetection {
            detection: detection.clone(),
            priority: rule.priority,
            distance,
            urgency: rule.danger * (1.0 - distance) * confidence,
        }
    }

    /// Score one frame. Detections under the confidence floor are dropped.
    pub fn score_frame(
        &self,
        detections: &[RawDetection],
        frame_height: u32,
        frame_width: u32,
    ) -> DetectionSet {
        DetectionSet::new(
            detections
                .iter()
                .filter(|det| det.confidence >= self.confidence_floor)
                .map(|det| self.score(det, frame_height, frame_width))
                .collect(),
        )
    }
}

impl Default for UrgencyScorer {
    fn default() -> Self {
        Self::new(Arc::new(ClassPolicy::builtin()), DEFAULT_CONFIDENCE_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u32 = 480;
    const W: u32 = 640;

    fn det(class: &str, confidence: f32, bbox: BoundingBox) -> RawDetection {
        RawDetection::new(class, confidence, bbox)
    }

    #[test]
    fn full_frame_box_is_touching() {
        let bbox = BoundingBox::new(0.0, 0.0, W as f32, H as f32);
        assert!(estimate_distance(&bbox, H, W).abs() < 1e-6);
    }

    #[test]
    fn distance_stays_in_unit_range() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 0.0, 0.0),
            BoundingBox::new(10.0, 10.0, 5.0, 5.0),
            BoundingBox::new(-50.0, 300.0, 2000.0, 900.0),
        ];
        for bbox in boxes {
            let d = estimate_distance(&bbox, H, W);
            assert!((0.0..=1.0).contains(&d), "{d} out of range for {bbox:?}");
        }
        assert_eq!(estimate_distance(&boxes[1], 0, W), 1.0);
    }

    #[test]
    fn lower_boxes_are_closer() {
        let high = BoundingBox::new(0.0, 0.0, 200.0, 100.0);
        let low = BoundingBox::new(0.0, 380.0, 200.0, 100.0);
        assert!(estimate_distance(&low, H, W) < estimate_distance(&high, H, W));
    }

    #[test]
    fn urgency_grows_with_confidence() {
        let scorer = UrgencyScorer::default();
        let bbox = BoundingBox::new(100.0, 200.0, 200.0, 200.0);
        let mut last = -1.0;
        for step in 0..=10 {
            let confidence = step as f32 / 10.0;
            let scored = scorer.score(&det("car", confidence, bbox), H, W);
            assert!(scored.urgency >= last);
            last = scored.urgency;
        }
    }

    #[test]
    fn urgency_grows_as_distance_shrinks() {
        let scorer = UrgencyScorer::default();
        let far = scorer.score(&det("dog", 0.8, BoundingBox::new(0.0, 0.0, 50.0, 50.0)), H, W);
        let near = scorer.score(&det("dog", 0.8, BoundingBox::new(0.0, 0.0, 400.0, 400.0)), H, W);
        assert!(near.distance < far.distance);
        assert!(near.urgency > far.urgency);
    }

    #[test]
    fn floor_drops_and_order_is_stable() {
        let scorer = UrgencyScorer::default();
        let bbox = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let set = scorer.score_frame(
            &[
                det("chair", 0.9, bbox),
                det("stairs", 0.3, bbox),
                det("person", 0.6, bbox),
                det("chair", 0.9, bbox),
                det("car", 0.9, bbox),
            ],
            H,
            W,
        );
        let classes: Vec<&str> = set.iter().map(|d| d.class_name()).collect();
        assert_eq!(classes, vec!["car", "person", "chair", "chair"]);
        assert_eq!(set.first().map(|d| d.priority), Some(5));
    }
}
