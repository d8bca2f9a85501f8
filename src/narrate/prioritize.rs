use crate::narrate::policy::NUISANCE_PRIORITY;
use crate::narrate::urgency::{AnnotatedDetection, DetectionSet};

/// At most this many detections are narrated per cycle.
pub const MAX_NARRATED_OBJECTS: usize = 3;
/// Survivors must reach this share of the top urgency.
pub const RELATIVE_URGENCY_CUTOFF: f32 = 0.5;

/// Pick the detections worth narrating this cycle, most urgent first.
///
/// The cutoff is relative to the most urgent detection even when that
/// detection is itself a nuisance class that gets excluded.
pub fn select(detections: &DetectionSet) -> Vec<AnnotatedDetection> {
    let top_urgency = detections.first().map(|d| d.urgency).unwrap_or(0.0);
    let threshold = top_urgency * RELATIVE_URGENCY_CUTOFF;
    detections
        .iter()
        .filter(|d| d.urgency >= threshold && d.priority > NUISANCE_PRIORITY)
        .take(MAX_NARRATED_OBJECTS)
        .cloned()
        .collect()
}
