use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from corner coordinates (`x1,y1,x2,y2`), as most detectors emit.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            w: (x2 - x1).abs(),
            h: (y2 - y1).abs(),
        }
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// One object reported by a detector for one frame.
///
/// Discarded once the frame's narration cycle completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "class", alias = "label", alias = "class_name")]
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// One string reported by a text recognizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextCandidate {
    pub content: String,
    pub confidence: f32,
}

impl TextCandidate {
    pub fn new(content: impl Into<String>, confidence: f32) -> Self {
        Self {
            content: content.into(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_normalize_to_positive_extent() {
        let bbox = BoundingBox::from_corners(100.0, 80.0, 40.0, 20.0);
        assert_eq!(bbox, BoundingBox::new(40.0, 20.0, 60.0, 60.0));
        assert_eq!(bbox.bottom(), 80.0);
    }

    #[test]
    fn detection_accepts_label_alias() {
        let det: RawDetection = serde_json::from_str(
            r#"{"label":"door","confidence":0.7,"bbox":{"x":0,"y":0,"w":10,"h":20}}"#,
        )
        .unwrap();
        assert_eq!(det.class_name, "door");
        assert_eq!(det.bbox.area(), 200.0);
    }
}
