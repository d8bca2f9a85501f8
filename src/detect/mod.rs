mod backend;
mod backends;
mod result;

pub use backend::{detect_or_empty, recognize_or_empty, DetectorBackend, TextRecognizer};
pub use backends::{SceneStep, ScriptedBackend, StubBackend};
pub use result::{BoundingBox, RawDetection, TextCandidate};
