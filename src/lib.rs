//! Percepta
//!
//! Spoken scene narration for visually-impaired users. A camera frame goes
//! through object detection and text recognition; the narration policy turns
//! the results into at most one short spoken sentence per frame.
//!
//! # Architecture
//!
//! The narration core keeps four promises:
//!
//! 1. **Most urgent first**: detections are ranked by danger, closeness and
//!    confidence; only the top few are mentioned.
//! 2. **No nuisance chatter**: low-priority classes and unimportant text are
//!    never spoken.
//! 3. **No repetition**: a sentence with the same signature is suppressed for
//!    the cooldown window.
//! 4. **Never stall**: perception, speech and dashboard failures degrade to
//!    silence; they never stop the frame loop.
//!
//! # Module Structure
//!
//! - `frame`: captured frames and the read-only view given to perception
//! - `ingest`: frame sources (synthetic, scripted scene replay)
//! - `detect`: detection/OCR results and backend traits
//! - `narrate`: urgency scoring, prioritization, phrasing, cooldown
//! - `speech`: serial text-to-speech worker
//! - `dashboard`: latest-record store, HTTP surface, push client
//! - `pipeline`: the per-frame orchestrator
//! - `config`: daemon configuration

use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod dashboard;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod narrate;
pub mod pipeline;
pub mod speech;

pub use dashboard::{
    ApiConfig, ApiHandle, ApiServer, DashboardState, EventSink, HttpPublisher, PushOutcome,
};
pub use detect::{
    BoundingBox, DetectorBackend, RawDetection, SceneStep, ScriptedBackend, StubBackend,
    TextCandidate, TextRecognizer,
};
pub use frame::{Frame, FrameView};
pub use ingest::{CameraConfig, CameraSource, CameraStats, FrameSource};
pub use narrate::{
    AnnotatedDetection, DetectionSet, Language, NarrationEvent, Narrator, NarratorSettings,
    ObjectSummary,
};
pub use pipeline::{CycleReport, Pipeline, PipelineSettings, RunSummary};
pub use speech::{CommandBackend, LogBackend, SpeechBackend, SpeechWorker, SpeechWorkerConfig};

/// Seconds since the Unix epoch, as carried in narration records.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
