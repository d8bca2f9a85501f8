//! Audio output.
//!
//! Narration is handed to a `SpeechWorker`, which owns the synthesis
//! backends on a dedicated thread. The frame loop never waits on audio unless
//! it explicitly asks to (`blocking = true`), and then only up to a timeout.

mod backend;
mod worker;

pub use backend::{CommandBackend, LogBackend, SpeechBackend};
pub use worker::{SpeechStats, SpeechWorker, SpeechWorkerConfig, DEFAULT_QUEUE_DEPTH};
