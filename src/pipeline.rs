//! Frame loop orchestrator.
//!
//! One frame at a time: capture, throttled perception, narration, dispatch.
//! Detection and OCR run every Nth frame and their last result is reused on
//! the frames in between; narration and the cooldown gate run on every frame.
//!
//! The pipeline owns the current language. When a dashboard state is
//! attached, its requested language is read once per cycle as a snapshot and
//! adopted before narration; its reset counter clears the cooldowns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::{PerceptaConfig, ThrottleSettings};
use crate::dashboard::{DashboardState, EventSink, PushOutcome};
use crate::detect::{detect_or_empty, recognize_or_empty, DetectorBackend, TextRecognizer};
use crate::ingest::FrameSource;
use crate::narrate::{DetectionSet, Language, NarrationEvent, Narrator};
use crate::speech::SpeechWorker;

/// Consecutive capture failures after which the loop gives up.
pub const MAX_CONSECUTIVE_FRAME_FAILURES: u32 = 10;
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub throttle: ThrottleSettings,
    pub ocr_confidence_threshold: f32,
    /// Minimum time per cycle; zero runs as fast as the source delivers.
    pub frame_interval: Duration,
    pub language: Language,
    /// Speak the startup sentence, waiting at most this long for it.
    pub intro_timeout: Option<Duration>,
    pub speech_stop_timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl PipelineSettings {
    pub fn from_config(cfg: &PerceptaConfig) -> Self {
        Self {
            throttle: cfg.throttle,
            ocr_confidence_threshold: cfg.perception.ocr_confidence_threshold,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(cfg.camera.target_fps.max(1))),
            language: cfg.narration.language.clone(),
            intro_timeout: cfg.speech.intro.then_some(cfg.speech.intro_timeout),
            speech_stop_timeout: cfg.speech.stop_timeout,
            max_consecutive_failures: MAX_CONSECUTIVE_FRAME_FAILURES,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            throttle: ThrottleSettings::default(),
            ocr_confidence_threshold: 0.5,
            frame_interval: Duration::from_millis(100),
            language: Language::english(),
            intro_timeout: Some(Duration::from_secs(30)),
            speech_stop_timeout: Duration::from_secs(2),
            max_consecutive_failures: MAX_CONSECUTIVE_FRAME_FAILURES,
        }
    }
}

/// What happened in one processed frame.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub sequence: u64,
    pub detected: bool,
    pub recognized: bool,
    pub event: NarrationEvent,
    pub spoken: bool,
    pub published: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub spoken: u64,
    pub failed_captures: u64,
}

#[derive(Default)]
struct PerceptionCache {
    detections: DetectionSet,
    texts: Vec<String>,
}

pub struct Pipeline {
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    recognizer: Box<dyn TextRecognizer>,
    narrator: Narrator,
    speech: Option<SpeechWorker>,
    sinks: Vec<Box<dyn EventSink>>,
    dashboard: Option<Arc<DashboardState>>,
    settings: PipelineSettings,
    language: Language,
    cache: PerceptionCache,
    frames: u64,
    spoken: u64,
    failed_captures: u64,
    consecutive_failures: u32,
    seen_resets: u64,
    last_health_log: Instant,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        recognizer: Box<dyn TextRecognizer>,
        narrator: Narrator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            detector,
            recognizer,
            narrator,
            speech: None,
            sinks: Vec::new(),
            dashboard: None,
            language: settings.language.clone(),
            settings,
            cache: PerceptionCache::default(),
            frames: 0,
            spoken: 0,
            failed_captures: 0,
            consecutive_failures: 0,
            seen_resets: 0,
            last_health_log: Instant::now(),
        }
    }

    pub fn with_speech(mut self, worker: SpeechWorker) -> Self {
        self.speech = Some(worker);
        self
    }

    /// Follow the dashboard's language and reset requests. Does not publish
    /// to it; add it as a sink for that.
    pub fn with_dashboard(mut self, state: Arc<DashboardState>) -> Self {
        if !state.set_language(self.language.clone()) {
            log::debug!("dashboard already on language {}", self.language);
        }
        self.seen_resets = state.resets();
        self.dashboard = Some(state);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    /// Connect, announce, loop until `shutdown` or `max_frames`, tear down.
    pub fn run(&mut self, shutdown: &AtomicBool, max_frames: Option<u64>) -> Result<RunSummary> {
        self.source.connect()?;
        if let Err(err) = self.detector.warm_up() {
            log::warn!("detector '{}' warm-up failed: {}", self.detector.name(), err);
        }
        self.announce_intro();

        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            if let Some(report) = self.step() {
                log::debug!(
                    "frame {} detected={} recognized={} spoken={} published={}",
                    report.sequence,
                    report.detected,
                    report.recognized,
                    report.spoken,
                    report.published
                );
            }
            if self.consecutive_failures >= self.settings.max_consecutive_failures {
                log::error!(
                    "camera failed {} times in a row; stopping",
                    self.consecutive_failures
                );
                break;
            }
            if max_frames.map_or(false, |max| self.frames >= max) {
                log::info!("processed {} frames; stopping", self.frames);
                break;
            }
            let elapsed = started.elapsed();
            if elapsed < self.settings.frame_interval {
                std::thread::sleep(self.settings.frame_interval - elapsed);
            }
        }

        self.teardown();
        Ok(RunSummary {
            frames: self.frames,
            spoken: self.spoken,
            failed_captures: self.failed_captures,
        })
    }

    fn announce_intro(&mut self) {
        let (Some(timeout), Some(worker)) = (self.settings.intro_timeout, &self.speech) else {
            return;
        };
        let intro = self.narrator.intro(&self.language);
        if worker.speak(&intro, &self.language, false) && !worker.wait_idle(timeout) {
            log::warn!("intro announcement still playing after {:?}", timeout);
        }
    }

    /// Process one frame. `None` when no frame could be captured.
    pub fn step(&mut self) -> Option<CycleReport> {
        self.sync_dashboard();
        self.log_health();

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.capture_failed("no frame received".to_string());
                return None;
            }
            Err(err) => {
                self.capture_failed(err.to_string());
                return None;
            }
        };
        self.consecutive_failures = 0;
        self.frames += 1;
        let cycle = self.frames - 1;
        let throttle = self.settings.throttle;

        let detected = cycle % throttle.detect_every_n_frames == 0;
        let recognized = cycle % throttle.ocr_every_n_frames == 0;
        {
            let view = frame.view();
            if detected {
                let raw = detect_or_empty(self.detector.as_mut(), &view);
                self.cache.detections =
                    self.narrator
                        .score_frame(&raw, view.height(), view.width());
            } else {
                log::debug!("frame {}: detection skipped", frame.sequence);
            }
            if recognized {
                self.cache.texts = recognize_or_empty(
                    self.recognizer.as_mut(),
                    &view,
                    self.settings.ocr_confidence_threshold,
                )
                .into_iter()
                .map(|candidate| candidate.content)
                .collect();
            }
        }
        let sequence = frame.sequence;
        drop(frame);

        let event =
            self.narrator
                .format_context(&self.cache.detections, &self.cache.texts, &self.language);

        let mut spoken = false;
        if let Some(speech) = event.speech.as_deref() {
            log::info!("narration ({}): {}", self.language, speech);
            spoken = match &self.speech {
                Some(worker) => worker.speak(speech, &self.language, false),
                None => false,
            };
            self.spoken += 1;
        }

        let published = event.admitted || cycle % throttle.publish_every_n_frames == 0;
        if published {
            self.publish(&event);
        }

        Some(CycleReport {
            sequence,
            detected,
            recognized,
            event,
            spoken,
            published,
        })
    }

    fn capture_failed(&mut self, reason: String) {
        self.consecutive_failures += 1;
        self.failed_captures += 1;
        log::warn!(
            "frame capture failed ({} in a row): {}",
            self.consecutive_failures,
            reason
        );
    }

    fn sync_dashboard(&mut self) {
        let Some(state) = &self.dashboard else {
            return;
        };
        let requested = state.language();
        if requested != self.language {
            log::info!("language changed {} -> {}", self.language, requested);
            if let Some(worker) = &self.speech {
                let dropped = worker.clear();
                if dropped > 0 {
                    log::info!("dropped {} queued sentences in {}", dropped, self.language);
                }
            }
            self.language = requested;
        }
        let resets = state.resets();
        if resets != self.seen_resets {
            self.seen_resets = resets;
            self.narrator.reset_cooldowns();
        }
    }

    fn publish(&self, event: &NarrationEvent) {
        for sink in &self.sinks {
            match sink.publish(event) {
                PushOutcome::Sent => {}
                PushOutcome::Dropped => {
                    log::debug!("{} sink busy; record dropped", sink.name())
                }
                PushOutcome::Failed(err) => {
                    log::warn!("{} sink failed: {}", sink.name(), err)
                }
            }
        }
    }

    fn log_health(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let stats = self.source.stats();
        let speech = self.speech.as_ref().map(SpeechWorker::stats);
        log::info!(
            "camera health={} frames={} missed={} url={} spoken={} speech_dropped={} cooldowns={}",
            self.source.is_healthy(),
            stats.frames_captured,
            stats.frames_missed,
            stats.url,
            self.spoken,
            speech.map_or(0, |s| s.dropped),
            self.narrator.cooldown_entries()
        );
        self.last_health_log = Instant::now();
    }

    fn teardown(&mut self) {
        log::info!("shutting down pipeline");
        self.source.release();
        if let Some(worker) = self.speech.take() {
            if let Err(err) = worker.stop(self.settings.speech_stop_timeout) {
                log::warn!("speech worker did not stop cleanly: {}", err);
            }
        }
        self.narrator.reset_cooldowns();
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
