//! perceptad - Percepta narration daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera source
//! 2. Runs detection and text recognition on a throttled schedule
//! 3. Narrates the most urgent hazard and important text, with cooldown
//! 4. Speaks through the speech worker (external TTS program or log only)
//! 5. Serves the dashboard API and optionally pushes to a remote dashboard

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use percepta::config::PerceptaConfig;
use percepta::dashboard::{ApiConfig, ApiServer, DashboardState, HttpPublisher};
use percepta::detect::{DetectorBackend, ScriptedBackend, StubBackend, TextRecognizer};
use percepta::narrate::{Language, Narrator};
use percepta::speech::{CommandBackend, LogBackend, SpeechBackend, SpeechWorker};
use percepta::{CameraSource, Pipeline, PipelineSettings};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (.toml or .json). Overrides PERCEPTA_CONFIG.
    #[arg(long, env = "PERCEPTA_CONFIG")]
    config: Option<PathBuf>,
    /// Narration language code (e.g. en, hi).
    #[arg(long)]
    language: Option<String>,
    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Skip the startup announcement.
    #[arg(long)]
    no_intro: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PerceptaConfig::load_from(args.config.as_deref())?;
    if let Some(code) = &args.language {
        cfg.narration.language = Language::parse(code)?;
    }
    if args.no_intro {
        cfg.speech.intro = false;
    }
    log::info!(
        "perceptad {} starting: camera={} language={} cooldown={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.url,
        cfg.narration.language,
        cfg.narration.cooldown
    );
    log::info!(
        "throttle: detect every {} / ocr every {} / publish every {} frames",
        cfg.throttle.detect_every_n_frames,
        cfg.throttle.ocr_every_n_frames,
        cfg.throttle.publish_every_n_frames
    );

    let narrator = Narrator::new(&cfg.narrator_settings())?;
    for language in std::iter::once(&cfg.narration.language).chain(&cfg.speech.alternate_languages) {
        if !narrator.phrases().has_language(language) {
            log::warn!("no phrase pack for '{}'; falling back to english", language);
        }
    }

    let camera = CameraSource::new(cfg.camera_config())?;
    let (detector, recognizer) = perception_backends(camera.script_path())?;

    let primary: Box<dyn SpeechBackend> = match &cfg.speech.command {
        Some(argv) => Box::new(CommandBackend::from_argv(argv)?),
        None => {
            log::warn!("no speech command configured; narration is logged only");
            Box::new(LogBackend)
        }
    };
    let alternate: Option<Box<dyn SpeechBackend>> = match &cfg.speech.alternate_command {
        Some(argv) => Some(Box::new(CommandBackend::from_argv(argv)?)),
        None => None,
    };
    let speech = SpeechWorker::spawn(primary, alternate, cfg.speech_worker_config())?;

    let state = Arc::new(DashboardState::new(cfg.narration.language.clone()));
    let mut pipeline = Pipeline::new(
        Box::new(camera),
        detector,
        recognizer,
        narrator,
        PipelineSettings::from_config(&cfg),
    )
    .with_speech(speech);

    let api_handle = if cfg.dashboard.enabled {
        let handle = ApiServer::new(
            ApiConfig {
                addr: cfg.dashboard.addr.clone(),
            },
            state.clone(),
        )
        .spawn()?;
        pipeline = pipeline
            .with_dashboard(state.clone())
            .with_sink(Box::new(state.clone()));
        Some(handle)
    } else {
        None
    };
    if let Some(url) = &cfg.dashboard.push_url {
        let publisher = HttpPublisher::spawn(url, cfg.dashboard.push_timeout)?;
        pipeline = pipeline.with_sink(Box::new(publisher));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("perceptad running (Ctrl-C to stop)");
    let summary = pipeline.run(&shutdown, args.max_frames)?;
    log::info!(
        "perceptad stopped: frames={} spoken={} failed_captures={}",
        summary.frames,
        summary.spoken,
        summary.failed_captures
    );

    if let Some(handle) = api_handle {
        handle.stop()?;
    }
    Ok(())
}

fn perception_backends(
    script_path: Option<&str>,
) -> Result<(Box<dyn DetectorBackend>, Box<dyn TextRecognizer>)> {
    match script_path {
        Some(path) => {
            let script = ScriptedBackend::load(Path::new(path))?;
            log::info!("replaying scene script {} ({} steps)", path, script.len());
            Ok((Box::new(script.clone()), Box::new(script)))
        }
        None => {
            log::warn!("no perception model attached; using stub backends");
            Ok((Box::new(StubBackend::new()), Box::new(StubBackend::new())))
        }
    }
}
