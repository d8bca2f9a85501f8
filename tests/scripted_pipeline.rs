use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;

use percepta::narrate::{Language, Narrator, NarratorSettings};
use percepta::speech::{SpeechBackend, SpeechWorker, SpeechWorkerConfig};
use percepta::{
    CameraConfig, CameraSource, DashboardState, Pipeline, PipelineSettings, ScriptedBackend,
};

#[derive(Clone, Default)]
struct Transcript(Arc<Mutex<Vec<(String, String)>>>);

impl Transcript {
    fn lines(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl SpeechBackend for Transcript {
    fn name(&self) -> &'static str {
        "transcript"
    }

    fn speak(&mut self, text: &str, language: &Language) -> bool {
        self.0
            .lock()
            .unwrap()
            .push((language.to_string(), text.to_string()));
        true
    }
}

const SCENE: &str = r#"[
    {"objects": [{"class": "car", "confidence": 0.95,
                  "bbox": {"x": 0, "y": 120, "w": 640, "h": 360}}],
     "texts": [{"content": "STOP", "confidence": 0.9}]},
    {"objects": [{"class": "handbag", "confidence": 0.9,
                  "bbox": {"x": 10, "y": 10, "w": 30, "h": 30}}]},
    {"objects": [{"class": "car", "confidence": 0.95,
                  "bbox": {"x": 0, "y": 120, "w": 640, "h": 360}}]}
]"#;

fn scene_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("scene file");
    file.write_all(SCENE.as_bytes()).expect("write scene");
    file
}

#[test]
fn scripted_scene_runs_end_to_end() {
    let scene = scene_file();
    let camera = CameraSource::new(CameraConfig {
        url: format!("scripted://{}", scene.path().display()),
        ..CameraConfig::default()
    })
    .unwrap();
    let script = ScriptedBackend::load(scene.path()).unwrap();
    assert_eq!(script.len(), 3);

    let transcript = Transcript::default();
    let speech = SpeechWorker::spawn(
        Box::new(transcript.clone()),
        None,
        SpeechWorkerConfig::default(),
    )
    .unwrap();
    let state = Arc::new(DashboardState::default());

    let mut pipeline = Pipeline::new(
        Box::new(camera),
        Box::new(script.clone()),
        Box::new(script),
        Narrator::new(&NarratorSettings::default()).unwrap(),
        PipelineSettings {
            frame_interval: Duration::ZERO,
            intro_timeout: Some(Duration::from_secs(5)),
            ..PipelineSettings::default()
        },
    )
    .with_speech(speech)
    .with_dashboard(state.clone())
    .with_sink(Box::new(state.clone()));

    let summary = pipeline.run(&AtomicBool::new(false), Some(3)).unwrap();
    assert_eq!(summary.frames, 3);

    // run() joins the speech worker behind its queue
    let lines = transcript.lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], ("en".to_string(), "Percepta started".to_string()));
    assert_eq!(lines[1].1, "WARNING! CAR DETECTED!. Sign reads: STOP.");
    assert_eq!(lines[2].1, "Sign reads: STOP.");
    assert!(lines.iter().all(|(language, _)| language == "en"));

    // frame 3 repeats frame 1's car but the OCR result is cached, so it is
    // the same sentence and stays suppressed
    assert_eq!(summary.spoken, 2);

    let latest = state.latest();
    assert!(state.has_data());
    assert_eq!(latest.text, vec!["STOP"]);
}

#[test]
fn unsupported_camera_url_is_rejected() {
    let err = CameraSource::new(CameraConfig {
        url: "rtsp://10.0.0.9/stream".to_string(),
        ..CameraConfig::default()
    })
    .err()
    .expect("rtsp is not supported");
    assert!(err.to_string().contains("unsupported camera url"));
}
