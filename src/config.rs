use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::{CameraConfig, MAX_FRAME_DIMENSION};
use crate::narrate::{Language, NarratorSettings, DEFAULT_CONFIDENCE_FLOOR, DEFAULT_LANGUAGE};
use crate::speech::{SpeechWorkerConfig, DEFAULT_QUEUE_DEPTH};

const DEFAULT_CAMERA_URL: &str = "stub://front";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECT_EVERY_N: u64 = 1;
const DEFAULT_OCR_EVERY_N: u64 = 60;
const DEFAULT_PUBLISH_EVERY_N: u64 = 20;
const DEFAULT_OCR_THRESHOLD: f32 = 0.5;
const DEFAULT_COOLDOWN_SECS: f64 = 5.0;
const DEFAULT_ALTERNATE_LANGUAGES: &[&str] = &["hi"];
const DEFAULT_INTRO_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 2;
const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_PUSH_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Deserialize, Default)]
struct PerceptaConfigFile {
    camera: Option<CameraConfigFile>,
    throttle: Option<ThrottleConfigFile>,
    perception: Option<PerceptionConfigFile>,
    narration: Option<NarrationConfigFile>,
    speech: Option<SpeechConfigFile>,
    dashboard: Option<DashboardConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThrottleConfigFile {
    detect_every_n_frames: Option<u64>,
    ocr_every_n_frames: Option<u64>,
    publish_every_n_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PerceptionConfigFile {
    detection_confidence_floor: Option<f32>,
    ocr_confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct NarrationConfigFile {
    cooldown_secs: Option<f64>,
    language: Option<String>,
    phrases_path: Option<PathBuf>,
    classes_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    queue_depth: Option<usize>,
    command: Option<Vec<String>>,
    alternate_command: Option<Vec<String>>,
    alternate_languages: Option<Vec<String>>,
    intro: Option<bool>,
    intro_timeout_secs: Option<u64>,
    stop_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigFile {
    addr: Option<String>,
    enabled: Option<bool>,
    push_url: Option<String>,
    push_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PerceptaConfig {
    pub camera: CameraSettings,
    pub throttle: ThrottleSettings,
    pub perception: PerceptionSettings,
    pub narration: NarrationSettings,
    pub speech: SpeechSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Run a stage on every Nth frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub detect_every_n_frames: u64,
    pub ocr_every_n_frames: u64,
    pub publish_every_n_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionSettings {
    pub detection_confidence_floor: f32,
    pub ocr_confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct NarrationSettings {
    pub cooldown: Duration,
    pub language: Language,
    pub phrases_path: Option<PathBuf>,
    pub classes_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub queue_depth: usize,
    pub command: Option<Vec<String>>,
    pub alternate_command: Option<Vec<String>>,
    pub alternate_languages: Vec<Language>,
    pub intro: bool,
    pub intro_timeout: Duration,
    pub stop_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub addr: String,
    pub enabled: bool,
    /// Remote dashboard receiving records. Outbound only: its language and
    /// reset routes do not reach this daemon.
    pub push_url: Option<String>,
    pub push_timeout: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            detect_every_n_frames: DEFAULT_DETECT_EVERY_N,
            ocr_every_n_frames: DEFAULT_OCR_EVERY_N,
            publish_every_n_frames: DEFAULT_PUBLISH_EVERY_N,
        }
    }
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            detection_confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            ocr_confidence_threshold: DEFAULT_OCR_THRESHOLD,
        }
    }
}

impl PerceptaConfig {
    /// Read the file named by `PERCEPTA_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PERCEPTA_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit file taking the place of `PERCEPTA_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PerceptaConfigFile) -> Result<Self> {
        let camera = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            url: camera.url.unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let throttle = file.throttle.unwrap_or_default();
        let throttle = ThrottleSettings {
            detect_every_n_frames: throttle
                .detect_every_n_frames
                .unwrap_or(DEFAULT_DETECT_EVERY_N),
            ocr_every_n_frames: throttle.ocr_every_n_frames.unwrap_or(DEFAULT_OCR_EVERY_N),
            publish_every_n_frames: throttle
                .publish_every_n_frames
                .unwrap_or(DEFAULT_PUBLISH_EVERY_N),
        };

        let perception = file.perception.unwrap_or_default();
        let perception = PerceptionSettings {
            detection_confidence_floor: perception
                .detection_confidence_floor
                .unwrap_or(DEFAULT_CONFIDENCE_FLOOR),
            ocr_confidence_threshold: perception
                .ocr_confidence_threshold
                .unwrap_or(DEFAULT_OCR_THRESHOLD),
        };

        let narration = file.narration.unwrap_or_default();
        let narration = NarrationSettings {
            cooldown: cooldown_from_secs(narration.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS))?,
            language: Language::parse(
                narration.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
            )?,
            phrases_path: narration.phrases_path,
            classes_path: narration.classes_path,
        };

        let speech = file.speech.unwrap_or_default();
        let alternate_languages = match speech.alternate_languages {
            Some(codes) => codes
                .iter()
                .map(|code| Language::parse(code))
                .collect::<Result<Vec<_>>>()?,
            None => DEFAULT_ALTERNATE_LANGUAGES
                .iter()
                .map(|code| Language::parse(code))
                .collect::<Result<Vec<_>>>()?,
        };
        let speech = SpeechSettings {
            queue_depth: speech.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
            command: speech.command,
            alternate_command: speech.alternate_command,
            alternate_languages,
            intro: speech.intro.unwrap_or(true),
            intro_timeout: Duration::from_secs(
                speech
                    .intro_timeout_secs
                    .unwrap_or(DEFAULT_INTRO_TIMEOUT_SECS),
            ),
            stop_timeout: Duration::from_secs(
                speech.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            ),
        };

        let dashboard = file.dashboard.unwrap_or_default();
        let dashboard = DashboardSettings {
            addr: dashboard
                .addr
                .unwrap_or_else(|| DEFAULT_DASHBOARD_ADDR.to_string()),
            enabled: dashboard.enabled.unwrap_or(true),
            push_url: dashboard.push_url.filter(|url| !url.trim().is_empty()),
            push_timeout: Duration::from_millis(
                dashboard.push_timeout_ms.unwrap_or(DEFAULT_PUSH_TIMEOUT_MS),
            ),
        };

        Ok(Self {
            camera,
            throttle,
            perception,
            narration,
            speech,
            dashboard,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PERCEPTA_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(language) = std::env::var("PERCEPTA_LANGUAGE") {
            if !language.trim().is_empty() {
                self.narration.language = Language::parse(&language)?;
            }
        }
        if let Ok(cooldown) = std::env::var("PERCEPTA_COOLDOWN_SECS") {
            let seconds: f64 = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("PERCEPTA_COOLDOWN_SECS must be a number of seconds"))?;
            self.narration.cooldown = cooldown_from_secs(seconds)?;
        }
        if let Ok(addr) = std::env::var("PERCEPTA_DASHBOARD_ADDR") {
            if !addr.trim().is_empty() {
                self.dashboard.addr = addr;
            }
        }
        if let Ok(url) = std::env::var("PERCEPTA_PUSH_URL") {
            if !url.trim().is_empty() {
                self.dashboard.push_url = Some(url);
            }
        }
        if let Ok(every) = std::env::var("PERCEPTA_OCR_EVERY_N") {
            self.throttle.ocr_every_n_frames = every
                .trim()
                .parse()
                .map_err(|_| anyhow!("PERCEPTA_OCR_EVERY_N must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, value) in [
            ("detect_every_n_frames", self.throttle.detect_every_n_frames),
            ("ocr_every_n_frames", self.throttle.ocr_every_n_frames),
            ("publish_every_n_frames", self.throttle.publish_every_n_frames),
        ] {
            if value == 0 {
                return Err(anyhow!("{} must be at least 1", name));
            }
        }
        for (name, value) in [
            (
                "detection_confidence_floor",
                self.perception.detection_confidence_floor,
            ),
            (
                "ocr_confidence_threshold",
                self.perception.ocr_confidence_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be non-zero"));
        }
        if self.camera.width > MAX_FRAME_DIMENSION || self.camera.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "camera width and height must be at most {}",
                MAX_FRAME_DIMENSION
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be at least 1"));
        }
        if self.speech.queue_depth == 0 {
            return Err(anyhow!("speech queue_depth must be at least 1"));
        }
        for (name, command) in [
            ("command", &self.speech.command),
            ("alternate_command", &self.speech.alternate_command),
        ] {
            if let Some(argv) = command {
                if argv.first().map_or(true, |program| program.trim().is_empty()) {
                    return Err(anyhow!("speech {} must name a program", name));
                }
            }
        }
        if let Some(push_url) = &self.dashboard.push_url {
            let parsed = url::Url::parse(push_url)
                .map_err(|e| anyhow!("invalid dashboard push_url '{}': {}", push_url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "dashboard push_url must use http or https, got '{}'",
                    parsed.scheme()
                ));
            }
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            url: self.camera.url.clone(),
            target_fps: self.camera.target_fps,
            width: self.camera.width,
            height: self.camera.height,
            frame_limit: None,
        }
    }

    pub fn narrator_settings(&self) -> NarratorSettings {
        NarratorSettings {
            confidence_floor: self.perception.detection_confidence_floor,
            cooldown: self.narration.cooldown,
            classes_path: self.narration.classes_path.clone(),
            phrases_path: self.narration.phrases_path.clone(),
        }
    }

    pub fn speech_worker_config(&self) -> SpeechWorkerConfig {
        SpeechWorkerConfig {
            queue_depth: self.speech.queue_depth,
            alternate_languages: self.speech.alternate_languages.clone(),
            blocking_timeout: self.speech.intro_timeout,
        }
    }
}

fn cooldown_from_secs(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!("cooldown_secs must be greater than zero"));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn read_config_file(path: &Path) -> Result<PerceptaConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let cfg = PerceptaConfig::from_file(PerceptaConfigFile::default()).unwrap();
        assert_eq!(cfg.camera.url, DEFAULT_CAMERA_URL);
        assert_eq!(cfg.throttle, ThrottleSettings::default());
        assert_eq!(cfg.narration.cooldown, Duration::from_secs(5));
        assert_eq!(cfg.narration.language, Language::english());
        assert_eq!(cfg.speech.alternate_languages, vec![Language::parse("hi").unwrap()]);
        assert!(cfg.speech.intro);
        assert!(cfg.dashboard.enabled);
        assert_eq!(cfg.dashboard.push_url, None);
    }

    #[test]
    fn zero_throttle_is_rejected() {
        let mut cfg = PerceptaConfig::from_file(PerceptaConfigFile::default()).unwrap();
        cfg.throttle.ocr_every_n_frames = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_cooldown_is_rejected() {
        assert!(cooldown_from_secs(0.0).is_err());
        assert!(cooldown_from_secs(f64::NAN).is_err());
        assert_eq!(cooldown_from_secs(0.5).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn push_url_must_be_http() {
        let mut cfg = PerceptaConfig::from_file(PerceptaConfigFile::default()).unwrap();
        cfg.dashboard.push_url = Some("mqtt://broker/update".to_string());
        assert!(cfg.validate().is_err());
        cfg.dashboard.push_url = Some("http://10.0.0.5:5000/update".to_string());
        assert!(cfg.validate().is_ok());
    }
}
