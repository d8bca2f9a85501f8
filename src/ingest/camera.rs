//! Camera frame source.
//!
//! `CameraSource` selects a backend from the URL scheme:
//! - `stub://<name>`: endless synthetic frames
//! - `scripted://<path>`: synthetic frames, one per step of a scene script,
//!   so perception can be replayed without a camera
//!
//! The source MUST NOT retain frames beyond handoff to the pipeline.

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::frame::Frame;

/// Largest accepted frame width or height in pixels.
pub const MAX_FRAME_DIMENSION: u32 = 8192;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL (e.g. "stub://front", "scripted://scenes/corridor.json").
    pub url: String,
    /// Target frame rate; the daemon paces its loop to this.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Stop producing frames after this many (None = unbounded).
    pub frame_limit: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://front".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            frame_limit: None,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, Default)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub frames_missed: u64,
    pub url: String,
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        if config.width > MAX_FRAME_DIMENSION || config.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "camera frame size {}x{} exceeds {} pixels per side",
                config.width,
                config.height,
                MAX_FRAME_DIMENSION
            ));
        }
        if config.url.starts_with("stub://") || config.url.starts_with("scripted://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            Err(anyhow!(
                "unsupported camera url '{}': expected stub:// or scripted://",
                config.url
            ))
        }
    }

    /// Scene script path for `scripted://` sources.
    pub fn script_path(&self) -> Option<&str> {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.config.url.strip_prefix("scripted://"),
        }
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.connected,
        }
    }

    fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub:// and scripted://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    missed: u64,
    connected: bool,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            missed: 0,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            self.missed += 1;
            return Err(anyhow!("camera {} not connected", self.config.url));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                self.missed += 1;
                return Ok(None);
            }
        }
        self.frame_count += 1;
        Ok(Some(Frame::new(
            self.generate_synthetic_pixels(),
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    /// Gradient that shifts with the frame counter.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn release(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!("CameraSource: released {}", self.config.url);
        }
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            frames_missed: self.missed,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_device_urls() {
        let err = CameraSource::new(CameraConfig {
            url: "/dev/video0".to_string(),
            ..CameraConfig::default()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("unsupported camera url"));
    }

    #[test]
    fn rejects_oversized_frames() {
        for (width, height) in [(100_000, 100_000), (640, MAX_FRAME_DIMENSION + 1)] {
            let result = CameraSource::new(CameraConfig {
                width,
                height,
                ..CameraConfig::default()
            });
            assert!(result.is_err(), "accepted {width}x{height}");
        }
        assert!(CameraSource::new(CameraConfig {
            width: MAX_FRAME_DIMENSION,
            height: 16,
            frame_limit: Some(1),
            ..CameraConfig::default()
        })
        .is_ok());
    }

    #[test]
    fn synthetic_source_numbers_frames_and_honours_limit() {
        let mut source = CameraSource::new(CameraConfig {
            width: 8,
            height: 6,
            frame_limit: Some(2),
            ..CameraConfig::default()
        })
        .unwrap();
        assert!(source.next_frame().is_err());
        source.connect().unwrap();

        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(first.byte_len(), 8 * 6 * 3);
        assert!(source.next_frame().unwrap().is_none());

        source.release();
        assert!(!source.is_healthy());
        let stats = source.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_missed, 2);
    }

    #[test]
    fn scripted_url_exposes_script_path() {
        let source = CameraSource::new(CameraConfig {
            url: "scripted://scenes/hall.json".to_string(),
            ..CameraConfig::default()
        })
        .unwrap();
        assert_eq!(source.script_path(), Some("scenes/hall.json"));
    }
}
