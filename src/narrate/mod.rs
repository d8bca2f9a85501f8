//! Attention and narration policy.
//!
//! One cycle runs, in order:
//! 1. `urgency`: score raw detections and rank them (`DetectionSet`)
//! 2. `prioritize`: keep the few detections worth narrating
//! 3. `text`: keep important OCR text
//! 4. `generator`: build one sentence in the active language
//! 5. `cooldown`: suppress the sentence if it was just said
//!
//! `Narrator` wires the steps together and owns the cooldown record.

pub mod cooldown;
pub mod generator;
pub mod language;
pub mod phrases;
pub mod policy;
pub mod prioritize;
pub mod text;
pub mod urgency;

pub use cooldown::{signature, CooldownGate, DEFAULT_COOLDOWN};
pub use generator::{register_for, NarrationGenerator, CRITICAL_URGENCY};
pub use language::{Language, DEFAULT_LANGUAGE};
pub use phrases::{LanguagePack, PhraseBook, Register};
pub use policy::{ClassCategory, ClassPolicy, ClassRule};
pub use urgency::{
    estimate_distance, AnnotatedDetection, DetectionSet, UrgencyScorer, DEFAULT_CONFIDENCE_FLOOR,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::RawDetection;

/// Objects reported per event.
pub const MAX_REPORTED_OBJECTS: usize = 5;

/// Object entry of a narration event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    pub priority: u8,
}

impl From<&AnnotatedDetection> for ObjectSummary {
    fn from(d: &AnnotatedDetection) -> Self {
        Self {
            class_name: d.detection.class_name.clone(),
            confidence: d.detection.confidence,
            priority: d.priority,
        }
    }
}

/// Output of one narration cycle; also the dashboard record.
///
/// A suppressed repeat has `speech == None` but keeps `objects` and `text`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrationEvent {
    #[serde(default)]
    pub objects: Vec<ObjectSummary>,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub speech: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub language: Language,
    /// Whether the cooldown gate let the sentence through.
    #[serde(default, skip_serializing)]
    pub admitted: bool,
}

impl NarrationEvent {
    /// Record shown before anything has been narrated.
    pub fn empty(language: Language) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }
}

/// Where the narrator's tables come from.
#[derive(Clone, Debug)]
pub struct NarratorSettings {
    pub confidence_floor: f32,
    pub cooldown: Duration,
    /// Extra or overriding class policies (JSON).
    pub classes_path: Option<PathBuf>,
    /// Extra or overriding phrase packs (JSON).
    pub phrases_path: Option<PathBuf>,
}

impl Default for NarratorSettings {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            cooldown: DEFAULT_COOLDOWN,
            classes_path: None,
            phrases_path: None,
        }
    }
}

pub struct Narrator {
    scorer: UrgencyScorer,
    generator: NarrationGenerator,
    gate: CooldownGate,
}

impl Narrator {
    pub fn new(settings: &NarratorSettings) -> Result<Self> {
        let policy = match &settings.classes_path {
            Some(path) => ClassPolicy::with_overrides_from(path)?,
            None => ClassPolicy::builtin(),
        };
        let mut phrases = PhraseBook::builtin()?;
        if let Some(path) = &settings.phrases_path {
            phrases.merge_from(path)?;
        }
        log::info!(
            "narrator ready: {} classes, languages [{}], cooldown {}s",
            policy.len(),
            phrases.languages().join(", "),
            settings.cooldown.as_secs_f32()
        );
        Ok(Self::with_tables(
            Arc::new(policy),
            Arc::new(phrases),
            settings.confidence_floor,
            settings.cooldown,
        ))
    }

    pub fn with_tables(
        policy: Arc<ClassPolicy>,
        phrases: Arc<PhraseBook>,
        confidence_floor: f32,
        cooldown: Duration,
    ) -> Self {
        Self {
            scorer: UrgencyScorer::new(policy.clone(), confidence_floor),
            generator: NarrationGenerator::new(phrases, policy),
            gate: CooldownGate::new(cooldown),
        }
    }

    pub fn phrases(&self) -> &PhraseBook {
        self.generator.phrases()
    }

    pub fn scorer(&self) -> &UrgencyScorer {
        &self.scorer
    }

    pub fn score_frame(
        &self,
        detections: &[RawDetection],
        frame_height: u32,
        frame_width: u32,
    ) -> DetectionSet {
        self.scorer
            .score_frame(detections, frame_height, frame_width)
    }

    /// Run prioritizer, text filter, generator and cooldown for one cycle.
    pub fn format_context(
        &mut self,
        detections: &DetectionSet,
        texts: &[String],
        language: &Language,
    ) -> NarrationEvent {
        self.format_context_at(detections, texts, language, Instant::now())
    }

    pub fn format_context_at(
        &mut self,
        detections: &DetectionSet,
        texts: &[String],
        language: &Language,
        now: Instant,
    ) -> NarrationEvent {
        let prioritized = prioritize::select(detections);
        let important = text::select(texts);
        let sentence = self.generator.generate(&prioritized, &important, language);
        let admitted = self.gate.admit_at(sentence.as_deref(), now);

        NarrationEvent {
            objects: prioritized
                .iter()
                .take(MAX_REPORTED_OBJECTS)
                .map(ObjectSummary::from)
                .collect(),
            text: important,
            speech: if admitted { sentence } else { None },
            timestamp: Some(crate::epoch_seconds()),
            language: language.clone(),
            admitted,
        }
    }

    /// Localized startup sentence.
    pub fn intro(&self, language: &Language) -> String {
        self.phrases().translate("started", language)
    }

    pub fn reset_cooldowns(&mut self) {
        self.gate.reset();
    }

    pub fn cooldown_entries(&self) -> usize {
        self.gate.len()
    }
}
