use std::sync::Arc;

use crate::narrate::language::Language;
use crate::narrate::phrases::{PhraseBook, Register};
use crate::narrate::policy::ClassPolicy;
use crate::narrate::urgency::AnnotatedDetection;

/// Urgency at which the primary hazard is narrated in the alarm register.
/// Empirical; not derived from the scoring formula.
pub const CRITICAL_URGENCY: f32 = 5.0;
/// Distance under which the primary hazard is narrated in the alarm register.
pub const VERY_CLOSE_DISTANCE: f32 = 0.3;
/// Secondary detections are mentioned when at least this share of the primary urgency.
pub const COMPANION_URGENCY_RATIO: f32 = 0.7;
/// Secondary detections considered after the primary one.
const MAX_COMPANIONS: usize = 2;
/// Texts read out per sentence.
pub const SPOKEN_TEXT_LIMIT: usize = 2;

/// Text containing any of these is announced as a sign rather than plain text.
pub const SIGNAGE_KEYWORDS: &[&str] = &["exit", "emergency", "danger", "warning", "caution", "stop"];

/// Register the primary detection is narrated in.
pub fn register_for(primary: &AnnotatedDetection) -> Register {
    let is_critical = primary.urgency >= CRITICAL_URGENCY;
    let is_very_close = primary.distance < VERY_CLOSE_DISTANCE;
    if is_critical || is_very_close {
        Register::Alarm
    } else {
        Register::Neutral
    }
}

/// Builds one spoken sentence from the prioritized detections and texts.
#[derive(Clone, Debug)]
pub struct NarrationGenerator {
    phrases: Arc<PhraseBook>,
    policy: Arc<ClassPolicy>,
}

impl NarrationGenerator {
    pub fn new(phrases: Arc<PhraseBook>, policy: Arc<ClassPolicy>) -> Self {
        Self { phrases, policy }
    }

    pub fn phrases(&self) -> &PhraseBook {
        &self.phrases
    }

    /// `None` when there is nothing to say.
    pub fn generate(
        &self,
        prioritized: &[AnnotatedDetection],
        important_texts: &[String],
        language: &Language,
    ) -> Option<String> {
        if prioritized.is_empty() && important_texts.is_empty() {
            return None;
        }

        let mut fragments = Vec::new();

        if let Some((primary, rest)) = prioritized.split_first() {
            let category = self.policy.category(primary.class_name());
            fragments.push(self.phrases.object_phrase(
                register_for(primary),
                category,
                primary.class_name(),
                language,
            ));

            let companion_floor = primary.urgency * COMPANION_URGENCY_RATIO;
            fragments.extend(
                rest.iter()
                    .take(MAX_COMPANIONS)
                    .filter(|d| d.urgency >= companion_floor)
                    .map(|d| self.phrases.also_detected(d.class_name(), language)),
            );
        }

        if !important_texts.is_empty() {
            let signage = important_texts.iter().any(|text| {
                let lower = text.to_lowercase();
                SIGNAGE_KEYWORDS.iter().any(|kw| lower.contains(kw))
            });
            let spoken: Vec<&str> = important_texts
                .iter()
                .take(SPOKEN_TEXT_LIMIT)
                .map(String::as_str)
                .collect();
            fragments.push(
                self.phrases
                    .text_phrase(&spoken.join(", "), signage, language),
            );
        }

        if fragments.is_empty() {
            return None;
        }
        let sentence = fragments.join(". ");
        Some(format!("{}.", sentence.trim_end_matches('.')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, RawDetection};

    fn generator() -> NarrationGenerator {
        NarrationGenerator::new(
            Arc::new(PhraseBook::builtin().unwrap()),
            Arc::new(ClassPolicy::builtin()),
        )
    }

    fn annotated(class: &str, urgency: f32, distance: f32) -> AnnotatedDetection {
        AnnotatedDetection {
            detection: RawDetection::new(class, 0.9, BoundingBox::default()),
            priority: 3,
            distance,
            urgency,
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nothing_to_say() {
        assert_eq!(generator().generate(&[], &[], &Language::english()), None);
    }

    #[test]
    fn register_thresholds() {
        assert_eq!(register_for(&annotated("x", 5.0, 0.9)), Register::Alarm);
        assert_eq!(register_for(&annotated("x", 1.0, 0.29)), Register::Alarm);
        assert_eq!(register_for(&annotated("x", 4.99, 0.3)), Register::Neutral);
    }

    #[test]
    fn english_alarm_and_neutral_phrases() {
        let g = generator();
        let en = Language::english();
        let cases = [
            (annotated("stairs", 6.0, 0.5), "CAUTION! STAIRS AHEAD!."),
            (annotated("truck", 6.0, 0.5), "WARNING! TRUCK DETECTED!."),
            (annotated("person", 1.0, 0.1), "Person directly ahead."),
            (annotated("door", 5.5, 0.6), "Door immediately ahead."),
            (annotated("dog", 5.5, 0.6), "Caution! dog detected."),
            (annotated("person", 2.0, 0.6), "Person ahead."),
            (annotated("door", 2.0, 0.6), "Door ahead."),
            (annotated("chair", 2.0, 0.6), "Chair detected."),
            (annotated("stairs", 2.0, 0.6), "Stairs ahead."),
            (annotated("bench", 2.0, 0.6), "Bench detected."),
            (annotated("dining table", 2.0, 0.6), "Dining table ahead."),
        ];
        for (primary, expected) in cases {
            assert_eq!(g.generate(&[primary], &[], &en).as_deref(), Some(expected));
        }
    }

    #[test]
    fn companions_need_seventy_percent() {
        let g = generator();
        let objects = [
            annotated("car", 8.0, 0.2),
            annotated("person", 6.0, 0.4),
            annotated("dog", 5.5, 0.4),
        ];
        assert_eq!(
            g.generate(&objects, &[], &Language::english()).as_deref(),
            Some("WARNING! CAR DETECTED!. person detected.")
        );
    }

    #[test]
    fn signage_lead_in_and_two_text_limit() {
        let g = generator();
        let en = Language::english();
        assert_eq!(
            g.generate(&[], &texts(&["Room 204", "OPEN"]), &en).as_deref(),
            Some("Text reads: Room 204, OPEN.")
        );
        assert_eq!(
            g.generate(&[], &texts(&["Floor 2", "EMERGENCY EXIT", "STOP"]), &en)
                .as_deref(),
            Some("Sign reads: Floor 2, EMERGENCY EXIT.")
        );
    }

    #[test]
    fn hindi_uses_translated_tokens() {
        let g = generator();
        let hi = Language::parse("hi").unwrap();
        let speech = g
            .generate(&[annotated("stairs", 9.0, 0.1)], &texts(&["EXIT"]), &hi)
            .unwrap();
        assert_eq!(
            speech,
            "सावधान! सावधान! सीढ़ियाँ का पता चला!. साइन पर लिखा है: EXIT."
        );
    }

    #[test]
    fn close_escalator_is_named_in_every_language() {
        let g = generator();
        let escalator = [annotated("escalator", 7.2, 0.2)];
        assert_eq!(
            g.generate(&escalator, &[], &Language::english()).as_deref(),
            Some("CAUTION! ESCALATOR AHEAD!.")
        );
        assert_eq!(
            g.generate(&escalator, &[], &Language::parse("hi").unwrap())
                .as_deref(),
            Some("सावधान! सावधान! एस्केलेटर का पता चला!.")
        );
    }

    #[test]
    fn hindi_neutral_furniture_phrases() {
        let g = generator();
        let hi = Language::parse("hi").unwrap();
        assert_eq!(
            g.generate(&[annotated("bench", 2.0, 0.6)], &[], &hi).as_deref(),
            Some("बेंच सामने.")
        );
        assert_eq!(
            g.generate(&[annotated("dining table", 2.0, 0.6)], &[], &hi)
                .as_deref(),
            Some("मेज़ सामने.")
        );
    }

    #[test]
    fn trailing_period_is_not_doubled() {
        let g = generator();
        assert_eq!(
            g.generate(&[], &texts(&["EXIT."]), &Language::english())
                .as_deref(),
            Some("Sign reads: EXIT.")
        );
    }
}
