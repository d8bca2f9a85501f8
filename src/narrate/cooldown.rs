use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default minimum time between two announcements with the same signature.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

const SIGNATURE_STOP_WORDS: &[&str] = &["detected", "text", "reads", "and", "the", "a", "an"];
const SIGNATURE_TOKENS: usize = 5;

/// Reduce a sentence to its dedup key.
///
/// Lower-cased tokens minus stop words, stripped of `.,!?`, first five kept,
/// then sorted. Different wordings of one hazard often collapse to the same
/// key, but neither merging nor separation is guaranteed.
pub fn signature(speech: &str) -> String {
    let lower = speech.to_lowercase();
    let mut tokens: Vec<&str> = lower
        .split_whitespace()
        .filter(|token| !SIGNATURE_STOP_WORDS.contains(token))
        .map(|token| token.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?')))
        .take(SIGNATURE_TOKENS)
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Suppresses repeats of the same announcement within a rolling window.
///
/// Owned by exactly one narrator; not shared across threads.
#[derive(Debug)]
pub struct CooldownGate {
    window: Duration,
    last_spoken: HashMap<String, Instant>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_spoken: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when `speech` may be announced now; records it if so.
    pub fn admit(&mut self, speech: Option<&str>) -> bool {
        self.admit_at(speech, Instant::now())
    }

    pub fn admit_at(&mut self, speech: Option<&str>, now: Instant) -> bool {
        let Some(speech) = speech else {
            return false;
        };
        self.purge(now);

        let key = signature(speech);
        if let Some(last) = self.last_spoken.get(&key) {
            if now.saturating_duration_since(*last) < self.window {
                log::debug!("cooldown active for '{}'", key);
                return false;
            }
        }
        self.last_spoken.insert(key, now);
        true
    }

    /// Forget everything older than twice the window.
    fn purge(&mut self, now: Instant) {
        let horizon = self.window * 2;
        self.last_spoken
            .retain(|_, last| now.saturating_duration_since(*last) <= horizon);
    }

    pub fn reset(&mut self) {
        self.last_spoken.clear();
        log::info!("cooldowns reset");
    }

    pub fn len(&self) -> usize {
        self.last_spoken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_spoken.is_empty()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn signature_drops_stop_words_and_punctuation() {
        assert_eq!(signature("Person detected ahead."), "ahead person");
        assert_eq!(signature("Text reads: EXIT."), "exit reads:");
    }

    #[test]
    fn punctuated_stop_words_survive() {
        // "detected!." is not the stop word "detected" until after stripping
        assert_eq!(
            signature("WARNING! CAR DETECTED!. person detected. dog detected."),
            "car detected detected person warning"
        );
    }

    #[test]
    fn signature_sorts_first_five_tokens_only() {
        assert_eq!(signature("f e d c b a"), "b c d e f");
    }

    #[test]
    fn repeat_inside_window_is_rejected() {
        let mut gate = CooldownGate::new(WINDOW);
        let t0 = Instant::now();
        assert!(gate.admit_at(Some("Person ahead."), t0));
        assert!(!gate.admit_at(Some("Person ahead."), t0 + Duration::from_secs(1)));
        // rejection does not refresh the timestamp
        assert!(gate.admit_at(Some("Person ahead."), t0 + Duration::from_secs(5)));
    }

    #[test]
    fn repeat_after_window_is_admitted() {
        let mut gate = CooldownGate::new(WINDOW);
        let t0 = Instant::now();
        assert!(gate.admit_at(Some("Door ahead."), t0));
        assert!(gate.admit_at(Some("Door ahead."), t0 + Duration::from_secs(6)));
    }

    #[test]
    fn none_is_never_admitted_and_changes_nothing() {
        let mut gate = CooldownGate::new(WINDOW);
        let t0 = Instant::now();
        gate.admit_at(Some("Chair detected."), t0);
        assert!(!gate.admit_at(None, t0 + Duration::from_secs(60)));
        assert_eq!(gate.len(), 1);
    }

    #[test]
    fn stale_entries_are_purged() {
        let mut gate = CooldownGate::new(WINDOW);
        let t0 = Instant::now();
        gate.admit_at(Some("Chair detected."), t0);
        gate.admit_at(Some("Door ahead."), t0 + Duration::from_secs(4));
        gate.admit_at(Some("Person ahead."), t0 + Duration::from_secs(11));
        assert_eq!(gate.len(), 2);

        gate.reset();
        assert!(gate.is_empty());
    }
}
