use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::narrate::{Language, NarrationEvent};

/// Answer of `GET /status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardStatus {
    pub status: &'static str,
    pub has_data: bool,
    pub language: Language,
    pub updates: u64,
}

#[derive(Debug)]
struct Slot {
    latest: Option<NarrationEvent>,
    language: Language,
    updates: u64,
    resets: u64,
}

/// Latest narration record plus the requested language.
///
/// Single slot, last write wins, no history. Shared between the HTTP server
/// thread and the pipeline behind an `Arc`.
#[derive(Debug)]
pub struct DashboardState {
    slot: Mutex<Slot>,
}

impl DashboardState {
    pub fn new(language: Language) -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                language,
                updates: 0,
                resets: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest record, or the empty record tagged with the current language.
    pub fn latest(&self) -> NarrationEvent {
        let slot = self.lock();
        slot.latest
            .clone()
            .unwrap_or_else(|| NarrationEvent::empty(slot.language.clone()))
    }

    pub fn has_data(&self) -> bool {
        self.lock().latest.is_some()
    }

    pub fn update(&self, event: NarrationEvent) {
        let mut slot = self.lock();
        slot.latest = Some(event);
        slot.updates += 1;
    }

    /// Empty the slot. Bumps the reset counter the pipeline watches to clear
    /// its cooldowns.
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.latest = None;
        slot.resets += 1;
        log::info!("dashboard state reset");
    }

    pub fn resets(&self) -> u64 {
        self.lock().resets
    }

    pub fn updates(&self) -> u64 {
        self.lock().updates
    }

    pub fn language(&self) -> Language {
        self.lock().language.clone()
    }

    /// Returns true when the language actually changed.
    pub fn set_language(&self, language: Language) -> bool {
        let mut slot = self.lock();
        if slot.language == language {
            return false;
        }
        log::info!("dashboard language {} -> {}", slot.language, language);
        slot.language = language;
        true
    }

    pub fn status(&self) -> DashboardStatus {
        let slot = self.lock();
        DashboardStatus {
            status: "ok",
            has_data: slot.latest.is_some(),
            language: slot.language.clone(),
            updates: slot.updates,
        }
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(Language::english())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(speech: &str) -> NarrationEvent {
        NarrationEvent {
            speech: Some(speech.to_string()),
            timestamp: Some(1.0),
            ..NarrationEvent::empty(Language::english())
        }
    }

    #[test]
    fn last_write_wins() {
        let state = DashboardState::default();
        state.update(event("Door ahead."));
        state.update(event("Person ahead."));
        assert_eq!(state.latest().speech.as_deref(), Some("Person ahead."));
        assert_eq!(state.updates(), 2);
    }

    #[test]
    fn reset_returns_empty_record_in_current_language() {
        let state = DashboardState::default();
        state.update(event("Door ahead."));
        state.set_language(Language::parse("hi").unwrap());
        state.reset();

        assert!(!state.has_data());
        assert_eq!(state.resets(), 1);
        let latest = state.latest();
        assert_eq!(latest.speech, None);
        assert_eq!(latest.language.code(), "hi");
    }

    #[test]
    fn set_language_reports_changes_only() {
        let state = DashboardState::default();
        assert!(!state.set_language(Language::english()));
        assert!(state.set_language(Language::parse("hi").unwrap()));
        assert_eq!(state.status().language.code(), "hi");
    }
}
