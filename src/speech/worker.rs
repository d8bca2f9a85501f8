use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::backend::SpeechBackend;
use crate::narrate::Language;

/// Pending requests tolerated before the queue is flushed.
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

#[derive(Clone, Debug)]
pub struct SpeechWorkerConfig {
    /// When more than this many requests are pending, they are all dropped
    /// before the newest one is queued.
    pub queue_depth: usize,
    /// Languages routed to the alternate backend when one is installed.
    pub alternate_languages: Vec<Language>,
    /// Upper bound for `speak(.., blocking = true)`.
    pub blocking_timeout: Duration,
}

impl Default for SpeechWorkerConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            alternate_languages: Vec::new(),
            blocking_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpeechStats {
    pub spoken: u64,
    pub failed: u64,
    pub dropped: u64,
    pub pending: usize,
}

struct SpeechRequest {
    text: String,
    language: Language,
}

enum Job {
    Speak(SpeechRequest),
    Shutdown,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    speaking: bool,
    stopping: bool,
    stats: SpeechStats,
}

impl QueueState {
    fn pending(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| matches!(job, Job::Speak(_)))
            .count()
    }

    fn drop_pending(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| matches!(job, Job::Shutdown));
        let dropped = before - self.jobs.len();
        self.stats.dropped += dropped as u64;
        dropped
    }
}

struct Shared {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serial speech output on a dedicated thread.
///
/// Requests carry their own language, so the worker never reads the
/// pipeline's language state.
pub struct SpeechWorker {
    shared: Arc<Shared>,
    config: SpeechWorkerConfig,
    join: Option<JoinHandle<()>>,
}

impl SpeechWorker {
    pub fn spawn(
        primary: Box<dyn SpeechBackend>,
        alternate: Option<Box<dyn SpeechBackend>>,
        config: SpeechWorkerConfig,
    ) -> Result<Self> {
        if config.queue_depth == 0 {
            return Err(anyhow!("speech queue depth must be at least 1"));
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
        });
        let mut backends = Backends {
            primary,
            alternate,
            alternate_languages: config.alternate_languages.clone(),
        };
        log::info!(
            "speech worker starting (primary={}, alternate={})",
            backends.primary.name(),
            backends.alternate.as_ref().map_or("none", |b| b.name())
        );
        let worker_shared = shared.clone();
        let join = std::thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || run_worker(&worker_shared, &mut backends))?;
        Ok(Self {
            shared,
            config,
            join: Some(join),
        })
    }

    /// Queue a sentence. Returns false when nothing was queued (blank text or
    /// the worker is stopping). With `blocking`, waits until the queue drains
    /// and playback ends, up to the configured timeout.
    pub fn speak(&self, text: &str, language: &Language, blocking: bool) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return false;
            }
            let pending = state.pending();
            if pending > self.config.queue_depth {
                log::warn!("speech queue has {} items, clearing", pending);
                state.drop_pending();
            }
            log::debug!("queueing speech ({}): {}", language, text);
            state.jobs.push_back(Job::Speak(SpeechRequest {
                text: text.to_string(),
                language: language.clone(),
            }));
            self.shared.changed.notify_all();
        }
        if blocking && !self.wait_idle(self.config.blocking_timeout) {
            log::warn!(
                "speech still busy after {:?}; continuing",
                self.config.blocking_timeout
            );
        }
        true
    }

    /// Wait until nothing is queued or playing. False on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while state.speaking || state.pending() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Drop everything not yet spoken.
    pub fn clear(&self) -> usize {
        let mut state = self.shared.lock();
        let dropped = state.drop_pending();
        self.shared.changed.notify_all();
        dropped
    }

    pub fn stats(&self) -> SpeechStats {
        let state = self.shared.lock();
        SpeechStats {
            pending: state.pending(),
            ..state.stats
        }
    }

    /// Queue the shutdown sentinel behind pending requests and join the thread
    /// for at most `timeout`. A thread still busy after that is detached and
    /// whatever it had left is lost.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.send_shutdown();
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;
        while !join.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("speech worker still busy after {:?}; detaching", timeout);
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        join.join()
            .map_err(|_| anyhow!("speech worker thread panicked"))?;
        log::info!("speech worker stopped");
        Ok(())
    }

    fn send_shutdown(&self) {
        let mut state = self.shared.lock();
        if state.stopping {
            return;
        }
        state.stopping = true;
        state.jobs.push_back(Job::Shutdown);
        self.shared.changed.notify_all();
    }
}

impl Drop for SpeechWorker {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.send_shutdown();
        }
    }
}

struct Backends {
    primary: Box<dyn SpeechBackend>,
    alternate: Option<Box<dyn SpeechBackend>>,
    alternate_languages: Vec<Language>,
}

impl Backends {
    fn speak(&mut self, request: &SpeechRequest) -> bool {
        if self.alternate_languages.contains(&request.language) {
            if let Some(alternate) = self.alternate.as_mut() {
                if alternate.speak(&request.text, &request.language) {
                    return true;
                }
                log::warn!(
                    "{} speech failed for '{}', falling back to {}",
                    alternate.name(),
                    request.language,
                    self.primary.name()
                );
            }
        }
        self.primary.speak(&request.text, &request.language)
    }
}

fn run_worker(shared: &Shared, backends: &mut Backends) {
    loop {
        let request = {
            let mut state = shared.lock();
            loop {
                match state.jobs.pop_front() {
                    Some(Job::Speak(request)) => {
                        state.speaking = true;
                        break request;
                    }
                    Some(Job::Shutdown) => return,
                    None => {
                        state = shared
                            .changed
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                }
            }
        };

        log::info!("speaking ({}): {}", request.language, request.text);
        let ok = backends.speak(&request);
        if !ok {
            log::warn!("speech failed ({}): {}", request.language, request.text);
        }

        let mut state = shared.lock();
        state.speaking = false;
        if ok {
            state.stats.spoken += 1;
        } else {
            state.stats.failed += 1;
        }
        shared.changed.notify_all();
    }
}
