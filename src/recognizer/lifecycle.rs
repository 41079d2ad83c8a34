//! Shared init/close state machine for recognizer sources.
//!
//! Every `initialize` takes a ticket and every `close` invalidates it. A load
//! that finishes with a stale ticket is thrown away without firing its ready
//! callback, which is what lets `close` race an in-flight load without
//! blocking on it.

use super::signal::StateSignal;
use super::{ReadyCallback, Recognizer, RecognizerState};
use crate::error::{SayResult, SayboardError};
use crate::view::ErrorMessage;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

struct Slot {
    generation: u64,
    recognizer: Option<Arc<dyn Recognizer>>,
    // Close mode of the most recent close
    cache_allowed: bool,
}

pub struct SourceCore {
    name: String,
    id: String,
    state: StateSignal<RecognizerState>,
    slot: Mutex<Slot>,
    // Kept apart from the slot so state observers may read it
    error: Mutex<Option<ErrorMessage>>,
}

impl std::fmt::Debug for SourceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCore")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

impl SourceCore {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            state: StateSignal::new(RecognizerState::Uninitialized),
            slot: Mutex::new(Slot {
                generation: 0,
                recognizer: None,
                cache_allowed: true,
            }),
            error: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RecognizerState {
        self.state.get()
    }

    pub fn signal(&self) -> &StateSignal<RecognizerState> {
        &self.state
    }

    /// Enter Initializing and hand out the ticket for this load
    pub fn begin(&self) -> u64 {
        let mut slot = self.slot();
        slot.generation += 1;
        slot.recognizer = None;
        self.set_error(None);
        info!("⏳ Initializing recognizer '{}'", self.name);
        self.state.set(RecognizerState::Initializing);
        slot.generation
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.slot().generation == ticket
    }

    /// Publish a finished load. Returns false if the ticket went stale,
    /// in which case the recognizer is dropped and `on_ready` never fires.
    pub fn ready(
        &self,
        ticket: u64,
        recognizer: Arc<dyn Recognizer>,
        on_ready: ReadyCallback,
    ) -> bool {
        {
            let mut slot = self.slot();
            if slot.generation != ticket {
                debug!("Discarding stale load of '{}'", self.name);
                return false;
            }
            slot.recognizer = Some(recognizer);
            info!("✅ Recognizer '{}' ready", self.name);
            self.state.set(RecognizerState::Ready);
        }
        on_ready();
        true
    }

    /// Publish a failed load. Returns false if the ticket went stale.
    pub fn fail(&self, ticket: u64, message: ErrorMessage, err: &SayboardError) -> bool {
        let mut slot = self.slot();
        if slot.generation != ticket {
            debug!("Ignoring stale failure of '{}': {}", self.name, err);
            return false;
        }
        error!("❌ Recognizer '{}' failed to load: {}", self.name, err);
        slot.recognizer = None;
        self.set_error(Some(message));
        self.state.set(RecognizerState::Error);
        true
    }

    pub fn close(&self, weak: bool) {
        let mut slot = self.slot();
        slot.generation += 1;
        slot.recognizer = None;
        slot.cache_allowed = weak;
        if self.state.get() != RecognizerState::Closed {
            info!(
                "🛑 Closing recognizer '{}' ({})",
                self.name,
                if weak { "weak" } else { "strong" }
            );
            self.state.set(RecognizerState::Closed);
        }
    }

    /// Whether the last close allowed backends to keep caches
    pub fn cache_allowed(&self) -> bool {
        self.slot().cache_allowed
    }

    pub fn recognizer(&self) -> SayResult<Arc<dyn Recognizer>> {
        self.slot()
            .recognizer
            .clone()
            .ok_or_else(|| SayboardError::NotReady(self.name.clone()))
    }

    pub fn error_message(&self) -> Option<ErrorMessage> {
        *self.error.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_error(&self, message: Option<ErrorMessage>) {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::Decoded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Silent;

    impl Recognizer for Silent {
        fn sample_rate(&self) -> u32 {
            16000
        }
        fn accept_waveform(&self, _samples: &[i16]) -> SayResult<Decoded> {
            Ok(Decoded::Nothing)
        }
        fn final_result(&self) -> SayResult<Option<String>> {
            Ok(None)
        }
        fn reset(&self) {}
    }

    fn counting_callback(count: &Arc<AtomicUsize>) -> ReadyCallback {
        let count = count.clone();
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_ready_fires_callback_once() {
        let core = SourceCore::new("en-us", "local:/models/en-us");
        let fired = Arc::new(AtomicUsize::new(0));

        let ticket = core.begin();
        assert_eq!(core.state(), RecognizerState::Initializing);
        assert!(core.recognizer().is_err());

        assert!(core.ready(ticket, Arc::new(Silent), counting_callback(&fired)));
        assert_eq!(core.state(), RecognizerState::Ready);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(core.recognizer().unwrap().sample_rate(), 16000);
    }

    #[test]
    fn test_close_during_load_discards_result() {
        let core = SourceCore::new("en-us", "local:/models/en-us");
        let fired = Arc::new(AtomicUsize::new(0));

        let ticket = core.begin();
        core.close(false);
        assert!(!core.cache_allowed());

        assert!(!core.ready(ticket, Arc::new(Silent), counting_callback(&fired)));
        assert_eq!(core.state(), RecognizerState::Closed);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(matches!(core.recognizer(), Err(SayboardError::NotReady(_))));
    }

    #[test]
    fn test_failure_records_message() {
        let core = SourceCore::new("remote", "server:localhost:10300");
        let ticket = core.begin();
        let err = SayboardError::Config("unreachable".to_string());
        assert!(core.fail(ticket, ErrorMessage::ServerUnreachable, &err));
        assert_eq!(core.state(), RecognizerState::Error);
        assert_eq!(core.error_message(), Some(ErrorMessage::ServerUnreachable));

        // A new attempt clears the previous failure
        core.begin();
        assert_eq!(core.error_message(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let core = SourceCore::new("en-us", "local:/models/en-us");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        core.signal()
            .subscribe(Arc::new(move |s: &RecognizerState| sink.lock().unwrap().push(*s)));

        core.close(true);
        core.close(true);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RecognizerState::Uninitialized, RecognizerState::Closed]
        );
    }
}
