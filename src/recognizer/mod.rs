//! Recognizer sources
//!
//! A recognizer source is a named handle to one speech-recognition backend:
//! - Local: a Vosk model directory on disk
//! - Server: a remote Wyoming ASR endpoint
//!
//! Backends implement [`SourceBackend`]; the shared lifecycle in
//! [`SourceCore`] turns that into a [`RecognizerSource`].

pub mod lifecycle;
pub mod local;
pub mod server;
pub mod signal;
pub mod wyoming;

use crate::error::{SayResult, SayboardError};
use crate::executor::InitExecutor;
use crate::view::ErrorMessage;
use std::sync::Arc;
use tracing::{debug, error};

pub use lifecycle::SourceCore;
pub use local::LocalModelSource;
pub use server::ServerSource;
pub use signal::{Observer, StateSignal, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
    Error,
}

/// Outcome of feeding one chunk of audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Nothing,
    Partial(String),
    Final(String),
}

/// The live recognizer a source hands out once Ready
pub trait Recognizer: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn accept_waveform(&self, samples: &[i16]) -> SayResult<Decoded>;

    /// Flush whatever is buffered for the current utterance
    fn final_result(&self) -> SayResult<Option<String>>;

    fn reset(&self);
}

/// Fired once, from the init worker, when a source reaches Ready
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait RecognizerSource: Send + Sync {
    fn name(&self) -> &str;

    /// Stable identity across enumerations
    fn id(&self) -> &str;

    fn state(&self) -> RecognizerState;

    fn subscribe(&self, observer: Observer<RecognizerState>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Queue the heavy setup on `executor` and return immediately.
    /// Callers must not initialize the same source twice concurrently.
    fn initialize(self: Arc<Self>, executor: &InitExecutor, on_ready: ReadyCallback);

    /// Release the backend; `weak` allows keeping caches for a fast re-init.
    /// Safe at any point, including while a load is in flight.
    fn close(&self, weak: bool);

    /// Only available in the Ready state
    fn recognizer(&self) -> SayResult<Arc<dyn Recognizer>>;

    /// Why the last load failed, if it did
    fn error_message(&self) -> Option<ErrorMessage>;
}

/// What a concrete backend supplies
pub trait SourceBackend: Send + Sync + 'static {
    fn core(&self) -> &SourceCore;

    /// Runs on the init worker
    fn load(&self) -> SayResult<Arc<dyn Recognizer>>;

    /// Drop backend resources after the core has closed
    fn release(&self, _weak: bool) {}

    fn failure_message(&self) -> ErrorMessage {
        ErrorMessage::ModelLoadFailed
    }
}

impl<B: SourceBackend> RecognizerSource for B {
    fn name(&self) -> &str {
        self.core().name()
    }

    fn id(&self) -> &str {
        self.core().id()
    }

    fn state(&self) -> RecognizerState {
        self.core().state()
    }

    fn subscribe(&self, observer: Observer<RecognizerState>) -> SubscriptionId {
        self.core().signal().subscribe(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core().signal().unsubscribe(id)
    }

    fn initialize(self: Arc<Self>, executor: &InitExecutor, on_ready: ReadyCallback) {
        let ticket = self.core().begin();
        let source = Arc::clone(&self);

        let queued = executor.execute(move || {
            let core = source.core();
            if !core.is_current(ticket) {
                debug!("Skipping superseded load of '{}'", core.name());
                return;
            }

            match source.load() {
                Ok(recognizer) => {
                    if !core.ready(ticket, recognizer, on_ready) {
                        source.release(core.cache_allowed());
                    }
                }
                Err(e) => {
                    if !core.fail(ticket, source.failure_message(), &e) {
                        source.release(core.cache_allowed());
                    }
                }
            }
        });

        if let Err(e) = queued {
            error!("Could not queue load of '{}': {}", self.core().name(), e);
            self.core()
                .fail(ticket, self.failure_message(), &SayboardError::ExecutorClosed);
        }
    }

    fn close(&self, weak: bool) {
        self.core().close(weak);
        self.release(weak);
    }

    fn recognizer(&self) -> SayResult<Arc<dyn Recognizer>> {
        self.core().recognizer()
    }

    fn error_message(&self) -> Option<ErrorMessage> {
        self.core().error_message()
    }
}
