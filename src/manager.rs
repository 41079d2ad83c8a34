//! Model Manager
//!
//! Owns the ordered list of recognizer sources, the one that is active, and
//! the audio session running against it. All public operations are meant to
//! be called from one control thread. Work finishing elsewhere (a source
//! becoming ready, actions from other threads) is queued on the control
//! channel and only applied inside `process_pending` / `process_next`.

use crate::audio::{AudioHost, AudioSession, CpalHost, PermissionGate};
use crate::config::Config;
use crate::error::SayResult;
use crate::executor::InitExecutor;
use crate::providers::{self, SourceList, SourceProvider};
use crate::recognizer::{
    Observer, ReadyCallback, RecognizerSource, RecognizerState, SubscriptionId,
};
use crate::view::{ErrorMessage, ViewHandle, ViewState};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// User requests that can be posted from any thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Start,
    Stop,
    Pause(bool),
    TogglePause,
    SwitchNext,
    Reload,
    Shutdown,
}

impl std::str::FromStr for UserAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "start" => Ok(UserAction::Start),
            "s" | "stop" => Ok(UserAction::Stop),
            "p" | "pause" => Ok(UserAction::TogglePause),
            "n" | "next" => Ok(UserAction::SwitchNext),
            "l" | "reload" => Ok(UserAction::Reload),
            "q" | "quit" => Ok(UserAction::Shutdown),
            _ => Err(()),
        }
    }
}

#[derive(Debug)]
enum ControlEvent {
    Ready { ticket: u64 },
    Action(UserAction),
}

/// Thread-safe way to reach the control thread
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: Sender<ControlEvent>,
}

impl ControlHandle {
    /// Returns false once the manager is gone
    pub fn send(&self, action: UserAction) -> bool {
        self.sender.send(ControlEvent::Action(action)).is_ok()
    }
}

struct ActiveSource {
    source: Arc<dyn RecognizerSource>,
    // None once torn down
    subscription: Option<SubscriptionId>,
}

pub struct ModelManager {
    config: Config,
    providers: Vec<Box<dyn SourceProvider>>,
    sources: SourceList,
    index: usize,
    active: Option<ActiveSource>,
    session: Option<AudioSession>,
    running: bool,
    paused: bool,
    destroyed: bool,
    ready_ticket: u64,
    executor: InitExecutor,
    audio: Box<dyn AudioHost>,
    permission: Box<dyn PermissionGate>,
    view: ViewHandle,
    control_tx: Sender<ControlEvent>,
    control_rx: Receiver<ControlEvent>,
}

impl ModelManager {
    /// Manager wired to the configured providers and the default microphone
    pub fn new(config: Config, view: ViewHandle) -> SayResult<Self> {
        let providers = providers::from_config(&config);
        let audio = Box::new(CpalHost::new(config.audio_device));
        Self::with_parts(config, providers, audio, Box::new(|| true), view)
    }

    pub fn with_parts(
        config: Config,
        providers: Vec<Box<dyn SourceProvider>>,
        audio: Box<dyn AudioHost>,
        permission: Box<dyn PermissionGate>,
        view: ViewHandle,
    ) -> SayResult<Self> {
        let executor = InitExecutor::new()?;
        let (control_tx, control_rx) = mpsc::channel();
        let sources = providers::load_all(&providers);

        let mut manager = Self {
            config,
            providers,
            sources,
            index: 0,
            active: None,
            session: None,
            running: false,
            paused: false,
            destroyed: false,
            ready_ticket: 0,
            executor,
            audio,
            permission,
            view,
            control_tx,
            control_rx,
        };

        if manager.sources.is_empty() {
            warn!("⚠️ No recognizers available");
            manager.view.post_error(ErrorMessage::NoRecognizers);
            manager.view.post_state(ViewState::Error);
        } else {
            manager.index = 0;
            manager.initialize_recognizer();
        }

        Ok(manager)
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            sender: self.control_tx.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `listen_immediately` and `weak_ref_model` are read at each use
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn sources(&self) -> &[Arc<dyn RecognizerSource>] {
        &self.sources
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    /// The source the manager last activated. After a reload this may be an
    /// instance that is no longer in `sources()`.
    pub fn current_source(&self) -> Option<&Arc<dyn RecognizerSource>> {
        self.active.as_ref().map(|a| &a.source)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_source().map(|s| s.name())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused && self.session.is_some()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Activate `sources[index]` and queue its load on the init worker
    pub fn initialize_recognizer(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        // Never leave a previous activation live alongside the new one
        if self.active.as_ref().is_some_and(|a| a.subscription.is_some()) {
            self.stop_recognizer_source();
        }

        let source = Arc::clone(&self.sources[self.index]);

        self.ready_ticket += 1;
        let ticket = self.ready_ticket;
        let control = self.control_tx.clone();
        let on_ready: ReadyCallback = Box::new(move || {
            let _ = control.send(ControlEvent::Ready { ticket });
        });

        info!("🔄 Activating recognizer '{}'", source.name());
        self.view.post_name(source.name());
        let subscription = source.subscribe(view_observer(&source, self.view.clone()));
        self.active = Some(ActiveSource {
            source: Arc::clone(&source),
            subscription: Some(subscription),
        });

        source.initialize(&self.executor, on_ready);
    }

    fn stop_recognizer_source(&mut self) {
        // Ready events from this activation are stale from here on
        self.ready_ticket += 1;
        if let Some(active) = self.active.as_mut() {
            active.source.close(self.config.weak_ref_model);
            if let Some(id) = active.subscription.take() {
                active.source.unsubscribe(id);
            }
        }
    }

    pub fn switch_to_next_recognizer(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        if self.session.is_some() || self.running {
            info!("Stopping session before switching recognizer");
            self.stop_session();
            self.running = false;
        }

        self.stop_recognizer_source();
        self.index = (self.index + 1) % self.sources.len();
        self.initialize_recognizer();
    }

    fn stop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
        self.paused = false;
    }

    pub fn start(&mut self) {
        let Some(source) = self.current_source().cloned() else {
            debug!("No recognizer source, ignoring start");
            return;
        };

        if self.running || self.session.is_some() {
            self.stop_session();
        }

        self.view.post_state(ViewState::Listening);

        if !self.permission.record_audio_granted() {
            warn!("🔒 Record permission not granted, not starting");
            return;
        }

        let recognizer = match source.recognizer() {
            Ok(recognizer) => recognizer,
            Err(e) => {
                warn!("Start requested before recognizer was ready: {}", e);
                self.view.post_error(ErrorMessage::NotReady);
                self.view.post_state(ViewState::Error);
                return;
            }
        };

        let sample_rate = recognizer.sample_rate();
        let session = AudioSession::start(
            self.audio.as_ref(),
            recognizer,
            sample_rate,
            self.view.clone(),
        );
        match session {
            Ok(session) => {
                info!("🎤 Listening with '{}'", source.name());
                self.session = Some(session);
            }
            Err(e) => {
                warn!("🎙️ Microphone unavailable: {}", e);
                self.view.post_error(ErrorMessage::MicInUse);
                self.view.post_state(ViewState::Error);
            }
        }

        // Set even when the microphone could not be acquired
        self.running = true;
    }

    pub fn pause(&mut self, paused: bool) {
        match &self.session {
            Some(session) => {
                session.set_pause(paused);
                self.paused = paused;
                self.view.post_state(if paused {
                    ViewState::Paused
                } else {
                    ViewState::Listening
                });
            }
            None => self.paused = false,
        }
    }

    pub fn stop(&mut self) {
        self.stop_session();
        self.running = false;
        self.stop_recognizer_source();
    }

    pub fn on_destroy(&mut self) {
        info!("👋 Shutting down model manager");
        self.stop();
        self.destroyed = true;
    }

    /// Re-enumerate sources, keeping the index on the same source if it is
    /// still there. Nothing is re-initialized.
    pub fn reload_models(&mut self) {
        let previous = self.sources.get(self.index).map(|s| s.id().to_string());
        if previous.is_none() {
            warn!("Reloading models before any source was available");
        }

        let sources = providers::load_all(&self.providers);
        self.index = previous
            .and_then(|id| sources.iter().position(|s| s.id() == id))
            .unwrap_or(0);
        self.sources = sources;
        debug!(
            "Reloaded {} source(s), current index {}",
            self.sources.len(),
            self.index
        );
    }

    /// Apply everything already queued. Returns how many events were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.control_rx.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one event and apply it
    pub fn process_next(&mut self, timeout: Duration) -> bool {
        match self.control_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Ready { ticket } => {
                if ticket != self.ready_ticket {
                    debug!("Ignoring stale ready event");
                    return;
                }
                if self.config.listen_immediately {
                    self.start();
                }
            }
            ControlEvent::Action(action) => {
                debug!("Control action: {:?}", action);
                match action {
                    UserAction::Start => self.start(),
                    UserAction::Stop => self.stop(),
                    UserAction::Pause(paused) => self.pause(paused),
                    UserAction::TogglePause => {
                        let paused = !self.is_paused();
                        self.pause(paused);
                    }
                    UserAction::SwitchNext => self.switch_to_next_recognizer(),
                    UserAction::Reload => self.reload_models(),
                    UserAction::Shutdown => self.on_destroy(),
                }
            }
        }
    }
}

/// Forwards one source's transitions to the view
fn view_observer(
    source: &Arc<dyn RecognizerSource>,
    view: ViewHandle,
) -> Observer<RecognizerState> {
    let source: Weak<dyn RecognizerSource> = Arc::downgrade(source);
    Arc::new(move |state: &RecognizerState| {
        if *state == RecognizerState::Error {
            let message = source
                .upgrade()
                .and_then(|s| s.error_message())
                .unwrap_or(ErrorMessage::ModelLoadFailed);
            view.post_error(message);
        }
        view.post_state(ViewState::from(*state));
    })
}
