//! Test doubles for driving the model manager without audio hardware
//! or model files.

#![allow(dead_code)]

use sayboard::audio::{AudioHost, CaptureStream};
use sayboard::error::{SayResult, SayboardError};
use sayboard::providers::{SourceList, SourceProvider};
use sayboard::recognizer::{Decoded, Recognizer, SourceBackend, SourceCore};
use sayboard::view::{ErrorMessage, ViewEvent};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Recognizer that finalizes every chunk as "hello"
pub struct MockRecognizer {
    pub resets: AtomicUsize,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            resets: AtomicUsize::new(0),
        }
    }
}

impl Recognizer for MockRecognizer {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn accept_waveform(&self, _samples: &[i16]) -> SayResult<Decoded> {
        Ok(Decoded::Final("hello".to_string()))
    }

    fn final_result(&self) -> SayResult<Option<String>> {
        Ok(None)
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Succeed,
    Fail,
    /// Block on the worker until `open_gate` is called
    Gated,
}

/// Source whose load result the test chooses
pub struct MockSource {
    core: SourceCore,
    outcome: LoadOutcome,
    gate: Mutex<bool>,
    opened: Condvar,
    pub loads: AtomicUsize,
    pub releases: AtomicUsize,
    pub last_release_weak: Mutex<Option<bool>>,
}

impl MockSource {
    pub fn new(name: &str, outcome: LoadOutcome) -> Arc<Self> {
        Arc::new(Self {
            core: SourceCore::new(name, format!("mock:{}", name)),
            outcome,
            gate: Mutex::new(false),
            opened: Condvar::new(),
            loads: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            last_release_weak: Mutex::new(None),
        })
    }

    pub fn ready(name: &str) -> Arc<Self> {
        Self::new(name, LoadOutcome::Succeed)
    }

    pub fn open_gate(&self) {
        *self.gate.lock().unwrap() = true;
        self.opened.notify_all();
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl SourceBackend for MockSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn load(&self) -> SayResult<Arc<dyn Recognizer>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            LoadOutcome::Succeed => Ok(Arc::new(MockRecognizer::new())),
            LoadOutcome::Fail => Err(SayboardError::Load {
                name: self.core.name().to_string(),
                reason: "mock failure".to_string(),
            }),
            LoadOutcome::Gated => {
                let mut open = self.gate.lock().unwrap();
                while !*open {
                    open = self.opened.wait(open).unwrap();
                }
                Ok(Arc::new(MockRecognizer::new()))
            }
        }
    }

    fn release(&self, weak: bool) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        *self.last_release_weak.lock().unwrap() = Some(weak);
    }

    fn failure_message(&self) -> ErrorMessage {
        ErrorMessage::ModelLoadFailed
    }
}

/// Provider over a list the test can change between reloads
#[derive(Clone, Default)]
pub struct MockProvider {
    pub sources: Arc<Mutex<Vec<Arc<MockSource>>>>,
}

impl MockProvider {
    pub fn with(sources: Vec<Arc<MockSource>>) -> Self {
        Self {
            sources: Arc::new(Mutex::new(sources)),
        }
    }

    pub fn set(&self, sources: Vec<Arc<MockSource>>) {
        *self.sources.lock().unwrap() = sources;
    }
}

impl SourceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn load_sources(&self, into: &mut SourceList) {
        for source in self.sources.lock().unwrap().iter() {
            into.push(source.clone());
        }
    }
}

struct MockStream {
    live: Arc<AtomicUsize>,
    stopped: bool,
}

impl CaptureStream for MockStream {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Microphone that counts open streams and can pretend to be busy
#[derive(Clone, Default)]
pub struct MockAudioHost {
    pub live: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub busy: Arc<AtomicBool>,
    pub sink: Arc<Mutex<Option<Sender<Vec<i16>>>>>,
}

impl MockAudioHost {
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Push a chunk as if the microphone had captured it
    pub fn feed(&self, chunk: Vec<i16>) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(chunk).is_ok(),
            None => false,
        }
    }
}

impl AudioHost for MockAudioHost {
    fn open_input(
        &self,
        _sample_rate: u32,
        sink: Sender<Vec<i16>>,
    ) -> SayResult<Box<dyn CaptureStream>> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(SayboardError::MicrophoneBusy("in use".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(MockStream {
            live: self.live.clone(),
            stopped: false,
        }))
    }
}

/// Wait until `done` holds or the timeout expires
pub fn eventually(mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

/// Collect view events until `stop` matches one, failing on timeout
pub fn events_until(rx: &Receiver<ViewEvent>, stop: &ViewEvent) -> Vec<ViewEvent> {
    let mut seen = Vec::new();
    loop {
        match rx.recv_timeout(WAIT) {
            Ok(event) => {
                let done = &event == stop;
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for {:?}, saw {:?}", stop, seen),
        }
    }
}
