//! Audio Session
//!
//! Binds one capture stream to one recognizer. Chunks travel from the
//! capture callback over a channel to a decoding thread, which posts partial
//! and final text to the view. While paused, audio is discarded and the
//! recognizer is reset on each pause/resume edge.
//!
//! Shutdown waits at most [`SHUTDOWN_GRACE`] for the final flush. A decoder
//! still busy after that (a remote recognizer waiting on the network) is left
//! to finish on its own and posts its text whenever it arrives.

use super::{AudioHost, CaptureStream};
use crate::error::SayResult;
use crate::recognizer::{Decoded, Recognizer};
use crate::view::{ViewEvent, ViewHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

pub struct AudioSession {
    stream: Option<Box<dyn CaptureStream>>,
    decoder: Option<JoinHandle<()>>,
    // Disconnects when the decoder exits
    decoder_done: Receiver<()>,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("paused", &self.is_paused())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl AudioSession {
    /// Acquire the microphone and start feeding `recognizer`.
    /// On failure nothing is left running.
    pub fn start(
        host: &dyn AudioHost,
        recognizer: Arc<dyn Recognizer>,
        sample_rate: u32,
        view: ViewHandle,
    ) -> SayResult<Self> {
        let (tx, rx) = mpsc::channel();
        let stream = host.open_input(sample_rate, tx)?;

        let paused = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, decoder_done) = mpsc::channel::<()>();

        let decoder = {
            let paused = paused.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("sayboard-session".to_string())
                .spawn(move || {
                    let _done = done_tx;
                    decode_loop(rx, recognizer, paused, running, view)
                })?
        };

        info!("🎙️ Listening at {} Hz", sample_rate);
        Ok(Self {
            stream: Some(stream),
            decoder: Some(decoder),
            decoder_done,
            paused,
            running,
        })
    }

    pub fn set_pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        info!("{}", if paused { "⏸️ Session paused" } else { "▶️ Session resumed" });
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stop capturing. Audio already queued is still decoded.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            self.running.store(false, Ordering::SeqCst);
            debug!("Capture stopped");
        }
    }

    /// Stop and give the decoder up to [`SHUTDOWN_GRACE`] to flush and exit.
    /// Never blocks longer than that.
    pub fn shutdown(&mut self) {
        self.stop();
        let Some(decoder) = self.decoder.take() else {
            return;
        };

        match self.decoder_done.recv_timeout(SHUTDOWN_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("Decoder still flushing, leaving it to finish in the background");
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if decoder.join().is_err() {
                    warn!("Session decoder panicked");
                }
            }
        }
        info!("🛑 Session shut down");
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_loop(
    rx: Receiver<Vec<i16>>,
    recognizer: Arc<dyn Recognizer>,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    view: ViewHandle,
) {
    let mut was_paused = false;
    let feed = |chunk: &[i16], was_paused: &mut bool| {
        let now_paused = paused.load(Ordering::SeqCst);
        if now_paused != *was_paused {
            recognizer.reset();
            *was_paused = now_paused;
        }
        if now_paused {
            return;
        }
        match recognizer.accept_waveform(chunk) {
            Ok(Decoded::Final(text)) => view.post(ViewEvent::Text(text)),
            Ok(Decoded::Partial(partial)) => view.post(ViewEvent::Partial(partial)),
            Ok(Decoded::Nothing) => {}
            Err(e) => warn!("Recognizer rejected audio: {}", e),
        }
    };

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => feed(&chunk, &mut was_paused),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for chunk in rx.try_iter() {
        feed(&chunk, &mut was_paused);
    }

    if !was_paused {
        match recognizer.final_result() {
            Ok(Some(text)) => view.post(ViewEvent::Text(text)),
            Ok(None) => {}
            Err(e) => warn!("Failed to flush final result: {}", e),
        }
    }
    debug!("Decoder exited");
}
