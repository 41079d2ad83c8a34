//! Remote Wyoming server backend
//!
//! Initialization is the `describe` handshake. The recognizer gates incoming
//! audio on energy, buffers one utterance, and ships it to the server once
//! enough trailing silence has been seen.

use super::wyoming::WyomingClient;
use super::{Decoded, Recognizer, SourceBackend, SourceCore};
use crate::audio::calculate_energy;
use crate::error::{SayResult, SayboardError};
use crate::view::ErrorMessage;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use tracing::{debug, info};

const SAMPLE_RATE: u32 = 16000;
/// RMS above this counts as speech
const SPEECH_ENERGY: f32 = 500.0;
/// ~0.8s of trailing silence at 1024-sample chunks
const SILENCE_CHUNKS: usize = 12;

pub struct ServerSource {
    core: SourceCore,
    client: WyomingClient,
}

impl ServerSource {
    pub fn new(host: &str, port: u16) -> Self {
        let client = WyomingClient::new(host, port);
        Self {
            core: SourceCore::new(client.address(), format!("server:{}", client.address())),
            client,
        }
    }
}

impl SourceBackend for ServerSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn load(&self) -> SayResult<Arc<dyn Recognizer>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let info = runtime
            .block_on(self.client.describe())
            .map_err(|e| SayboardError::Load {
                name: self.core.name().to_string(),
                reason: format!("{:#}", e),
            })?;
        info!(
            "🌐 '{}' speaks: {}",
            self.core.name(),
            info.languages().join(", ")
        );

        Ok(Arc::new(WyomingRecognizer::new(self.client.clone(), runtime)))
    }

    fn failure_message(&self) -> ErrorMessage {
        ErrorMessage::ServerUnreachable
    }
}

#[derive(Default)]
struct Utterance {
    samples: Vec<i16>,
    speaking: bool,
    silent_chunks: usize,
}

impl Utterance {
    fn take(&mut self) -> Vec<i16> {
        self.speaking = false;
        self.silent_chunks = 0;
        std::mem::take(&mut self.samples)
    }
}

pub struct WyomingRecognizer {
    client: WyomingClient,
    runtime: Runtime,
    utterance: Mutex<Utterance>,
}

impl WyomingRecognizer {
    pub(crate) fn new(client: WyomingClient, runtime: Runtime) -> Self {
        Self {
            client,
            runtime,
            utterance: Mutex::new(Utterance::default()),
        }
    }

    fn send(&self, samples: &[i16]) -> SayResult<Option<String>> {
        let text = self
            .runtime
            .block_on(self.client.transcribe(samples, SAMPLE_RATE))?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

impl Recognizer for WyomingRecognizer {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn accept_waveform(&self, samples: &[i16]) -> SayResult<Decoded> {
        let finished = {
            let mut utterance = self.utterance.lock()?;
            let loud = calculate_energy(samples) > SPEECH_ENERGY;

            if loud {
                utterance.speaking = true;
                utterance.silent_chunks = 0;
            } else if utterance.speaking {
                utterance.silent_chunks += 1;
            }

            if !utterance.speaking {
                return Ok(Decoded::Nothing);
            }
            utterance.samples.extend_from_slice(samples);

            if utterance.silent_chunks >= SILENCE_CHUNKS {
                utterance.take()
            } else {
                return Ok(Decoded::Nothing);
            }
        };

        debug!("Utterance complete ({} samples)", finished.len());
        Ok(match self.send(&finished)? {
            Some(text) => Decoded::Final(text),
            None => Decoded::Nothing,
        })
    }

    fn final_result(&self) -> SayResult<Option<String>> {
        let pending = self.utterance.lock()?.take();
        if pending.is_empty() {
            return Ok(None);
        }
        info!("Flushing {} buffered samples", pending.len());
        self.send(&pending)
    }

    fn reset(&self) {
        if let Ok(mut utterance) = self.utterance.lock() {
            utterance.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InitExecutor;
    use crate::recognizer::{RecognizerSource, RecognizerState};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_identity_and_name() {
        let source = ServerSource::new("localhost", 10300);
        assert_eq!(source.name(), "localhost:10300");
        assert_eq!(source.id(), "server:localhost:10300");
        assert_eq!(source.state(), RecognizerState::Uninitialized);
    }

    #[test]
    fn test_unreachable_server_reports_error() {
        // Grab a free port, then close it so nothing is listening
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let source = Arc::new(ServerSource::new("127.0.0.1", port));
        let executor = InitExecutor::new().unwrap();

        let (tx, rx) = mpsc::channel();
        source.subscribe(Arc::new(move |s: &RecognizerState| {
            let _ = tx.send(*s);
        }));
        source.clone().initialize(&executor, Box::new(|| panic!("must not be ready")));

        let mut last = RecognizerState::Uninitialized;
        while last != RecognizerState::Error {
            last = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        }
        assert_eq!(source.error_message(), Some(ErrorMessage::ServerUnreachable));
        assert!(source.recognizer().is_err());
    }

    #[test]
    fn test_silence_never_opens_an_utterance() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let recognizer = WyomingRecognizer::new(WyomingClient::new("127.0.0.1", 1), runtime);
        for _ in 0..50 {
            assert_eq!(
                recognizer.accept_waveform(&[0i16; 1024]).unwrap(),
                Decoded::Nothing
            );
        }
        assert_eq!(recognizer.final_result().unwrap(), None);
    }
}
