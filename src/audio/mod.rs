//! Audio capture
//!
//! The manager never talks to a sound API directly. It asks an [`AudioHost`]
//! for a capture stream and hands the chunks to an [`AudioSession`].

pub mod cpal_host;
pub mod session;

use crate::error::SayResult;
use std::sync::mpsc::Sender;

pub use cpal_host::CpalHost;
pub use session::AudioSession;

/// A live microphone stream. Dropping it must stop delivery.
pub trait CaptureStream {
    fn stop(&mut self);
}

/// Host audio device access
pub trait AudioHost {
    /// Open the microphone and start delivering mono i16 chunks into `sink`.
    /// A busy or missing device is `SayboardError::MicrophoneBusy`.
    fn open_input(
        &self,
        sample_rate: u32,
        sink: Sender<Vec<i16>>,
    ) -> SayResult<Box<dyn CaptureStream>>;
}

/// Host permission check consulted before capture. The core never prompts.
pub trait PermissionGate {
    fn record_audio_granted(&self) -> bool;
}

impl<F: Fn() -> bool> PermissionGate for F {
    fn record_audio_granted(&self) -> bool {
        self()
    }
}

/// Calculate audio energy for VAD
pub fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: i64 = samples.iter().map(|&s| (s as i64).pow(2)).sum();
    (sum as f32 / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0i16; 100];
        assert_eq!(calculate_energy(&silence), 0.0);
        assert_eq!(calculate_energy(&[]), 0.0);

        let loud = vec![1000i16; 100];
        assert!((calculate_energy(&loud) - 1000.0).abs() < 0.01);
    }

    #[test]
    fn test_closure_is_a_permission_gate() {
        let denied = || false;
        assert!(!denied.record_audio_granted());
    }
}
