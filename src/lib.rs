//! Sayboard Library
//!
//! Lifecycle of swappable speech-recognition backends for a voice keyboard,
//! and the listening session that runs against the active one.

pub mod audio;
pub mod config;
pub mod error;
pub mod executor;
pub mod i18n;
pub mod manager;
pub mod providers;
pub mod recognizer;
pub mod view;

pub use error::{SayResult, SayboardError};
pub use manager::{ControlHandle, ModelManager, UserAction};
