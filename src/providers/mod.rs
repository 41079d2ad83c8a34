//! Source providers
//!
//! Each provider enumerates the recognizer sources of one origin. A provider
//! that finds nothing (or fails) contributes zero sources and never stops the
//! others from being asked.

pub mod local;
pub mod server;

use crate::config::Config;
use crate::recognizer::RecognizerSource;
use std::sync::Arc;
use tracing::{debug, info};

pub use local::LocalModelProvider;
pub use server::ServerProvider;

pub type SourceList = Vec<Arc<dyn RecognizerSource>>;

pub trait SourceProvider {
    fn name(&self) -> &str;

    /// Append this provider's sources to `into` in a stable order
    fn load_sources(&self, into: &mut SourceList);
}

/// Providers for a configuration: local models always, servers when enabled
pub fn from_config(config: &Config) -> Vec<Box<dyn SourceProvider>> {
    let mut providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(LocalModelProvider::new(
        config.model_dirs(),
        config.sample_rate,
    ))];
    if config.server_enabled {
        providers.push(Box::new(ServerProvider::from_config(config)));
    }
    providers
}

/// Ask every provider, in order, for its sources
pub fn load_all(providers: &[Box<dyn SourceProvider>]) -> SourceList {
    let mut sources = SourceList::new();
    for provider in providers {
        let before = sources.len();
        provider.load_sources(&mut sources);
        debug!(
            "Provider '{}' contributed {} source(s)",
            provider.name(),
            sources.len() - before
        );
    }
    info!(
        "🔎 Found {} recognizer source(s) from {} provider(s)",
        sources.len(),
        providers.len()
    );
    sources
}
