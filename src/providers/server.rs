//! Configured Wyoming ASR servers

use super::{SourceList, SourceProvider};
use crate::config::Config;
use crate::recognizer::wyoming::parse_uri;
use crate::recognizer::ServerSource;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ServerProvider {
    uris: Vec<String>,
    probe_timeout: Option<Duration>,
}

impl ServerProvider {
    pub fn new(uris: Vec<String>, probe_timeout: Option<Duration>) -> Self {
        Self {
            uris,
            probe_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let probe = (config.server_probe_timeout_ms > 0)
            .then(|| Duration::from_millis(config.server_probe_timeout_ms));
        Self::new(config.servers.clone(), probe)
    }
}

/// Check if something is listening on host:port
fn is_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    let Ok(mut addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok())
}

impl SourceProvider for ServerProvider {
    fn name(&self) -> &str {
        "server"
    }

    fn load_sources(&self, into: &mut SourceList) {
        for uri in &self.uris {
            let (host, port) = match parse_uri(uri) {
                Ok(parts) => parts,
                Err(e) => {
                    warn!("Skipping server entry: {:#}", e);
                    continue;
                }
            };

            if let Some(timeout) = self.probe_timeout {
                if !is_reachable(&host, port, timeout) {
                    warn!("Skipping unreachable server {}:{}", host, port);
                    continue;
                }
            }

            debug!("🌐 Found server source: {}:{}", host, port);
            into.push(Arc::new(ServerSource::new(&host, port)));
        }
    }
}
