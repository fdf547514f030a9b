//! Shared client configuration.
//!
//! A `Client` holds everything requests have in common: the backend
//! address, tunables, the device-information string, and the two racks all
//! requests pipe through. Deployments share one client; requests borrow it
//! through an `Arc`.

use crate::config::Config;
use crate::rack::Rack;
use std::fmt;
use std::sync::Arc;

/// Shared configuration for all requests.
#[derive(Clone)]
pub struct Client {
    protocol: String,
    host: String,
    config: Config,
    device_info: String,
    cache_rack: Arc<dyn Rack>,
    network_rack: Arc<dyn Rack>,
}

impl Client {
    /// Create a client with default configuration.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        cache_rack: Arc<dyn Rack>,
        network_rack: Arc<dyn Rack>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            config: Config::default(),
            device_info: format!(
                "{}/{} rust",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            cache_rack,
            network_rack,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Override the device-information string sent with every request.
    pub fn with_device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = device_info.into();
        self
    }

    /// Backend protocol, e.g. `https`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Backend host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Tunables.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Device-information string.
    pub fn device_info(&self) -> &str {
        &self.device_info
    }

    /// The rack backed by local storage.
    pub fn cache_rack(&self) -> &Arc<dyn Rack> {
        &self.cache_rack
    }

    /// The rack backed by the network.
    pub fn network_rack(&self) -> &Arc<dyn Rack> {
        &self.network_rack
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("config", &self.config)
            .field("device_info", &self.device_info)
            .finish_non_exhaustive()
    }
}
