use crate::config::{DiscoveryConfig, HEALTH_ENDPOINT};
use log::{debug, info, trace, warn};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// How a location was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Discovered,
    /// Nothing answered; this is the hardcoded default.
    Fallback,
    /// Supplied by the caller, no probing done.
    Pinned,
}

/// Where the backend lives, plus the request settings that go with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendLocation {
    pub base_address: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub source: LocationSource,
}

impl BackendLocation {
    fn from_config(config: &DiscoveryConfig, port: u16, source: LocationSource) -> Self {
        Self {
            base_address: config.base_address(port),
            port,
            timeout_ms: config.request_timeout_ms,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            source,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_address, path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Finds the backend once and remembers it.
///
/// Candidates are probed one after another with `GET /api/health`; the first
/// one answering with a success status wins. When none does, the locator
/// settles on the fallback port instead of failing, so `locate` always
/// yields an address. Whether that happened is visible through
/// [`ServiceLocator::is_degraded`].
#[derive(Debug)]
pub struct ServiceLocator {
    config: DiscoveryConfig,
    client: Client,
    location: OnceCell<BackendLocation>,
}

impl ServiceLocator {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            location: OnceCell::new(),
        }
    }

    /// A locator that never probes.
    pub fn pinned(location: BackendLocation) -> Self {
        Self {
            config: DiscoveryConfig::default(),
            client: Client::new(),
            location: OnceCell::from(location),
        }
    }

    /// Pins the given port on the configured host.
    pub fn pinned_port(config: DiscoveryConfig, port: u16) -> Self {
        let location = BackendLocation::from_config(&config, port, LocationSource::Pinned);
        Self {
            config,
            client: Client::new(),
            location: OnceCell::from(location),
        }
    }

    pub async fn locate(&self) -> &BackendLocation {
        self.location.get_or_init(|| self.discover()).await
    }

    /// `None` until the first `locate` finishes.
    pub fn is_degraded(&self) -> Option<bool> {
        self.location
            .get()
            .map(|location| location.source == LocationSource::Fallback)
    }

    async fn discover(&self) -> BackendLocation {
        let start = Instant::now();
        info!(
            "Looking for backend on {} candidate ports of {}...",
            self.config.candidate_ports.len(),
            self.config.host
        );

        for &port in &self.config.candidate_ports {
            if self.probe(port).await {
                info!("Backend found on port {} in {:.2?}", port, start.elapsed());
                return BackendLocation::from_config(&self.config, port, LocationSource::Discovered);
            }
        }

        warn!(
            "Backend not found on any candidate port after {:.2?}; falling back to port {}",
            start.elapsed(),
            self.config.fallback_port
        );
        BackendLocation::from_config(
            &self.config,
            self.config.fallback_port,
            LocationSource::Fallback,
        )
    }

    // any failure here just means "not this one"
    async fn probe(&self, port: u16) -> bool {
        let url = format!("{}{}", self.config.base_address(port), HEALTH_ENDPOINT);
        trace!("probing {url}");
        match self
            .client
            .get(&url)
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!("{url} answered {}", response.status());
                false
            }
            Err(e) => {
                debug!("{url} unreachable: {e}");
                false
            }
        }
    }
}

impl Default for ServiceLocator {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}
