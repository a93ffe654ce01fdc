use std::time::Duration;

// endpoints, as defined by the backend
pub const HEALTH_ENDPOINT: &str = "/api/health";
pub const UPLOAD_ENDPOINT: &str = "/api/upload";

pub const DEFAULT_HOST: &str = "localhost";
pub const CANDIDATE_PORTS: [u16; 12] = [
    5000, 5001, 5002, 5003, 5004, 5005, 5006, 5007, 5008, 5009, 5010, 5011,
];
pub const FALLBACK_PORT: u16 = 5013;

pub const PROBE_TIMEOUT_MS: u64 = 2000;
pub const REQUEST_TIMEOUT_MS: u64 = 30000;
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY_MS: u64 = 1000;

// file checks
pub const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;
pub const ALLOWED_TYPES: [&str; 3] = ["text/csv", "application/vnd.ms-excel", ".csv"];
pub const ALLOWED_EXTENSIONS: [&str; 1] = [".csv"];

pub const RESULTS_FILE_NAME: &str = "smart_groups_results.csv";

pub const GROUPS_GENERATED: &str = "Groups generated successfully!";
pub const HEALTH_CHECK_PASSED: &str = "Backend is running properly.";

/// Everything the locator needs to find the backend and to build the
/// location it hands out.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub host: String,
    pub candidate_ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub fallback_port: u16,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl DiscoveryConfig {
    pub fn with_candidates(mut self, ports: Vec<u16>) -> Self {
        self.candidate_ports = ports;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_fallback_port(mut self, port: u16) -> Self {
        self.fallback_port = port;
        self
    }

    pub fn base_address(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            candidate_ports: CANDIDATE_PORTS.to_vec(),
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
            fallback_port: FALLBACK_PORT,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            retry_delay_ms: RETRY_DELAY_MS,
        }
    }
}
