// Shared transport configuration for building reqwest::Client instances.
//
// The cloud client and the local adapter both build their HTTP clients
// here so the vendor headers and timeout budget live in one place.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::Error;

/// Default cloud endpoint.
pub const DEFAULT_BASE_URL: &str = "http://www.powafree.com";

/// The vendor mobile app's user agent; the cloud expects it.
pub const USER_AGENT: &str = "okhttp/3.14.9";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// One budget for every cloud request.
    pub timeout: Duration,
    /// Budget for local-network probes and fetches.
    pub local_timeout: Duration,
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            local_timeout: Duration::from_secs(2),
            user_agent: USER_AGENT,
            accept_language: "fr",
        }
    }
}

impl TransportConfig {
    /// Override the cloud request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the cloud `reqwest::Client` with the fixed vendor headers.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder(self.timeout).build().map_err(Error::Transport)
    }

    /// Build the short-budget client used against devices on the LAN.
    pub fn build_local_client(&self) -> Result<reqwest::Client, Error> {
        self.builder(self.local_timeout)
            .connect_timeout(self.local_timeout)
            .build()
            .map_err(Error::Transport)
    }

    fn builder(&self, timeout: Duration) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(self.user_agent)
            .default_headers(self.default_headers())
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(self.accept_language));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}
