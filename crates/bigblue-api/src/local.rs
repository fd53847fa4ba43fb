// Local-network transport
//
// Some devices answer on the LAN with the same envelope as the cloud.
// This path is strictly opportunistic: every failure is swallowed, logged
// at debug, and reported as "unavailable" so the caller falls back to the
// cloud.

use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{Error, codes};
use crate::models::{ApiResponse, RawRecord};
use crate::transport::TransportConfig;

/// Short-timeout client for devices reachable on the local network.
#[derive(Debug, Clone)]
pub struct LocalClient {
    http: reqwest::Client,
}

impl LocalClient {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_local_client()?,
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Whether a device answers at `address` (`host` or `host:port`).
    pub async fn probe(&self, address: &str) -> bool {
        let Some(url) = local_url(address, "api/status") else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(address, status = %resp.status(), "local probe rejected");
                false
            }
            Err(e) => {
                debug!(address, error = %e, "local probe failed");
                false
            }
        }
    }

    /// Latest telemetry straight from the device, or `None` on any
    /// failure or empty answer.
    pub async fn fetch_telemetry(&self, address: &str, mac: &str) -> Option<RawRecord> {
        let url = local_url(address, "api/devices/last_data")?;
        match self.try_fetch(url, mac).await {
            Ok(record) if !record.is_empty() => Some(record),
            Ok(_) => {
                debug!(address, mac, "local fetch returned no data");
                None
            }
            Err(e) => {
                debug!(address, mac, error = %e, "local fetch failed");
                None
            }
        }
    }

    async fn try_fetch(&self, url: Url, mac: &str) -> Result<RawRecord, Error> {
        let resp = self
            .http
            .post(url)
            .json(&json!({ "bleMac": mac }))
            .send()
            .await?
            .error_for_status()?;
        let envelope: ApiResponse = resp.json().await?;
        if envelope.code != codes::SUCCESS {
            return Err(Error::from_code(envelope.code, envelope.message));
        }
        match envelope.data {
            Some(serde_json::Value::Object(record)) => Ok(record),
            _ => Ok(RawRecord::new()),
        }
    }
}

fn local_url(address: &str, path: &str) -> Option<Url> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return None;
    }
    let raw = if address.contains("://") {
        format!("{address}/{path}")
    } else {
        format!("http://{address}/{path}")
    };
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!(address, error = %e, "invalid local address");
            None
        }
    }
}
