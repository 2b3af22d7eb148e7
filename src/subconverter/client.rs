//! subconverter HTTP client.

use std::time::{Duration, Instant};

use strum::Display;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::ConverterError;
use crate::metrics;

/// Timeout for the `/version` liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest error body kept in a [`ConverterError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Client formats requested from subconverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Target {
    /// Clash YAML.
    Clash,
}

/// subconverter client.
#[derive(Debug, Clone)]
pub struct SubconverterClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Timeout for conversion requests.
    request_timeout: Duration,
}

impl SubconverterClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config.subconverter_url.clone(), config.request_timeout())
    }

    /// Create a client for an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        // subconverter runs next to us; never route it through a system proxy.
        let http = reqwest::Client::builder()
            .connect_timeout(PROBE_TIMEOUT)
            .no_proxy()
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    /// Fetch the version banner.
    #[instrument(skip(self))]
    pub async fn version(&self) -> Result<String, ConverterError> {
        let start = Instant::now();
        let response = self
            .http
            .get(format!("{}/version", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        metrics::record_converter_latency(start, "version");

        let response = response?;
        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            return Err(ConverterError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        Ok(body.trim().to_string())
    }

    /// Liveness probe: true iff `/version` answers 200 in time.
    pub async fn is_running(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!(%version, "subconverter is running");
                true
            }
            Err(e) => {
                warn!(error = %e, "subconverter health check failed");
                false
            }
        }
    }

    /// Convert the subscription at `subscription_url` into `target` format.
    #[instrument(skip(self))]
    pub async fn convert(
        &self,
        target: Target,
        subscription_url: &str,
    ) -> Result<String, ConverterError> {
        let url = format!("{}/sub", self.base_url);
        let target = target.to_string();

        info!(%url, %target, subscription_url, "requesting conversion");

        let start = Instant::now();
        let response = self
            .http
            .get(&url)
            .query(&[("target", target.as_str()), ("url", subscription_url)])
            .timeout(self.request_timeout)
            .send()
            .await;
        metrics::record_converter_latency(start, "sub");

        let response = response?;
        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            return Err(ConverterError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        Ok(body)
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
