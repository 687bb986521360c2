//! HTTP transport for the telemetry API

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::TelemetryError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs JSON bodies and reports the HTTP status.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<u16, TelemetryError>;
}

/// One shared, connection-reusing `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<u16, TelemetryError> {
        let resp = self.client.post(url.clone()).json(body).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// Validate a configured API base URL. Only http(s) with a host is usable.
pub fn parse_endpoint(raw: &str) -> Result<Url, TelemetryError> {
    let url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TelemetryError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(TelemetryError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// `path` on the scheme + host (+ port) of `base`. Any path, query or
/// fragment on the base is dropped.
pub fn endpoint_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}
