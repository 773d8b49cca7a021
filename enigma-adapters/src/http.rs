//! REST client for the analysis backend.
//!
//! ## Endpoints
//!
//! - `GET {base}/health` - backend status counters
//! - `GET {base}/api/situations` - current situation list
//! - `GET {base}/api/situation/{id}/analyze?role={role}` - on-demand analysis
//!
//! ## Example
//!
//! ```rust,no_run
//! use enigma_adapters::http::ApiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     let health = client.health().await?;
//!     println!("{}: {} situations", health.status, health.total_situations());
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use enigma_sync::{HealthError, HealthSource};
use enigma_types::HealthData;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::AdapterError;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Role used for analysis requests when none is given.
pub const DEFAULT_ROLE: &str = "ANALYST";

/// HTTP client for the backend's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
}

impl ApiClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Base URL requests are made against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the backend health counters.
    pub async fn health(&self) -> Result<HealthData, AdapterError> {
        self.get_json(&self.url("/health")).await
    }

    /// Fetch the current situation list.
    ///
    /// The listing shape is owned by the backend and returned as-is.
    pub async fn situations(&self) -> Result<Value, AdapterError> {
        self.get_json(&self.url("/api/situations")).await
    }

    /// Request an analysis of one situation for a given audience role.
    ///
    /// `role` defaults to [`DEFAULT_ROLE`].
    pub async fn analyze(&self, situation_id: &str, role: Option<&str>) -> Result<Value, AdapterError> {
        if situation_id.is_empty() {
            return Err(AdapterError::InvalidEndpoint("empty situation id".to_string()));
        }

        let url = self.url(&format!("/api/situation/{}/analyze", encode_segment(situation_id)));
        let response = self
            .client
            .get(&url)
            .query(&[("role", role.unwrap_or(DEFAULT_ROLE))])
            .send()
            .await?;

        parse(check(response)?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AdapterError> {
        let response = self.client.get(url).send().await?;
        parse(check(response)?).await
    }
}

#[async_trait]
impl HealthSource for ApiClient {
    async fn fetch(&self) -> Result<HealthData, HealthError> {
        Ok(self.health().await?)
    }
}

fn check(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Http(format!("API returned status {}", status)));
    }
    Ok(response)
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))
}

/// Builder for [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Set the API base URL (default: "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient, AdapterError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AdapterError::InvalidEndpoint(endpoint));
        }

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build()?;

        Ok(ApiClient { client, endpoint })
    }
}

// Percent-encode a single path segment
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
