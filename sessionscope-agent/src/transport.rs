// Copyright 2025 SessionScope (https://github.com/sessionscope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Gateway transport for the capture agent.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Capture-agent errors.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Validation(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("identity was not resolved within the wait budget")]
    IdentityTimeout,

    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value>;

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<()>;

    /// Best-effort page-unload send: never reports failure.
    async fn send_beacon(&self, path: &str, body: serde_json::Value);

    /// The API key this transport authenticates with, for beacon bodies
    /// that cannot carry headers.
    fn api_key(&self) -> Option<String> {
        None
    }
}

/// HTTP transport over reqwest with the bearer API key.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    async fn send_beacon(&self, path: &str, body: serde_json::Value) {
        // The beacon carries the key in the body, mirroring the browser
        // sendBeacon call which cannot set headers.
        if let Err(e) = self.http.post(self.url(path)).json(&body).send().await {
            warn!("beacon send failed: {e}");
        }
    }

    fn api_key(&self) -> Option<String> {
        Some(self.api_key.clone())
    }
}
