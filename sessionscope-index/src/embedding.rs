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

//! Embedding providers for embedding-mode vectorization.
//!
//! The production provider calls an OpenAI-compatible `/embeddings`
//! endpoint. When no API key is configured the deterministic provider
//! stands in: hash-seeded, normalized vectors that keep embedding-mode
//! flows working in development and tests without a network dependency.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("embedding response contained no vectors")]
    EmptyResponse,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError>;
}

/// OpenAI-compatible embeddings client.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": inputs,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic hash-seeded embeddings for offline operation.
pub struct DeterministicEmbeddingProvider {
    dimension: usize,
}

impl DeterministicEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for DeterministicEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        Ok(inputs
            .iter()
            .map(|text| deterministic_embedding(text, self.dimension))
            .collect())
    }
}

fn deterministic_embedding(text: &str, dimension: usize) -> Vec<f64> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();

    let mut embedding = Vec::with_capacity(dimension);
    let mut state = seed;
    for _ in 0..dimension {
        state = state.wrapping_mul(0x5851f42d4c957f2d).wrapping_add(1);
        embedding.push((state as f64 / u64::MAX as f64) * 2.0 - 1.0);
    }

    let norm: f64 = embedding.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        embedding.iter_mut().for_each(|x| *x /= norm);
    }
    embedding
}

/// Element-wise mean of chunk embeddings; a missing element counts as 0.
pub fn average_embeddings(embeddings: &[Vec<f64>]) -> Option<Vec<f64>> {
    match embeddings {
        [] => None,
        [single] => Some(single.clone()),
        many => {
            let length = many[0].len();
            let mut sums = vec![0.0_f64; length];
            for embedding in many {
                for (i, sum) in sums.iter_mut().enumerate() {
                    *sum += embedding.get(i).copied().unwrap_or(0.0);
                }
            }
            let count = many.len() as f64;
            Some(sums.into_iter().map(|s| s / count).collect())
        }
    }
}
