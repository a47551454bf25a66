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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// SessionScope gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub server: HttpServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:47300")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS (the capture agent runs in browsers)
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all, use specific origins in production)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Data directory; replay blobs live under `<data_dir>/replays`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for API-key hashing (required off localhost)
    pub hmac_secret: Option<String>,

    /// AES-256 key for API-key encryption, 64 hex chars (required off localhost)
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// API key for the external embedding model; when absent the
    /// deterministic offline provider is used
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL override
    pub base_url: Option<String>,

    /// Embedding model name
    pub model: Option<String>,
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:47300".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./sessionscope-data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig {
                listen_addr: default_http_addr(),
                enable_cors: default_enable_cors(),
                cors_origins: vec![],
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
            },
            auth: AuthConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - SESSIONSCOPE_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:47300)
    /// - SESSIONSCOPE_DATA_DIR: Data directory path (default: ./sessionscope-data)
    /// - SESSIONSCOPE_ENABLE_CORS: Enable CORS (default: true)
    /// - SESSIONSCOPE_HMAC_SECRET: HMAC secret for API-key hashing
    /// - SESSIONSCOPE_ENCRYPTION_KEY: 64-hex-char AES-256 key
    /// - SESSIONSCOPE_EMBEDDING_API_KEY / OPENAI_API_KEY: embedding model key
    /// - SESSIONSCOPE_EMBEDDING_BASE_URL: embedding endpoint override
    /// - SESSIONSCOPE_EMBEDDING_MODEL: embedding model name
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SESSIONSCOPE_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(cors) = std::env::var("SESSIONSCOPE_ENABLE_CORS") {
            config.server.enable_cors = cors.parse().unwrap_or(true);
        }

        if let Ok(data_dir) = std::env::var("SESSIONSCOPE_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secret) = std::env::var("SESSIONSCOPE_HMAC_SECRET") {
            config.auth.hmac_secret = Some(secret);
        }

        if let Ok(key) = std::env::var("SESSIONSCOPE_ENCRYPTION_KEY") {
            config.auth.encryption_key = Some(key);
        }

        if let Ok(key) = std::env::var("SESSIONSCOPE_EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.api_key = Some(key);
        }

        if let Ok(base_url) = std::env::var("SESSIONSCOPE_EMBEDDING_BASE_URL") {
            config.embedding.base_url = Some(base_url);
        }

        if let Ok(model) = std::env::var("SESSIONSCOPE_EMBEDDING_MODEL") {
            config.embedding.model = Some(model);
        }

        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        config = Self::merge_with_env(config);

        Ok(config)
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();

        if std::env::var("SESSIONSCOPE_HTTP_ADDR").is_ok() {
            config.server.listen_addr = env_config.server.listen_addr;
        }
        if std::env::var("SESSIONSCOPE_DATA_DIR").is_ok() {
            config.storage.data_dir = env_config.storage.data_dir;
        }
        if std::env::var("SESSIONSCOPE_HMAC_SECRET").is_ok() {
            config.auth.hmac_secret = env_config.auth.hmac_secret;
        }
        if std::env::var("SESSIONSCOPE_ENCRYPTION_KEY").is_ok() {
            config.auth.encryption_key = env_config.auth.encryption_key;
        }
        if env_config.embedding.api_key.is_some() {
            config.embedding.api_key = config.embedding.api_key.or(env_config.embedding.api_key);
        }

        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// True when binding to a loopback-style address where running with
    /// generated development secrets is acceptable.
    pub fn is_localhost(&self) -> bool {
        self.server.listen_addr.contains("localhost")
            || self.server.listen_addr.contains("127.0.0.1")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if let Some(key) = &self.auth.encryption_key {
            let decoded = hex::decode(key)
                .map_err(|e| anyhow::anyhow!("encryption_key is not valid hex: {e}"))?;
            if decoded.len() != 32 {
                anyhow::bail!(
                    "encryption_key must be 32 bytes (64 hex chars), got {} bytes",
                    decoded.len()
                );
            }
        }

        // Keys may be omitted only for localhost development; anywhere
        // else an unset secret means every issued key dies on restart.
        if !self.is_localhost()
            && (self.auth.hmac_secret.is_none() || self.auth.encryption_key.is_none())
        {
            anyhow::bail!(
                "hmac_secret and encryption_key are required when binding to '{}'. \
                 Set them in the config file or via SESSIONSCOPE_HMAC_SECRET / \
                 SESSIONSCOPE_ENCRYPTION_KEY.",
                self.server.listen_addr
            );
        }

        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir)?;
        }

        Ok(())
    }
}
