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

pub mod api;
pub mod auth;
pub mod config;
pub mod validation;

use anyhow::Result;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionscope_index::{
    DeterministicEmbeddingProvider, EmbeddingProvider, OpenAiEmbeddingProvider,
};
use sessionscope_storage::{
    EventStore, FsObjectStore, KeyStore, MetricStore, ReplayStore, SessionStore,
};

use api::AppState;
use auth::ApiKeyService;
use config::ServerConfig;

/// Assemble the application state from configuration: stores, the key
/// service, and the embedding provider.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let keys = Arc::new(KeyStore::new());

    let hmac_secret: Vec<u8> = match &config.auth.hmac_secret {
        Some(secret) => secret.clone().into_bytes(),
        None => {
            tracing::warn!(
                "auth.hmac_secret not set; generating a development secret. \
                 Issued keys will not authenticate after a restart."
            );
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            bytes.to_vec()
        }
    };

    let encryption_key: [u8; 32] = match &config.auth.encryption_key {
        Some(hex_key) => hex::decode(hex_key)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("encryption_key must decode to exactly 32 bytes"))?,
        None => {
            tracing::warn!("auth.encryption_key not set; generating a development key");
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            bytes
        }
    };

    let key_service = Arc::new(ApiKeyService::new(hmac_secret, encryption_key, keys.clone()));

    let replay_root = config.storage.data_dir.join("replays");
    let replays = Arc::new(ReplayStore::new(FsObjectStore::new(replay_root)));

    let embedder: Arc<dyn EmbeddingProvider> = match &config.embedding.api_key {
        Some(api_key) => {
            let mut provider = OpenAiEmbeddingProvider::new(api_key.clone());
            if let Some(base_url) = &config.embedding.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(model) = &config.embedding.model {
                provider = provider.with_model(model.clone());
            }
            tracing::info!("embedding provider: external model");
            Arc::new(provider)
        }
        None => {
            tracing::warn!(
                "embedding.api_key not set; using the deterministic offline embedding provider"
            );
            Arc::new(DeterministicEmbeddingProvider::default())
        }
    };

    Ok(AppState {
        sessions: Arc::new(SessionStore::new()),
        events: Arc::new(EventStore::new()),
        metrics: Arc::new(MetricStore::new()),
        keys,
        replays,
        key_service,
        embedder,
    })
}

/// Build the full router. Session-scoped ingestion and the read plane
/// ride the bearer-key middleware; end-session authenticates in-handler
/// (beacons may carry the key in the body), and the similarity/operator
/// plane is unauthenticated, called server-side by trusted collaborators.
pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/generate-user-uuid", get(api::identity::generate_user_uuid))
        .route(
            "/generate-session-uuid",
            get(api::identity::generate_session_uuid),
        )
        .route("/identify-user", post(api::identity::identify_user))
        .route("/capture-event", post(api::events::capture_event))
        .route("/update-metric", post(api::events::update_metric))
        .route(
            "/append-replay-events",
            post(api::replay::append_replay_events),
        )
        // Sessions read plane
        .route("/sessions", get(api::sessions::list_sessions))
        .route("/sessions/:uuid", get(api::sessions::get_session))
        .route(
            "/sessions/:uuid/events",
            get(api::sessions::get_session_events),
        )
        .route(
            "/sessions/:uuid/replay",
            get(api::sessions::get_session_replay),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/generate-api-key", post(api::keys::generate_api_key))
        .route("/end-session", post(api::replay::end_session))
        .route("/vectorize", post(api::similarity::vectorize))
        .route("/similarity", post(api::similarity::similarity))
        .merge(authed)
        .with_state(state)
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionscope_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SessionScope gateway");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;

    let state = build_state(&config)?;
    let app = build_router(state)
        .layer(if config.server.enable_cors {
            // The capture agent runs in end-user browsers, so CORS must
            // be open unless origins are pinned.
            if config.server.cors_origins.is_empty() {
                tracing::warn!(
                    "CORS: allowing all origins (development mode). Set cors_origins in production!"
                );
            } else {
                tracing::info!("CORS: allowing origins: {:?}", config.server.cors_origins);
            }
            CorsLayer::new()
                .allow_methods(Any)
                .allow_headers(Any)
                .allow_origin(Any)
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http());

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_state() {
        let mut config = ServerConfig::default();
        config.storage.data_dir = std::env::temp_dir().join("sessionscope-test-state");
        assert!(build_state(&config).is_ok());
    }
}
