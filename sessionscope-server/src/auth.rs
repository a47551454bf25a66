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

//! API-key protocol: issuance, matching, and the bearer middleware.
//!
//! Every write carries the plaintext key as a bearer token. The gateway
//! recomputes HMAC-SHA256(secret, key) and resolves the team by exact
//! hash match. No decryption happens on the hot path. The ciphertext
//! (AES-256-CTR) is stored only for a potential future reveal.

use aes::cipher::{KeyIvInit, StreamCipher};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;

use sessionscope_core::ApiKeyRecord;
use sessionscope_storage::KeyStore;

use crate::api::{ApiError, AppState};

/// Raw entropy per key; hex-encoded to a 64-char token.
pub const API_KEY_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// The authenticated caller, attached to the request by the middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub team_id: i64,
}

pub struct ApiKeyService {
    hmac_secret: Vec<u8>,
    encryption_key: [u8; 32],
    keys: Arc<KeyStore>,
}

impl ApiKeyService {
    pub fn new(hmac_secret: impl Into<Vec<u8>>, encryption_key: [u8; 32], keys: Arc<KeyStore>) -> Self {
        Self {
            hmac_secret: hmac_secret.into(),
            encryption_key,
            keys,
        }
    }

    /// Issue a fresh key for a team, replacing any prior key (the old
    /// key stops authenticating immediately). Returns the plaintext,
    /// the only time it is ever visible.
    pub fn generate_key(&self, team_id: i64) -> String {
        let mut key_bytes = [0u8; API_KEY_BYTES];
        OsRng.fill_bytes(&mut key_bytes);
        let plaintext = hex::encode(key_bytes);

        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut iv);

        let mut ciphertext = plaintext.clone().into_bytes();
        let mut cipher = Aes256Ctr::new(&self.encryption_key.into(), &iv.into());
        cipher.apply_keystream(&mut ciphertext);

        self.keys.upsert(ApiKeyRecord {
            team_id,
            key_hash: self.key_hash(&plaintext),
            encrypted_key: hex::encode(ciphertext),
            iv: hex::encode(iv),
        });

        plaintext
    }

    /// Resolve a presented key to its team, or `None` for anything that
    /// does not hash to a stored record.
    pub fn match_key(&self, presented: &str) -> Option<i64> {
        if presented.is_empty() {
            return None;
        }
        self.keys.team_for_hash(&self.key_hash(presented))
    }

    /// Operator-plane reveal: decrypt the stored ciphertext. Never used
    /// for authentication.
    pub fn reveal_key(&self, team_id: i64) -> Option<String> {
        let record = self.keys.record_for_team(team_id)?;
        let mut bytes = hex::decode(&record.encrypted_key).ok()?;
        let iv: [u8; 16] = hex::decode(&record.iv).ok()?.try_into().ok()?;
        let mut cipher = Aes256Ctr::new(&self.encryption_key.into(), &iv.into());
        cipher.apply_keystream(&mut bytes);
        String::from_utf8(bytes).ok()
    }

    fn key_hash(&self, plaintext: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_secret)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Middleware for the bearer-key plane: 401 before any handler runs,
/// otherwise the resolved [`AuthContext`] rides the request extensions.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or(ApiError::Unauthorized)?;
    let team_id = state
        .key_service
        .match_key(token)
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(AuthContext { team_id });
    Ok(next.run(request).await)
}
