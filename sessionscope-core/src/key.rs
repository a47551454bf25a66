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

//! API-key records.
//!
//! One record per team (upsert keyed on `team_id`); issuing a new key
//! replaces the old one and invalidates it immediately. `key_hash` is
//! hex(HMAC-SHA256(secret, plaintext)) and carries authentication on its
//! own; `encrypted_key`/`iv` (AES-256-CTR) are retained only for a
//! potential future reveal and are never consulted on the auth path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub team_id: i64,
    pub key_hash: String,
    pub encrypted_key: String,
    pub iv: String,
}
