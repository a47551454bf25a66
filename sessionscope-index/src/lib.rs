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

//! Similarity engine: session feature vectors and nearest-neighbor
//! ranking.
//!
//! Two interchangeable vectorization modes:
//!
//! - `eventhash`: a deterministic, fixed-dimension bag of hashed event
//!   types. Free to compute, fully reproducible, at the cost of hash
//!   collisions blending unrelated event types into one bucket.
//! - `embedding`: a variable-dimension vector from an external
//!   text-embedding model over a serialized session transcript.
//!
//! Cross-mode comparisons fold any foreign-length vector into the
//! canonical hash dimension before cosine ranking.

pub mod embedding;
pub mod event_vector;
pub mod search;
pub mod transcript;

pub use embedding::{
    average_embeddings, DeterministicEmbeddingProvider, EmbeddingError, EmbeddingProvider,
    OpenAiEmbeddingProvider,
};
pub use event_vector::{
    cosine_similarity, hashed_event_vector, l2_normalize, remap_to_dimension, HASH_DIMENSION,
};
pub use search::{rank_candidates, RankedSession, SessionCandidate};
pub use transcript::{serialize_transcript, split_into_chunks, TranscriptEvent};
