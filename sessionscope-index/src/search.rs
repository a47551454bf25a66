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

//! Nearest-neighbor ranking over session feature vectors.

use uuid::Uuid;

use crate::event_vector::{cosine_similarity, remap_to_dimension};

/// A team-scoped candidate with its feature vector.
#[derive(Debug, Clone)]
pub struct SessionCandidate {
    pub uuid: Uuid,
    pub vector: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSession {
    pub uuid: Uuid,
    pub similarity: f64,
}

/// Rank candidates by cosine similarity to the query vector: exclude the
/// query session, sort descending, truncate to `limit`. Candidates whose
/// vector length differs from the query are folded to the query's
/// dimension first, so mixed-mode pools stay comparable.
pub fn rank_candidates(
    query: &[f64],
    candidates: &[SessionCandidate],
    exclude: Option<Uuid>,
    limit: usize,
) -> Vec<RankedSession> {
    let mut ranked: Vec<RankedSession> = candidates
        .iter()
        .filter(|candidate| Some(candidate.uuid) != exclude)
        .map(|candidate| {
            let similarity = if candidate.vector.len() == query.len() {
                cosine_similarity(query, &candidate.vector)
            } else {
                let folded = remap_to_dimension(&candidate.vector, query.len());
                cosine_similarity(query, &folded)
            };
            RankedSession {
                uuid: candidate.uuid,
                similarity,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_vector::{hashed_event_vector, HASH_DIMENSION};

    fn candidate(types: &[&str]) -> SessionCandidate {
        SessionCandidate {
            uuid: Uuid::new_v4(),
            vector: hashed_event_vector(types.iter().copied(), HASH_DIMENSION),
        }
    }

    #[test]
    fn test_results_are_sorted_bounded_and_exclusive() {
        let query_session = candidate(&["click", "click", "page_view"]);
        let pool = vec![
            query_session.clone(),
            candidate(&["click"]),
            candidate(&["click", "page_view"]),
            candidate(&["purchase"]),
            candidate(&["page_view", "page_view"]),
        ];

        let ranked = rank_candidates(
            &query_session.vector,
            &pool,
            Some(query_session.uuid),
            3,
        );

        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|r| r.uuid != query_session.uuid));
        assert!(ranked.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_event_mix_ranks_closer_session_first() {
        // A = {click, click, page_view}, B = {click, page_view,
        // page_view}, C = {purchase, purchase}: a search seeded from A
        // must rank B strictly above C.
        let a = candidate(&["click", "click", "page_view"]);
        let b = candidate(&["click", "page_view", "page_view"]);
        let c = candidate(&["purchase", "purchase"]);

        let ranked = rank_candidates(&a.vector, &[b.clone(), c.clone()], Some(a.uuid), 10);
        assert_eq!(ranked[0].uuid, b.uuid);
        assert_eq!(ranked[1].uuid, c.uuid);
        assert!(ranked[0].similarity > ranked[1].similarity);
    }

    #[test]
    fn test_zero_vector_candidates_score_zero() {
        let query = hashed_event_vector(["click"].into_iter(), HASH_DIMENSION);
        let empty = SessionCandidate {
            uuid: Uuid::new_v4(),
            vector: vec![0.0; HASH_DIMENSION],
        };
        let ranked = rank_candidates(&query, &[empty], None, 10);
        assert_eq!(ranked[0].similarity, 0.0);
    }

    #[test]
    fn test_foreign_dimension_candidates_are_folded() {
        let query = hashed_event_vector(["click"].into_iter(), HASH_DIMENSION);
        // A 384-dim embedding still produces a comparable score.
        let foreign = SessionCandidate {
            uuid: Uuid::new_v4(),
            vector: vec![0.1; 384],
        };
        let ranked = rank_candidates(&query, &[foreign], None, 10);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].similarity.is_finite());
    }

    #[test]
    fn test_limit_zero_yields_nothing() {
        let query = hashed_event_vector(["click"].into_iter(), HASH_DIMENSION);
        let ranked = rank_candidates(&query, &[candidate(&["click"])], None, 0);
        assert!(ranked.is_empty());
    }
}
