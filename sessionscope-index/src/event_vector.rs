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

//! Hashed event vectors and the vector math shared by both modes.
//!
//! The event hash is a DJB2-style rolling hash over UTF-16 code units
//! with 32-bit wrapping arithmetic, matching the wire-compatible
//! definition: `hash = ((hash << 5) + hash) + code_unit`, absolute
//! value, reduced modulo the target dimension.

/// Canonical dimension for hashed event vectors.
pub const HASH_DIMENSION: usize = 64;

fn djb2(s: &str) -> u32 {
    let mut hash: i32 = 5381;
    for unit in s.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// Bag-of-event-types vector: each type hashes to a bucket whose count
/// is incremented, then the vector is L2-normalized. An all-zero vector
/// (no events) is returned unnormalized.
pub fn hashed_event_vector<'a, I>(event_types: I, dimension: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut vector = vec![0.0_f64; dimension];
    for event_type in event_types {
        let bucket = djb2(event_type) as usize % dimension;
        vector[bucket] += 1.0;
    }
    l2_normalize(vector)
}

/// Normalize to unit L2 length; a zero vector passes through unchanged.
pub fn l2_normalize(mut vector: Vec<f64>) -> Vec<f64> {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vector;
    }
    for x in &mut vector {
        *x /= norm;
    }
    vector
}

/// Fold a vector of any length into `dimension` buckets: source index
/// `i` sums into bucket `i % dimension`, then the result is
/// renormalized. Guarantees dimensional compatibility regardless of
/// which mode produced the stored vector.
pub fn remap_to_dimension(vector: &[f64], dimension: usize) -> Vec<f64> {
    let mut out = vec![0.0_f64; dimension];
    for (i, value) in vector.iter().enumerate() {
        out[i % dimension] += value;
    }
    l2_normalize(out)
}

/// Cosine similarity; a zero-norm denominator yields 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f64]) -> f64 {
        v.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    #[test]
    fn test_vector_is_pure_in_the_type_sequence() {
        let types = ["click", "click", "page_view"];
        let a = hashed_event_vector(types.iter().copied(), HASH_DIMENSION);
        let b = hashed_event_vector(types.iter().copied(), HASH_DIMENSION);
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_empty_input_has_unit_norm() {
        let v = hashed_event_vector(["click", "scroll"].into_iter(), HASH_DIMENSION);
        assert!((norm(&v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_stays_zero() {
        let v = hashed_event_vector(std::iter::empty(), HASH_DIMENSION);
        assert_eq!(norm(&v), 0.0);
        assert_eq!(v.len(), HASH_DIMENSION);
    }

    #[test]
    fn test_remap_to_same_dimension_is_idempotent() {
        let v = hashed_event_vector(
            ["click", "click", "purchase", "page_view"].into_iter(),
            HASH_DIMENSION,
        );
        let remapped = remap_to_dimension(&v, HASH_DIMENSION);
        for (a, b) in v.iter().zip(remapped.iter()) {
            assert!((a - b).abs() <= 1e-9);
        }
    }

    #[test]
    fn test_remap_folds_longer_vectors() {
        // 128 → 64: index i folds into i % 64, summed.
        let mut long = vec![0.0; 128];
        long[0] = 3.0;
        long[64] = 1.0;
        let folded = remap_to_dimension(&long, 64);
        assert!((folded[0] - 1.0).abs() < 1e-12);
        assert!(folded[1..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let v = hashed_event_vector(["click", "page_view"].into_iter(), HASH_DIMENSION);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }
}
