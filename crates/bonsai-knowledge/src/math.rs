//! Vector math for retrieval.

/// Dot product of two equal-length slices.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Squared Euclidean distance, the metric of the flat index.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Cosine similarity in `[-1, 1]`.
///
/// A zero-norm operand has no direction; its similarity to anything is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (dot_product(a, b) / denom).clamp(-1.0, 1.0)
}

/// Map a squared L2 distance onto a higher-is-better relevance in `(0, 1]`.
pub fn distance_to_relevance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// True when every component is zero (or the vector is empty).
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// True when every component is finite.
pub fn is_finite_vector(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let b = vec![1.0; 8];
        assert!((dot_product(&a, &b) - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let s = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(s, 0.0);
        assert!(!s.is_nan());
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_distance_to_relevance_is_monotonic() {
        assert_eq!(distance_to_relevance(0.0), 1.0);
        assert!(distance_to_relevance(0.5) > distance_to_relevance(2.0));
        assert!(distance_to_relevance(1e9) > 0.0);
    }

    #[test]
    fn test_vector_predicates() {
        assert!(is_zero_vector(&[0.0, 0.0]));
        assert!(!is_zero_vector(&[0.0, 1e-9]));
        assert!(is_finite_vector(&[1.0, -2.0]));
        assert!(!is_finite_vector(&[1.0, f32::NAN]));
    }
}
