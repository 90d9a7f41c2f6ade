//! Vector math shared by ingestion and search.

/// Euclidean length, accumulated in `f64`.
#[must_use]
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Scale `v` to unit length. A zero vector is returned unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    if norm == 0.0 || !norm.is_finite() {
        return v;
    }
    for x in &mut v {
        *x = (f64::from(*x) / norm) as f32;
    }
    v
}

/// Dot product over the common prefix of `a` and `b`.
///
/// For unit vectors this equals cosine similarity.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum::<f64>() as f32
}
