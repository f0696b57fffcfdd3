// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Confidence weighting of raw play counts.

use crate::sparse::CsrMatrix;

/// Map one raw play count to its confidence weight.
///
/// The returned value is the amount the count lifts confidence *above* the
/// baseline of 1 that every unobserved pair carries; the solver adds the
/// baseline back where the full weight is needed.  Computed as
/// `alpha * ln(1 + epsilon * count)` in double precision before rounding to
/// `f32`.
pub fn confidence(count: f32, alpha: f32, epsilon: f32) -> f32 {
    let c = alpha as f64 * (1.0 + epsilon as f64 * count as f64).ln();
    c as f32
}

/// Transform a matrix of raw play counts into confidence weights.
///
/// Only stored entries are transformed, so the result has exactly the
/// sparsity pattern of the input.
pub fn confidence_matrix(counts: &CsrMatrix, alpha: f32, epsilon: f32) -> CsrMatrix {
    counts.map_values(|v| confidence(v, alpha, epsilon))
}
