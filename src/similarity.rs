// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Cosine-similarity queries over factor rows.

use std::cmp::Reverse;

use ndarray::{Array1, ArrayView1, ArrayView2};
use ordered_float::NotNan;

/// A scored factor row.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub similarity: f32,
    pub norm: f32,
}

/// A scored item, keyed the way callers query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarItem {
    pub key: String,
    pub similarity: f32,
    pub norm: f32,
}

/// Score every row of `matrix` against `query` and keep the top `n`.
///
/// Rows whose similarity comes out NaN or infinite (zero-norm rows against
/// any query, for instance) are dropped before selection.  Selection is a
/// partial ordering pass over the scores; the tail beyond `n` is never
/// sorted.
pub fn closest_rows(
    matrix: &ArrayView2<f32>,
    query: &ArrayView1<f32>,
    n: usize,
    ordered: bool,
) -> Vec<Neighbor> {
    let q_norm = query.dot(query).sqrt();

    let mut hits: Vec<(NotNan<f32>, usize, f32)> = Vec::new();
    for (i, row) in matrix.outer_iter().enumerate() {
        let norm = row.dot(&row).sqrt();
        let sim = row.dot(query) / (norm * q_norm);
        if sim.is_finite() {
            if let Ok(sim) = NotNan::new(sim) {
                hits.push((sim, i, norm));
            }
        }
    }

    if n == 0 {
        hits.clear();
    } else if hits.len() > n {
        hits.select_nth_unstable_by_key(n - 1, |(sim, _, _)| Reverse(*sim));
        hits.truncate(n);
    }
    if ordered {
        hits.sort_unstable_by_key(|(sim, _, _)| Reverse(*sim));
    }

    hits.into_iter()
        .map(|(sim, index, norm)| Neighbor {
            index,
            similarity: sim.into_inner(),
            norm,
        })
        .collect()
}

/// Scale a vector to unit length.
///
/// Returns `None` for the zero vector (or one with a non-finite norm),
/// which has no direction to preserve.
pub fn unit_normalized(v: &ArrayView1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(v).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.mapv(|x| x / norm))
}
