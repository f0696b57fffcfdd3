// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Batched half-updates of one factor matrix.

use log::debug;
use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::factors::FactorMatrix;
use crate::progress::ProgressHandle;
use crate::sparse::CsrMatrix;

use super::solve::{solve_spd, SolveError};

/// Update rows `start..end` of `target`, holding `fixed` constant.
///
/// `conf` must be indexed the same way as `target`: one sparse row of
/// confidence weights per target row, with columns indexing into `fixed`.
/// Row solves run in parallel; each row depends only on `fixed` and its own
/// confidence row, so the result does not depend on how the full pass is cut
/// into batches.
///
/// Returns the Frobenius norm of the change across the batch.
pub(crate) fn update_half(
    target: &mut Array2<f32>,
    fixed: &Array2<f32>,
    conf: &CsrMatrix,
    which: FactorMatrix,
    lambda: f64,
    start: usize,
    end: usize,
    progress: &ProgressHandle,
) -> Result<f32> {
    debug!(
        "updating {} rows {}..{} against {} fixed rows",
        which,
        start,
        end,
        fixed.nrows()
    );
    let gram = regularized_gram(&fixed.view(), lambda);
    let fixed = fixed.view();

    let mut batch = target.slice_mut(s![start..end, ..]);
    let sq_delta: f64 = batch
        .outer_iter_mut()
        .into_par_iter()
        .enumerate()
        .map(|(i, row)| -> Result<f64> {
            let r = start + i;
            let d = update_row(row, &fixed, &gram, conf, r).map_err(|source| Error::Singular {
                matrix: which,
                row: r,
                source,
            })?;
            progress.tick();
            Ok(d)
        })
        .try_reduce(|| 0.0, |a, b| Ok(a + b))?;

    Ok(sq_delta.sqrt() as f32)
}

/// Gram matrix of the fixed factors plus the ridge term, in double precision.
fn regularized_gram(fixed: &ArrayView2<f32>, lambda: f64) -> Array2<f64> {
    let f = fixed.ncols();
    let mut gram = Array2::<f64>::zeros((f, f));
    for row in fixed.outer_iter() {
        for i in 0..f {
            let vi = row[i] as f64;
            for j in i..f {
                gram[[i, j]] += vi * row[j] as f64;
            }
        }
    }
    for i in 0..f {
        for j in 0..i {
            gram[[i, j]] = gram[[j, i]];
        }
        gram[[i, i]] += lambda;
    }
    gram
}

fn update_row(
    mut row: ArrayViewMut1<f32>,
    fixed: &ArrayView2<f32>,
    gram: &Array2<f64>,
    conf: &CsrMatrix,
    r: usize,
) -> std::result::Result<f64, SolveError> {
    let cols = conf.row_cols(r);
    if cols.is_empty() {
        row.fill(0.0);
        return Ok(0.0);
    }

    let cols: Vec<usize> = cols.iter().map(|c| *c as usize).collect();
    let picked = fixed.select(Axis(0), &cols).mapv(|v| v as f64);
    let mut vals: Array1<f64> = conf.row_vals(r).iter().map(|v| *v as f64).collect();

    // normal equations: the stored weights are the confidence above the
    // baseline of 1, so they correct the Gram matrix directly, and adding
    // the baseline back yields the right-hand side
    let pt = picked.t();
    let scaled = &pt * &vals;
    let mut a = scaled.dot(&picked);
    a += gram;
    vals += 1.0;
    let b = pt.dot(&vals);

    let soln = solve_spd(a, b)?;

    let mut sq = 0.0;
    for (dst, v) in row.iter_mut().zip(soln.iter()) {
        let next = *v as f32;
        let d = (next - *dst) as f64;
        sq += d * d;
        *dst = next;
    }
    Ok(sq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CooMatrix;
    use ndarray::array;

    fn handle(rows: usize) -> ProgressHandle {
        ProgressHandle::new("rows".into(), rows)
    }

    /// Weights here are already the above-baseline confidence values.
    fn conf(n_rows: usize, n_cols: usize, entries: &[(u32, u32, f32)]) -> CsrMatrix {
        let mut coo = CooMatrix::with_capacity(n_rows, n_cols, entries.len());
        for (r, c, v) in entries {
            coo.add_entry(*r, *c, *v);
        }
        CsrMatrix::from_coo(&coo).unwrap()
    }

    #[test]
    fn single_row_matches_closed_form() {
        // one user, one item, one factor: the solve reduces to
        //   x = (s + 1) y / (y^2 (s + 1) + lambda)
        let y = 2.0f32;
        let s = 3.0f32;
        let lambda = 0.5f64;
        let mut x = array![[0.1f32]];
        let fixed = array![[y]];
        let c = conf(1, 1, &[(0, 0, s)]);

        let delta = update_half(
            &mut x,
            &fixed,
            &c,
            FactorMatrix::X,
            lambda,
            0,
            1,
            &handle(1),
        )
        .unwrap();

        let expected = (8.0 / 16.5) as f32;
        assert!((x[[0, 0]] - expected).abs() < 1e-6);
        assert!((delta - (expected - 0.1).abs()).abs() < 1e-6);
    }

    #[test]
    fn two_factor_row_matches_closed_form() {
        // fixed rows [1, 0] and [1, 1], lambda 0.5, one weight of 2 on the
        // second fixed row:
        //   A = YtY + lambda I + 2 y1 y1^T = [[4.5, 3], [3, 3.5]]
        //   b = 3 y1 = [3, 3]
        // which solves to x = [2/9, 2/3]
        let mut x = array![[0.0f32, 0.0]];
        let fixed = array![[1.0f32, 0.0], [1.0, 1.0]];
        let c = conf(1, 2, &[(0, 1, 2.0)]);

        update_half(&mut x, &fixed, &c, FactorMatrix::X, 0.5, 0, 1, &handle(1)).unwrap();

        assert!((x[[0, 0]] - 2.0 / 9.0).abs() < 1e-6);
        assert!((x[[0, 1]] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn singular_systems_surface_the_offending_row() {
        // without regularization, an all-zero fixed row leaves row 0 with a
        // zero system; row 1 has no interactions and stays fine
        let mut x = array![[0.1f32], [0.2]];
        let fixed = array![[0.0f32]];
        let c = conf(2, 1, &[(0, 0, 1.0)]);

        let err =
            update_half(&mut x, &fixed, &c, FactorMatrix::X, 0.0, 0, 2, &handle(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::Singular {
                matrix: FactorMatrix::X,
                row: 0,
                ..
            }
        ));
    }

    #[test]
    fn empty_rows_fall_to_zero() {
        let mut x = array![[0.3f32, 0.4], [0.5, 0.6]];
        let fixed = array![[1.0f32, 0.0], [0.0, 1.0]];
        // user 1 has no interactions at all
        let c = conf(2, 2, &[(0, 0, 2.0)]);

        update_half(&mut x, &fixed, &c, FactorMatrix::X, 1e-3, 0, 2, &handle(2)).unwrap();

        assert_eq!(x.row(1), array![0.0f32, 0.0]);
        assert!(x.row(0).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn batching_does_not_change_results() {
        let fixed = array![[1.0f32, 0.5], [0.2, 0.8]];
        let c = conf(3, 2, &[(0, 0, 2.0), (1, 1, 1.0), (2, 0, 0.5), (2, 1, 1.5)]);
        let init = array![[0.1f32, 0.2], [0.3, 0.4], [0.5, 0.6]];

        let mut whole = init.clone();
        update_half(&mut whole, &fixed, &c, FactorMatrix::X, 1e-3, 0, 3, &handle(3)).unwrap();

        let mut split = init.clone();
        update_half(&mut split, &fixed, &c, FactorMatrix::X, 1e-3, 0, 1, &handle(3)).unwrap();
        update_half(&mut split, &fixed, &c, FactorMatrix::X, 1e-3, 1, 3, &handle(3)).unwrap();

        assert_eq!(whole, split);
    }
}
