// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Dense symmetric positive-definite solves.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use nshare::{IntoNalgebra, IntoNdarray1};
use thiserror::Error;

/// Failure of a row's normal-equation solve.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// Cholesky factorization failed; the system is not positive definite.
    #[error("system is not positive definite")]
    NotPositive,
    /// The accumulated system contains NaN or infinite values.
    #[error("system contains non-finite values")]
    NonFinite,
}

/// Solve `a * x = b` for symmetric positive-definite `a` by Cholesky
/// factorization.
///
/// The regularized normal equations the row updates produce are positive
/// definite for any `lambda > 0`, so a factorization failure here means the
/// system was corrupted upstream rather than merely ill-conditioned.
pub(crate) fn solve_spd(a: Array2<f64>, b: Array1<f64>) -> Result<Array1<f64>, SolveError> {
    debug_assert_eq!(a.nrows(), a.ncols());
    debug_assert_eq!(b.len(), a.nrows());
    if a.iter().any(|v| !v.is_finite()) || b.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::NonFinite);
    }

    let a: DMatrix<f64> = a.into_nalgebra();
    let b: DVector<f64> = b.into_nalgebra();
    let chol = a.cholesky().ok_or(SolveError::NotPositive)?;
    let x = chol.solve(&b);
    Ok(x.into_ndarray1())
}
