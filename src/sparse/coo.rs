// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse coordinate triplets.

/// A sparse matrix in coordinate (triplet) form.
///
/// This is the accumulation format: interactions land here one batch at a
/// time, in whatever order the source yields them, and are compressed into a
/// [`CsrMatrix`](super::CsrMatrix) once the stream completes.
pub struct CooMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    pub row: Vec<u32>,
    pub col: Vec<u32>,
    pub val: Vec<f32>,
}

impl CooMatrix {
    /// Initialize an empty matrix with room for a known number of entries.
    pub fn with_capacity(n_rows: usize, n_cols: usize, cap: usize) -> Self {
        CooMatrix {
            n_rows,
            n_cols,
            row: Vec::with_capacity(cap),
            col: Vec::with_capacity(cap),
            val: Vec::with_capacity(cap),
        }
    }

    /// Assemble a matrix from parallel triplet vectors.
    ///
    /// Returns `None` if the vectors do not have matching lengths.
    pub fn from_parts(
        n_rows: usize,
        n_cols: usize,
        row: Vec<u32>,
        col: Vec<u32>,
        val: Vec<f32>,
    ) -> Option<Self> {
        if row.len() != col.len() || row.len() != val.len() {
            return None;
        }
        Some(CooMatrix {
            n_rows,
            n_cols,
            row,
            col,
            val,
        })
    }

    pub fn add_entry(&mut self, row: u32, col: u32, val: f32) {
        self.row.push(row);
        self.col.push(col);
        self.val.push(val);
    }

    /// Get the number of stored entries.
    pub fn nnz(&self) -> usize {
        self.row.len()
    }
}
