// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use crate::error::{Error, Result};

use super::CooMatrix;

/// A compressed sparse row matrix.
///
/// Rows are user-indexed in the forward orientation; [`CsrMatrix::transpose`]
/// produces the item-indexed orientation over the same entries.  Column
/// indices within each row are kept sorted so that identical inputs always
/// compress to identical storage.
#[derive(Debug)]
pub struct CsrMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    pub(crate) row_ptrs: Vec<usize>,
    pub(crate) col_inds: Vec<u32>,
    pub(crate) values: Vec<f32>,
}

impl CsrMatrix {
    /// Compress coordinate triplets into CSR form.
    ///
    /// Rejects entries outside the matrix dimensions and pairs that appear
    /// more than once.
    pub fn from_coo(coo: &CooMatrix) -> Result<CsrMatrix> {
        let nnz = coo.nnz();
        for i in 0..nnz {
            if coo.row[i] as usize >= coo.n_rows {
                return Err(Error::UserOutOfRange {
                    index: coo.row[i],
                    limit: coo.n_rows,
                });
            }
            if coo.col[i] as usize >= coo.n_cols {
                return Err(Error::ItemOutOfRange {
                    index: coo.col[i],
                    limit: coo.n_cols,
                });
            }
        }

        // step 1: count row entries, placing counts in row_ptrs[r+1]
        let mut row_ptrs = vec![0usize; coo.n_rows + 1];
        for r in &coo.row {
            row_ptrs[*r as usize + 1] += 1;
        }

        // step 2: convert row counts into row offsets
        for i in 1..=coo.n_rows {
            let prev = row_ptrs[i - 1];
            row_ptrs[i] += prev;
        }

        // step 3: scatter entries into their rows
        let mut col_inds = vec![0u32; nnz];
        let mut values = vec![0.0f32; nnz];
        let mut row_ips = row_ptrs.clone();
        for i in 0..nnz {
            let r = coo.row[i] as usize;
            let pos = row_ips[r];
            col_inds[pos] = coo.col[i];
            values[pos] = coo.val[i];
            row_ips[r] += 1;
        }

        // step 4: order each row by column and reject duplicate pairs
        let mut scratch: Vec<(u32, f32)> = Vec::new();
        for r in 0..coo.n_rows {
            let (sp, ep) = (row_ptrs[r], row_ptrs[r + 1]);
            if ep - sp < 2 {
                continue;
            }
            scratch.clear();
            scratch.extend(
                col_inds[sp..ep]
                    .iter()
                    .copied()
                    .zip(values[sp..ep].iter().copied()),
            );
            scratch.sort_unstable_by_key(|(c, _)| *c);
            for k in 1..scratch.len() {
                if scratch[k].0 == scratch[k - 1].0 {
                    return Err(Error::DuplicateInteraction {
                        user: r as u32,
                        item: scratch[k].0,
                    });
                }
            }
            for (k, (c, v)) in scratch.iter().enumerate() {
                col_inds[sp + k] = *c;
                values[sp + k] = *v;
            }
        }

        Ok(CsrMatrix {
            n_rows: coo.n_rows,
            n_cols: coo.n_cols,
            row_ptrs,
            col_inds,
            values,
        })
    }

    /// Get the number of stored values in the matrix.
    pub fn nnz(&self) -> usize {
        self.row_ptrs[self.n_rows]
    }

    /// Get the extent in the underlying arrays for a row in the matrix.
    pub fn extent(&self, row: usize) -> (usize, usize) {
        (self.row_ptrs[row], self.row_ptrs[row + 1])
    }

    /// Get the column indices for a row in the matrix.
    pub fn row_cols(&self, row: usize) -> &[u32] {
        let (start, end) = self.extent(row);
        &self.col_inds[start..end]
    }

    /// Get the values for a row in the matrix.
    pub fn row_vals(&self, row: usize) -> &[f32] {
        let (start, end) = self.extent(row);
        &self.values[start..end]
    }

    /// Copy the matrix, replacing each stored value through `f`.
    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> CsrMatrix {
        CsrMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptrs: self.row_ptrs.clone(),
            col_inds: self.col_inds.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Transpose the matrix structure and values.
    pub fn transpose(&self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptrs = vec![0usize; self.n_cols + 1];

        // step 1: count column values, placing counts in row_ptrs[c+1]
        for c in &self.col_inds {
            row_ptrs[*c as usize + 1] += 1;
        }

        // step 2: convert column counts into row offsets
        for i in 1..=self.n_cols {
            let prev = row_ptrs[i - 1];
            row_ptrs[i] += prev;
        }

        // step 3: insert row indices and values into the outputs
        let mut col_inds = vec![0u32; nnz];
        let mut values = vec![0.0f32; nnz];
        let mut row_ips = row_ptrs.clone();
        for row in 0..self.n_rows {
            let (sp, ep) = self.extent(row);
            for ci in sp..ep {
                let cv = self.col_inds[ci] as usize;
                let pos = row_ips[cv];
                col_inds[pos] = row as u32;
                values[pos] = self.values[ci];
                row_ips[cv] += 1;
            }
        }

        CsrMatrix {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            row_ptrs,
            col_inds,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> CooMatrix {
        // 3x4 matrix, entries deliberately out of order
        let mut coo = CooMatrix::with_capacity(3, 4, 5);
        coo.add_entry(1, 3, 5.0);
        coo.add_entry(0, 2, 1.0);
        coo.add_entry(1, 0, 2.0);
        coo.add_entry(2, 1, 4.0);
        coo.add_entry(0, 0, 3.0);
        coo
    }

    #[test]
    fn compresses_and_sorts_rows() {
        let csr = CsrMatrix::from_coo(&fixture()).unwrap();
        assert_eq!(csr.n_rows, 3);
        assert_eq!(csr.n_cols, 4);
        assert_eq!(csr.nnz(), 5);
        assert_eq!(csr.row_cols(0), &[0, 2]);
        assert_eq!(csr.row_vals(0), &[3.0, 1.0]);
        assert_eq!(csr.row_cols(1), &[0, 3]);
        assert_eq!(csr.row_vals(1), &[2.0, 5.0]);
        assert_eq!(csr.row_cols(2), &[1]);
    }

    #[test]
    fn empty_rows_have_empty_extents() {
        let coo = CooMatrix::with_capacity(4, 2, 1);
        let csr = CsrMatrix::from_coo(&coo).unwrap();
        assert_eq!(csr.nnz(), 0);
        for r in 0..4 {
            assert_eq!(csr.extent(r), (0, 0));
            assert!(csr.row_cols(r).is_empty());
        }
    }

    #[test]
    fn transpose_flips_entries() {
        let csr = CsrMatrix::from_coo(&fixture()).unwrap();
        let t = csr.transpose();
        assert_eq!(t.n_rows, 4);
        assert_eq!(t.n_cols, 3);
        assert_eq!(t.nnz(), 5);
        assert_eq!(t.row_cols(0), &[0, 1]);
        assert_eq!(t.row_vals(0), &[3.0, 2.0]);
        assert_eq!(t.row_cols(1), &[2]);
        assert_eq!(t.row_vals(1), &[4.0]);
        assert_eq!(t.row_cols(2), &[0]);
        assert_eq!(t.row_cols(3), &[1]);
        assert_eq!(t.row_vals(3), &[5.0]);
    }

    #[test]
    fn rejects_duplicate_pairs() {
        let mut coo = fixture();
        coo.add_entry(1, 3, 9.0);
        let err = CsrMatrix::from_coo(&coo).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateInteraction { user: 1, item: 3 }
        ));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut coo = fixture();
        coo.add_entry(3, 0, 1.0);
        assert!(matches!(
            CsrMatrix::from_coo(&coo).unwrap_err(),
            Error::UserOutOfRange { index: 3, limit: 3 }
        ));

        let mut coo = fixture();
        coo.add_entry(0, 4, 1.0);
        assert!(matches!(
            CsrMatrix::from_coo(&coo).unwrap_err(),
            Error::ItemOutOfRange { index: 4, limit: 4 }
        ));
    }
}
