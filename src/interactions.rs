// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Interaction sources and the compressed interaction store.

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::confidence::confidence_matrix;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressHandle;
use crate::sparse::{CooMatrix, CsrMatrix};

/// A source of user/item play counts.
///
/// Implementations expose a fixed universe of `num_users` x `num_items`
/// index positions, stream the observed counts in pages, and translate
/// between item row indices and the external keys callers query by.
pub trait InteractionSource {
    /// Batch iterator returned by [`InteractionSource::stream_interactions`].
    type Batches<'a>: Iterator<Item = Vec<(u32, u32, f32)>>
    where
        Self: 'a;

    /// Get the number of user rows in the universe.
    fn num_users(&self) -> usize;

    /// Get the number of item rows in the universe.
    fn num_items(&self) -> usize;

    /// Get the total number of interactions the stream will yield.
    fn interaction_count(&self) -> usize;

    /// Stream `(user, item, count)` triplets in pages of at most
    /// `batch_size` entries.  `batch_size` must be positive.
    fn stream_interactions(&self, batch_size: usize) -> Self::Batches<'_>;

    /// Map an external item key to its row index.
    fn resolve_row_for_key(&self, key: &str) -> Option<usize>;

    /// Map an item row index back to its external key.
    fn resolve_key_for_row(&self, row: usize) -> Option<&str>;
}

/// An in-memory interaction source.
///
/// The item universe is defined by the key list: row `i` belongs to
/// `item_keys[i]`.
#[derive(Clone)]
pub struct MemorySource {
    num_users: usize,
    plays: Vec<(u32, u32, f32)>,
    item_keys: Vec<String>,
    key_rows: FxHashMap<String, usize>,
}

impl MemorySource {
    /// Create a source over an in-memory triplet list.
    ///
    /// Fails if the item keys are not distinct.
    pub fn new(
        num_users: usize,
        plays: Vec<(u32, u32, f32)>,
        item_keys: Vec<String>,
    ) -> Result<MemorySource> {
        let mut key_rows = FxHashMap::default();
        key_rows.reserve(item_keys.len());
        for (row, key) in item_keys.iter().enumerate() {
            if key_rows.insert(key.clone(), row).is_some() {
                return Err(Error::Config {
                    param: "item_keys",
                    reason: format!("duplicate key {:?}", key),
                });
            }
        }
        Ok(MemorySource {
            num_users,
            plays,
            item_keys,
            key_rows,
        })
    }
}

impl InteractionSource for MemorySource {
    type Batches<'a> = MemoryBatches<'a>;

    fn num_users(&self) -> usize {
        self.num_users
    }

    fn num_items(&self) -> usize {
        self.item_keys.len()
    }

    fn interaction_count(&self) -> usize {
        self.plays.len()
    }

    fn stream_interactions(&self, batch_size: usize) -> MemoryBatches<'_> {
        MemoryBatches {
            rest: &self.plays,
            batch: batch_size,
        }
    }

    fn resolve_row_for_key(&self, key: &str) -> Option<usize> {
        self.key_rows.get(key).copied()
    }

    fn resolve_key_for_row(&self, row: usize) -> Option<&str> {
        self.item_keys.get(row).map(|k| k.as_str())
    }
}

/// Paging iterator over an in-memory triplet slice.
pub struct MemoryBatches<'a> {
    rest: &'a [(u32, u32, f32)],
    batch: usize,
}

impl<'a> Iterator for MemoryBatches<'a> {
    type Item = Vec<(u32, u32, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let take = self.rest.len().min(self.batch.max(1));
        let (head, tail) = self.rest.split_at(take);
        self.rest = tail;
        Some(head.to_vec())
    }
}

/// Stream a source's play counts into coordinate form.
pub(crate) fn extract_counts<S: InteractionSource>(source: &S, batch_size: usize) -> CooMatrix {
    let m = source.num_users();
    let n = source.num_items();
    let total = source.interaction_count();
    info!(
        "fetching {} play counts for {} users and {} items",
        total, m, n
    );

    let mut coo = CooMatrix::with_capacity(m, n, total);
    let progress = ProgressHandle::new("play counts fetched".into(), total);
    for batch in source.stream_interactions(batch_size) {
        let len = batch.len();
        for (user, item, count) in batch {
            coo.add_entry(user, item, count);
        }
        progress.advance(len);
    }
    if coo.nnz() != total {
        warn!(
            "source reported {} interactions but yielded {}",
            total,
            coo.nnz()
        );
    }
    coo
}

/// Confidence weights for the observed interactions, in both orientations.
///
/// The user-indexed matrix drives user factor updates and the item-indexed
/// transpose drives item factor updates; both hold the same entries.
#[derive(Debug)]
pub struct Interactions {
    conf_ui: CsrMatrix,
    conf_iu: CsrMatrix,
}

impl Interactions {
    /// Compress raw counts and weight them into confidence matrices.
    pub(crate) fn from_counts(counts: &CooMatrix, config: &ModelConfig) -> Result<Interactions> {
        for i in 0..counts.nnz() {
            let v = counts.val[i];
            if !(v > 0.0 && v.is_finite()) {
                return Err(Error::BadPlayCount {
                    user: counts.row[i],
                    item: counts.col[i],
                    count: v,
                });
            }
        }
        let plays = CsrMatrix::from_coo(counts)?;
        let conf_ui = confidence_matrix(&plays, config.alpha, config.epsilon);
        let conf_iu = conf_ui.transpose();
        debug!(
            "built {} x {} confidence matrices with {} entries",
            conf_ui.n_rows,
            conf_ui.n_cols,
            conf_ui.nnz()
        );
        Ok(Interactions { conf_ui, conf_iu })
    }

    pub fn num_users(&self) -> usize {
        self.conf_ui.n_rows
    }

    pub fn num_items(&self) -> usize {
        self.conf_ui.n_cols
    }

    /// Get the number of observed interactions.
    pub fn nnz(&self) -> usize {
        self.conf_ui.nnz()
    }

    /// Get the user-indexed confidence matrix.
    pub fn user_confidence(&self) -> &CsrMatrix {
        &self.conf_ui
    }

    /// Get the item-indexed confidence matrix.
    pub fn item_confidence(&self) -> &CsrMatrix {
        &self.conf_iu
    }
}
