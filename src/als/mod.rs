// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Alternating least squares over implicit-feedback play counts.
//!
//! Training alternates between the user and item factor matrices, solving
//! each row's regularized normal equations against the other matrix held
//! fixed.  Work proceeds in row batches, and every batch is checkpointed
//! before the next begins, so a run can be killed at any point and resumed
//! from the last completed batch.

mod solve;
mod update;

pub use solve::SolveError;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1};

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::factors::{FactorMatrix, FactorStore};
use crate::interactions::{extract_counts, InteractionSource, Interactions};
use crate::progress::ProgressHandle;
use crate::similarity::{closest_rows, SimilarItem};
use crate::store::{ModelStore, Progress};

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Training {
    /// All requested rounds are complete.
    Finished,
    /// The cancel flag was raised; the checkpoint holds all completed work.
    Interrupted,
}

/// Outcome of a single training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One batch was updated and checkpointed.
    Advanced,
    /// No work remains for the requested number of rounds.
    Done,
}

/// An implicit-feedback latent factor model bound to a checkpoint directory.
///
/// Opening the model extracts play counts from the source (or reuses the
/// checkpointed copy), weights them into confidence matrices, and loads or
/// initializes the factor matrices.  Everything the model computes lives in
/// the checkpoint directory; a process that died mid-training picks up where
/// it left off simply by opening the same directory again.
pub struct AlsModel<S> {
    config: ModelConfig,
    source: S,
    interactions: Interactions,
    factors: FactorStore,
    store: ModelStore,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: InteractionSource> AlsModel<S> {
    /// Open a model over `source`, checkpointed in `dir`.
    pub fn open(source: S, config: ModelConfig, dir: impl AsRef<Path>) -> Result<AlsModel<S>> {
        config.validate()?;
        let store = ModelStore::open(dir)?;
        let m = source.num_users();
        let n = source.num_items();

        let counts = match store.load_plays()? {
            Some(counts) => {
                if counts.n_rows != m || counts.n_cols != n {
                    return Err(Error::Config {
                        param: "checkpoint",
                        reason: format!(
                            "checkpointed plays are {} x {}, expected {} x {}",
                            counts.n_rows, counts.n_cols, m, n
                        ),
                    });
                }
                info!("reusing {} checkpointed play counts", counts.nnz());
                counts
            }
            None => {
                let counts = extract_counts(&source, config.extract_batch_size);
                store.save_plays(&counts)?;
                counts
            }
        };

        let interactions = Interactions::from_counts(&counts, &config)?;
        let factors = FactorStore::open(&store, m, n, &config)?;

        Ok(AlsModel {
            config,
            source,
            interactions,
            factors,
            store,
            cancel: None,
        })
    }

    /// Install a flag that can interrupt [`AlsModel::minimize`] between
    /// batches.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Train until `rounds` rounds are complete or the cancel flag is raised.
    ///
    /// Picks up from the checkpointed position, so completed batches are
    /// never recomputed.  The flag is only checked between batches; a batch
    /// in flight always runs to completion and is checkpointed.
    pub fn minimize(&mut self, rounds: usize, batch_size: usize) -> Result<Training> {
        info!("minimizing for {} rounds in batches of {} rows", rounds, batch_size);
        loop {
            if self.cancelled() {
                warn!("training interrupted; checkpoint is current");
                return Ok(Training::Interrupted);
            }
            if let Step::Done = self.step(rounds, batch_size)? {
                return Ok(Training::Finished);
            }
        }
    }

    /// Run a single checkpointed batch of training.
    ///
    /// Returns [`Step::Done`] once `rounds` rounds are complete.
    pub fn step(&mut self, rounds: usize, batch_size: usize) -> Result<Step> {
        if batch_size == 0 {
            return Err(Error::Config {
                param: "batch_size",
                reason: "must be positive".to_string(),
            });
        }
        let mut p = self.store.load_progress()?.unwrap_or_default();

        // roll completed phases forward to find the next batch
        loop {
            if p.round >= rounds {
                return Ok(Step::Done);
            }
            if p.offset < self.rows_of(p.matrix) {
                break;
            }
            p = match p.matrix {
                FactorMatrix::X => Progress {
                    round: p.round,
                    matrix: FactorMatrix::Y,
                    offset: 0,
                },
                FactorMatrix::Y => {
                    info!("round {} complete", p.round);
                    Progress {
                        round: p.round + 1,
                        matrix: FactorMatrix::X,
                        offset: 0,
                    }
                }
            };
            self.store.save_progress(&p)?;
        }

        let rows = self.rows_of(p.matrix);
        let end = rows.min(p.offset + batch_size);
        let handle = ProgressHandle::for_batch(
            format!("matrix {}", p.matrix),
            rows,
            p.offset,
            end - p.offset,
        );

        let conf = match p.matrix {
            FactorMatrix::X => self.interactions.user_confidence(),
            FactorMatrix::Y => self.interactions.item_confidence(),
        };
        let (target, fixed) = self.factors.pair_mut(p.matrix);
        let delta = update::update_half(
            target,
            fixed,
            conf,
            p.matrix,
            self.config.lambda as f64,
            p.offset,
            end,
            &handle,
        )?;

        // matrix first, then position: a crash in between redoes the batch
        self.store.save_matrix(p.matrix, target)?;
        info!(
            "round {}: updated {} rows {}..{} (delta {:.6})",
            p.round, p.matrix, p.offset, end, delta
        );
        p.offset = end;
        self.store.save_progress(&p)?;
        Ok(Step::Advanced)
    }

    fn rows_of(&self, which: FactorMatrix) -> usize {
        match which {
            FactorMatrix::X => self.interactions.num_users(),
            FactorMatrix::Y => self.interactions.num_items(),
        }
    }

    /// Get the checkpointed training position.
    pub fn progress(&self) -> Result<Progress> {
        Ok(self.store.load_progress()?.unwrap_or_default())
    }

    /// Get the latent vector and row index for an item key.
    pub fn get(&self, key: &str) -> Option<(Array1<f32>, usize)> {
        let row = self.source.resolve_row_for_key(key)?;
        let y = self.factors.item_factors();
        if row >= y.nrows() {
            warn!(
                "item key {:?} resolves to row {} of a {}-row matrix",
                key,
                row,
                y.nrows()
            );
            return None;
        }
        Some((y.row(row).to_owned(), row))
    }

    /// Find the `n` items whose factor rows are most cosine-similar to
    /// `query`.
    ///
    /// Rows with no usable similarity (for instance all-zero factor rows)
    /// are skipped, so fewer than `n` items can come back.  With `ordered`
    /// the results are sorted by descending similarity; otherwise their
    /// order is unspecified.
    pub fn closest(
        &self,
        query: &ArrayView1<f32>,
        n: usize,
        ordered: bool,
    ) -> Result<Vec<SimilarItem>> {
        if query.len() != self.config.factors {
            return Err(Error::Config {
                param: "query",
                reason: format!(
                    "query has {} dimensions, model has {}",
                    query.len(),
                    self.config.factors
                ),
            });
        }
        let hits = closest_rows(&self.factors.item_factors().view(), query, n, ordered);
        hits.into_iter()
            .map(|nb| {
                let key = self
                    .source
                    .resolve_key_for_row(nb.index)
                    .ok_or(Error::UnknownRow(nb.index))?;
                Ok(SimilarItem {
                    key: key.to_string(),
                    similarity: nb.similarity,
                    norm: nb.norm,
                })
            })
            .collect()
    }

    /// Get the model hyperparameters.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Get the compressed interaction store.
    pub fn interactions(&self) -> &Interactions {
        &self.interactions
    }

    /// Get the user factor matrix.
    pub fn user_factors(&self) -> &Array2<f32> {
        self.factors.user_factors()
    }

    /// Get the item factor matrix.
    pub fn item_factors(&self) -> &Array2<f32> {
        self.factors.item_factors()
    }
}
