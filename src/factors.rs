// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Latent factor matrices.

use std::fmt;

use log::{debug, info};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::store::ModelStore;

/// Scale for the uniform random factor initialization.
const INIT_SCALE: f32 = 0.01;

/// Which of the two factor matrices an operation targets.
///
/// `X` holds one row per user, `Y` one row per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorMatrix {
    X,
    Y,
}

impl FactorMatrix {
    /// Get the checkpoint file name for this matrix.
    pub(crate) fn file_name(self) -> &'static str {
        match self {
            FactorMatrix::X => "X.bin",
            FactorMatrix::Y => "Y.bin",
        }
    }
}

impl fmt::Display for FactorMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorMatrix::X => write!(f, "X"),
            FactorMatrix::Y => write!(f, "Y"),
        }
    }
}

/// The pair of factor matrices being trained.
#[derive(Debug)]
pub struct FactorStore {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl FactorStore {
    /// Load checkpointed factor matrices, initializing any that are missing.
    ///
    /// Freshly initialized matrices are saved immediately, so the checkpoint
    /// directory is complete as soon as the model is open.
    pub(crate) fn open(
        store: &ModelStore,
        num_users: usize,
        num_items: usize,
        config: &ModelConfig,
    ) -> Result<FactorStore> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let x = load_or_init(store, FactorMatrix::X, num_users, config.factors, &mut rng)?;
        let y = load_or_init(store, FactorMatrix::Y, num_items, config.factors, &mut rng)?;
        Ok(FactorStore { x, y })
    }

    /// Get the user factor matrix.
    pub fn user_factors(&self) -> &Array2<f32> {
        &self.x
    }

    /// Get the item factor matrix.
    pub fn item_factors(&self) -> &Array2<f32> {
        &self.y
    }

    /// Borrow the matrix being updated together with its fixed counterpart.
    pub(crate) fn pair_mut(&mut self, which: FactorMatrix) -> (&mut Array2<f32>, &Array2<f32>) {
        match which {
            FactorMatrix::X => (&mut self.x, &self.y),
            FactorMatrix::Y => (&mut self.y, &self.x),
        }
    }
}

fn load_or_init(
    store: &ModelStore,
    which: FactorMatrix,
    rows: usize,
    factors: usize,
    rng: &mut StdRng,
) -> Result<Array2<f32>> {
    if let Some(m) = store.load_matrix(which)? {
        if m.nrows() != rows || m.ncols() != factors {
            return Err(Error::Config {
                param: "checkpoint",
                reason: format!(
                    "checkpointed {} is {} x {}, expected {} x {}",
                    which,
                    m.nrows(),
                    m.ncols(),
                    rows,
                    factors
                ),
            });
        }
        debug!("loaded checkpointed {} ({} x {})", which, rows, factors);
        Ok(m)
    } else {
        info!("initializing {} with {} random rows", which, rows);
        let m = random(rows, factors, rng);
        store.save_matrix(which, &m)?;
        Ok(m)
    }
}

fn random(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
    Array2::from_shape_simple_fn((rows, cols), || rng.gen::<f32>() * INIT_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> ModelConfig {
        ModelConfig {
            factors: 4,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn initializes_in_range_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let fs = FactorStore::open(&store, 5, 3, &small_config(17)).unwrap();
        assert_eq!(fs.user_factors().dim(), (5, 4));
        assert_eq!(fs.item_factors().dim(), (3, 4));
        assert!(fs.user_factors().iter().all(|v| (0.0..0.01).contains(v)));

        // a second open must see exactly the matrices the first one saved
        let again = FactorStore::open(&store, 5, 3, &small_config(99)).unwrap();
        assert_eq!(again.user_factors(), fs.user_factors());
        assert_eq!(again.item_factors(), fs.item_factors());
    }

    #[test]
    fn seeded_initialization_is_deterministic() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = FactorStore::open(&ModelStore::open(dir_a.path()).unwrap(), 4, 4, &small_config(7))
            .unwrap();
        let b = FactorStore::open(&ModelStore::open(dir_b.path()).unwrap(), 4, 4, &small_config(7))
            .unwrap();
        assert_eq!(a.user_factors(), b.user_factors());
        assert_eq!(a.item_factors(), b.item_factors());
    }

    #[test]
    fn rejects_mismatched_checkpoint_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        FactorStore::open(&store, 5, 3, &small_config(1)).unwrap();

        let mut wider = small_config(1);
        wider.factors = 8;
        let err = FactorStore::open(&store, 5, 3, &wider).unwrap_err();
        assert!(matches!(err, Error::Config { param: "checkpoint", .. }));
    }
}
