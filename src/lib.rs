// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Implicit-feedback latent factor models, trained by checkpointed
//! alternating least squares.
//!
//! The crate turns a stream of `(user, item, play count)` triplets from an
//! [`InteractionSource`] into a pair of low-rank factor matrices.  Raw
//! counts are weighted into confidences with a logarithmic transform, the
//! factors are fit with regularized weighted ALS, and every batch of row
//! updates is written to a checkpoint directory before training moves on.
//! A killed run resumes from its last completed batch; a finished model
//! answers nearest-neighbor queries by cosine similarity over the item
//! factors.

mod als;
mod confidence;
mod config;
mod error;
mod factors;
mod interactions;
mod progress;
mod similarity;
mod sparse;
mod store;

pub use als::{AlsModel, SolveError, Step, Training};
pub use confidence::{confidence, confidence_matrix};
pub use config::ModelConfig;
pub use error::{Error, Result};
pub use factors::FactorMatrix;
pub use interactions::{InteractionSource, Interactions, MemoryBatches, MemorySource};
pub use similarity::{closest_rows, unit_normalized, Neighbor, SimilarItem};
pub use sparse::{CooMatrix, CsrMatrix};
pub use store::{ModelStore, Progress};
