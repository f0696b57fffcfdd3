// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Error types for model construction, training, and queries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::als::SolveError;
use crate::factors::FactorMatrix;

/// Result type for fallible model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the model and its checkpoint store.
#[derive(Error, Debug)]
pub enum Error {
    /// A hyperparameter is invalid, or persisted state disagrees with it.
    #[error("invalid {param}: {reason}")]
    Config { param: &'static str, reason: String },

    /// An interaction referenced a user row outside the source's universe.
    #[error("user index {index} out of range for {limit} users")]
    UserOutOfRange { index: u32, limit: usize },

    /// An interaction referenced an item row outside the source's universe.
    #[error("item index {index} out of range for {limit} items")]
    ItemOutOfRange { index: u32, limit: usize },

    /// A play count was zero, negative, or not finite.
    #[error("invalid play count {count} for user {user}, item {item}")]
    BadPlayCount { user: u32, item: u32, count: f32 },

    /// The same user/item pair appeared more than once.
    #[error("duplicate interaction for user {user}, item {item}")]
    DuplicateInteraction { user: u32, item: u32 },

    /// A factor row has no key in the interaction source.
    #[error("no item key for row {0}")]
    UnknownRow(usize),

    /// A row's normal equations could not be factorized.
    #[error("singular system updating {matrix} row {row}")]
    Singular {
        matrix: FactorMatrix,
        row: usize,
        source: SolveError,
    },

    /// A checkpoint file exists but cannot be decoded.
    #[error("corrupt checkpoint file {}", path.display())]
    Corrupt {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Checkpoint I/O failed.
    #[error("checkpoint I/O failed")]
    Io(#[from] io::Error),
}
