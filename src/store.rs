// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Durable checkpoint storage.
//!
//! A model directory holds four files: the two factor matrices, the raw
//! play-count triplets, and a small JSON progress record.  Every write goes
//! through a temporary file followed by an atomic rename, so a crash at any
//! point leaves either the old file or the new one, never a torn mix.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::factors::FactorMatrix;
use crate::sparse::CooMatrix;

const PLAYS_FILE: &str = "plays.bin";
const PROGRESS_FILE: &str = "progress.json";

/// Durable position within a training run.
///
/// The record is written after the matrix it describes, so on resume the
/// factor data on disk is always at least as new as the position; a batch
/// interrupted between the two writes is simply redone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// The training round the next batch belongs to.
    pub round: usize,
    /// Which matrix the next batch updates.
    pub matrix: FactorMatrix,
    /// First row of the next batch.
    pub offset: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Progress {
            round: 0,
            matrix: FactorMatrix::X,
            offset: 0,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MatrixFile {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct PlaysFile {
    users: usize,
    items: usize,
    rows: Vec<u32>,
    cols: Vec<u32>,
    counts: Vec<f32>,
}

/// File-backed checkpoint store rooted at a model directory.
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<ModelStore> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(ModelStore { dir })
    }

    /// Get the directory this store writes into.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn save_matrix(&self, which: FactorMatrix, matrix: &Array2<f32>) -> Result<()> {
        let file = MatrixFile {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            data: matrix.iter().copied().collect(),
        };
        let bytes = bincode::serialize(&file).map_err(io::Error::other)?;
        self.write_atomic(which.file_name(), &bytes)?;
        debug!("saved {} ({} x {})", which, file.rows, file.cols);
        Ok(())
    }

    pub(crate) fn load_matrix(&self, which: FactorMatrix) -> Result<Option<Array2<f32>>> {
        let name = which.file_name();
        let Some(bytes) = self.read(name)? else {
            return Ok(None);
        };
        let file: MatrixFile =
            bincode::deserialize(&bytes).map_err(|e| self.corrupt(name, Box::new(e)))?;
        let matrix = Array2::from_shape_vec((file.rows, file.cols), file.data)
            .map_err(|e| self.corrupt(name, Box::new(e)))?;
        Ok(Some(matrix))
    }

    pub(crate) fn save_plays(&self, counts: &CooMatrix) -> Result<()> {
        let file = PlaysFile {
            users: counts.n_rows,
            items: counts.n_cols,
            rows: counts.row.clone(),
            cols: counts.col.clone(),
            counts: counts.val.clone(),
        };
        let bytes = bincode::serialize(&file).map_err(io::Error::other)?;
        self.write_atomic(PLAYS_FILE, &bytes)?;
        debug!("saved {} play counts", file.rows.len());
        Ok(())
    }

    pub(crate) fn load_plays(&self) -> Result<Option<CooMatrix>> {
        let Some(bytes) = self.read(PLAYS_FILE)? else {
            return Ok(None);
        };
        let file: PlaysFile =
            bincode::deserialize(&bytes).map_err(|e| self.corrupt(PLAYS_FILE, Box::new(e)))?;
        let coo = CooMatrix::from_parts(file.users, file.items, file.rows, file.cols, file.counts)
            .ok_or_else(|| Error::Corrupt {
                path: self.dir.join(PLAYS_FILE),
                source: "triplet vectors have mismatched lengths".into(),
            })?;
        Ok(Some(coo))
    }

    pub(crate) fn save_progress(&self, progress: &Progress) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(progress).map_err(io::Error::other)?;
        self.write_atomic(PROGRESS_FILE, &bytes)?;
        debug!(
            "saved progress: round {}, {} at row {}",
            progress.round, progress.matrix, progress.offset
        );
        Ok(())
    }

    pub(crate) fn load_progress(&self) -> Result<Option<Progress>> {
        let Some(bytes) = self.read(PROGRESS_FILE)? else {
            return Ok(None);
        };
        let progress =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(PROGRESS_FILE, Box::new(e)))?;
        Ok(Some(progress))
    }

    /// Write a file so that the old content survives any mid-write crash.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let tmp_path = self.dir.join(format!("{}.tmp", name));
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, self.dir.join(name))?;
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.dir.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, name: &str, source: Box<dyn std::error::Error + Send + Sync>) -> Error {
        Error::Corrupt {
            path: self.dir.join(name),
            source,
        }
    }
}
