// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse matrix support.

mod coo;
mod csr;

pub use coo::CooMatrix;
pub use csr::CsrMatrix;
