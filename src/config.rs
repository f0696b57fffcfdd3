// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Model hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hyperparameters for an implicit-feedback ALS model.
///
/// The defaults are the values the reference music configuration settled on
/// and work reasonably for play-count data with a heavy tail; all of them can
/// be overridden before the model is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension shared by user and item vectors.
    pub factors: usize,
    /// Confidence scale applied to log-transformed counts.
    pub alpha: f32,
    /// Count scale inside the logarithm of the confidence transform.
    pub epsilon: f32,
    /// Tikhonov regularization added to the diagonal of every row system.
    pub lambda: f32,
    /// Seed for factor initialization; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Interactions per page when streaming data out of the source.
    pub extract_batch_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            factors: 40,
            alpha: 2.0,
            epsilon: 1e6,
            lambda: 1e-3,
            seed: None,
            extract_batch_size: 10_000,
        }
    }
}

impl ModelConfig {
    /// Check the hyperparameters for values the trainer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(invalid("factors", "must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(invalid("alpha", "must be positive and finite"));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(invalid("epsilon", "must be positive and finite"));
        }
        if !(self.lambda > 0.0 && self.lambda.is_finite()) {
            return Err(invalid("lambda", "must be positive and finite"));
        }
        if self.extract_batch_size == 0 {
            return Err(invalid("extract_batch_size", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(param: &'static str, reason: &str) -> Error {
    Error::Config {
        param,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_hyperparameters() {
        let bad = [
            ModelConfig {
                factors: 0,
                ..Default::default()
            },
            ModelConfig {
                lambda: 0.0,
                ..Default::default()
            },
            ModelConfig {
                alpha: f32::NAN,
                ..Default::default()
            },
            ModelConfig {
                extract_batch_size: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err());
        }
    }
}
