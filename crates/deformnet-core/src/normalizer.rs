//! Running-statistics feature normalizer.
//!
//! A [`Normalizer`] scales a `(batch, size)` feature stream to zero mean and
//! unit variance using statistics accumulated from the stream itself:
//!
//! ```text
//! mean = sum / max(count, 1)
//! std  = max(sqrt(sum_sq / max(count, 1) - mean^2), std_epsilon)
//! ```
//!
//! Accumulation is explicit. [`Normalizer::forward`] only folds a batch into
//! the statistics when asked to, and stops after `max_accumulations` batches
//! so late-training statistics stay fixed. [`Normalizer::normalize`] and
//! [`Normalizer::inverse`] take `&self` and never mutate.

use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Normalizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Feature width.
    pub size: usize,
    /// Number of batches after which statistics freeze (default: 1_000_000).
    pub max_accumulations: usize,
    /// Lower bound on the standard deviation (default: 1e-8).
    pub std_epsilon: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            size: 1,
            max_accumulations: 1_000_000,
            std_epsilon: 1e-8,
        }
    }
}

impl NormalizerConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn with_max_accumulations(mut self, max_accumulations: usize) -> Self {
        self.max_accumulations = max_accumulations;
        self
    }

    pub fn with_std_epsilon(mut self, std_epsilon: f64) -> Self {
        self.std_epsilon = std_epsilon;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidConfig("normalizer size must be > 0".into()));
        }
        if self.std_epsilon.is_nan() || self.std_epsilon <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "std_epsilon must be positive, got {}",
                self.std_epsilon
            )));
        }
        Ok(())
    }
}

/// Snapshot of a normalizer's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerStats {
    /// Total number of rows accumulated.
    pub count: f64,
    /// Number of batches accumulated.
    pub num_accumulations: usize,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// Accumulating mean/std normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    name: String,
    config: NormalizerConfig,
    acc_count: f64,
    num_accumulations: usize,
    /// Per-feature sum, `(size,)`.
    acc_sum: Tensor,
    /// Per-feature sum of squares, `(size,)`.
    acc_sum_squared: Tensor,
}

impl Normalizer {
    /// Create a normalizer with empty statistics.
    pub fn new(name: impl Into<String>, config: NormalizerConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let acc_sum = Tensor::zeros(config.size, DType::F32, device)?;
        let acc_sum_squared = Tensor::zeros(config.size, DType::F32, device)?;
        Ok(Self {
            name: name.into(),
            config,
            acc_count: 0.0,
            num_accumulations: 0,
            acc_sum,
            acc_sum_squared,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.config.size
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Total rows accumulated so far.
    pub fn count(&self) -> f64 {
        self.acc_count
    }

    /// Batches accumulated so far.
    pub fn num_accumulations(&self) -> usize {
        self.num_accumulations
    }

    /// Whether further batches are still folded into the statistics.
    pub fn is_accumulating(&self) -> bool {
        self.num_accumulations < self.config.max_accumulations
    }

    /// Normalize a batch, first accumulating it if `accumulate` is set.
    pub fn forward(&mut self, batch: &Tensor, accumulate: bool) -> Result<Tensor> {
        if accumulate {
            self.accumulate(batch)?;
        }
        self.normalize(batch)
    }

    /// Normalize a batch against the current statistics.
    pub fn normalize(&self, batch: &Tensor) -> Result<Tensor> {
        self.check_width(batch)?;
        let mean = self.mean()?;
        let std = self.std_with_epsilon()?;
        Ok(batch.broadcast_sub(&mean)?.broadcast_div(&std)?)
    }

    /// Map normalized values back to the original scale.
    pub fn inverse(&self, normalized: &Tensor) -> Result<Tensor> {
        self.check_width(normalized)?;
        let mean = self.mean()?;
        let std = self.std_with_epsilon()?;
        Ok(normalized.broadcast_mul(&std)?.broadcast_add(&mean)?)
    }

    /// Fold a batch into the statistics.
    ///
    /// Returns `false` without touching anything once `max_accumulations`
    /// batches have been seen.
    pub fn accumulate(&mut self, batch: &Tensor) -> Result<bool> {
        let (rows, _) = self.check_width(batch)?;
        if !self.is_accumulating() {
            tracing::trace!(
                normalizer = %self.name,
                num_accumulations = self.num_accumulations,
                "statistics frozen, skipping accumulation"
            );
            return Ok(false);
        }

        let batch = batch.to_dtype(DType::F32)?;
        self.acc_sum = (&self.acc_sum + batch.sum(0)?)?;
        self.acc_sum_squared = (&self.acc_sum_squared + batch.sqr()?.sum(0)?)?;
        self.acc_count += rows as f64;
        self.num_accumulations += 1;

        tracing::debug!(
            normalizer = %self.name,
            rows,
            count = self.acc_count,
            num_accumulations = self.num_accumulations,
            "accumulated statistics"
        );
        Ok(true)
    }

    /// Per-feature mean, `(size,)`.
    pub fn mean(&self) -> Result<Tensor> {
        Ok((&self.acc_sum / self.safe_count())?)
    }

    /// Per-feature standard deviation bounded below by `std_epsilon`, `(size,)`.
    pub fn std_with_epsilon(&self) -> Result<Tensor> {
        let mean = self.mean()?;
        let variance = ((&self.acc_sum_squared / self.safe_count())? - mean.sqr()?)?;
        // Rounding can push the variance of constant features slightly negative.
        let std = variance.maximum(0f32)?.sqrt()?;
        Ok(std.maximum(self.config.std_epsilon as f32)?)
    }

    /// Copy the current statistics to the host.
    pub fn stats(&self) -> Result<NormalizerStats> {
        Ok(NormalizerStats {
            count: self.acc_count,
            num_accumulations: self.num_accumulations,
            mean: self.mean()?.to_vec1::<f32>()?,
            std: self.std_with_epsilon()?.to_vec1::<f32>()?,
        })
    }

    fn safe_count(&self) -> f64 {
        self.acc_count.max(1.0)
    }

    fn check_width(&self, batch: &Tensor) -> Result<(usize, usize)> {
        let (rows, width) = batch.dims2()?;
        if width != self.config.size {
            return Err(Error::DimensionMismatch {
                expected: self.config.size,
                got: width,
            });
        }
        Ok((rows, width))
    }
}
