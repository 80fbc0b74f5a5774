//! Model configuration.

use deformnet_core::{Error, NodeType, NormalizerConfig, Result};
use serde::{Deserialize, Serialize};

/// Spatial dimension of positions and displacements.
pub const SPATIAL_DIM: usize = 3;

/// Configuration shared by the graph builder and the model façade.
///
/// Feature widths are fixed by the mesh layout; only the normalizer
/// behaviour is tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Batches after which normalizer statistics freeze (default: 1_000_000).
    pub max_accumulations: usize,
    /// Lower bound on normalizer standard deviations (default: 1e-8).
    pub std_epsilon: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_accumulations: 1_000_000,
            std_epsilon: 1e-8,
        }
    }
}

impl ModelConfig {
    pub fn with_max_accumulations(mut self, max_accumulations: usize) -> Self {
        self.max_accumulations = max_accumulations;
        self
    }

    pub fn with_std_epsilon(mut self, std_epsilon: f64) -> Self {
        self.std_epsilon = std_epsilon;
        self
    }

    /// Node feature width: velocity placeholder plus one-hot node type.
    pub const fn node_feature_size() -> usize {
        SPATIAL_DIM + NodeType::SIZE
    }

    /// Edge feature width: relative world position and norm, relative mesh
    /// position and norm.
    pub const fn edge_feature_size() -> usize {
        2 * (SPATIAL_DIM + 1)
    }

    /// Per-node output width (a displacement).
    pub const fn output_size() -> usize {
        SPATIAL_DIM
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_accumulations == 0 {
            return Err(Error::InvalidConfig(
                "max_accumulations must be > 0".into(),
            ));
        }
        self.normalizer(1).validate()
    }

    /// Normalizer configuration for a feature stream of width `size`.
    pub fn normalizer(&self, size: usize) -> NormalizerConfig {
        NormalizerConfig::new(size)
            .with_max_accumulations(self.max_accumulations)
            .with_std_epsilon(self.std_epsilon)
    }
}
