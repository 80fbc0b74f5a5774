//! The learned network seam.
//!
//! [`DeformingPlateModel`](crate::DeformingPlateModel) treats the graph
//! network as a black box: anything that maps a [`MultiGraph`] to one output
//! row per node can be plugged in. Message-passing architectures live with the
//! caller; [`PerNodeMlp`] is a baseline that ignores the edges entirely and is
//! mostly useful for wiring and smoke tests.

use candle_core::{Result, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::graph::MultiGraph;

/// A graph network producing per-node outputs.
pub trait LearnedModel {
    /// Map a graph to `(num_nodes, output_size)` per-node outputs.
    fn forward(&self, graph: &MultiGraph) -> Result<Tensor>;
}

impl<T: LearnedModel + ?Sized> LearnedModel for &T {
    fn forward(&self, graph: &MultiGraph) -> Result<Tensor> {
        (**self).forward(graph)
    }
}

impl<T: LearnedModel + ?Sized> LearnedModel for Box<T> {
    fn forward(&self, graph: &MultiGraph) -> Result<Tensor> {
        (**self).forward(graph)
    }
}

/// Per-node MLP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Node feature width (default: 12).
    pub input_size: usize,
    /// Hidden layer width (default: 128).
    pub hidden_size: usize,
    /// Number of hidden layers (default: 2).
    pub num_hidden_layers: usize,
    /// Output width (default: 3).
    pub output_size: usize,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            input_size: ModelConfig::node_feature_size(),
            hidden_size: 128,
            num_hidden_layers: 2,
            output_size: ModelConfig::output_size(),
        }
    }
}

impl MlpConfig {
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_num_hidden_layers(mut self, num_hidden_layers: usize) -> Self {
        self.num_hidden_layers = num_hidden_layers;
        self
    }
}

/// MLP applied independently to every node's features.
///
/// `h = W_out relu(... relu(W_1 x))`
pub struct PerNodeMlp {
    layers: Vec<Linear>,
}

impl PerNodeMlp {
    /// Create the MLP.
    ///
    /// # Arguments
    /// - `config`: Layer sizes
    /// - `vb`: Variable builder for parameter initialization
    pub fn new(config: &MlpConfig, vb: VarBuilder) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.num_hidden_layers + 1);
        let mut in_features = config.input_size;
        for i in 0..config.num_hidden_layers {
            layers.push(linear(in_features, config.hidden_size, vb.pp(format!("hidden_{i}")))?);
            in_features = config.hidden_size;
        }
        layers.push(linear(in_features, config.output_size, vb.pp("output"))?);
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl LearnedModel for PerNodeMlp {
    fn forward(&self, graph: &MultiGraph) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut h = graph.node_features.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last {
                h = h.relu()?;
            }
        }
        Ok(h)
    }
}
