//! Model façade for static DeformingPlate simulation.
//!
//! The network predicts a normalized per-node displacement. Inference undoes
//! the output normalization and adds the displacement to the current
//! positions; training compares the network output with the normalized
//! ground-truth displacement:
//!
//! ```text
//! predict:  world_pos + inverse(net(graph))
//! loss:     mean_{normal nodes} || normalize(target - world_pos) - net(graph) ||^2
//! ```
//!
//! # Statistics
//!
//! Three normalizers (node, edge, output) belong to the model. [`predict`]
//! takes `&self` and can never change them. [`loss`] builds its graph with
//! accumulation enabled and also folds every target displacement into the
//! output statistics; the two are separate switches even though `loss` turns
//! both on.
//!
//! [`predict`]: DeformingPlateModel::predict
//! [`loss`]: DeformingPlateModel::loss

use candle_core::{Device, Tensor};
use deformnet_core::{Error, MeshState, Normalizer, Result};

use crate::config::ModelConfig;
use crate::graph::{GraphBuilder, MultiGraph};
use crate::learned::LearnedModel;

/// Learned simulator for static deformation.
pub struct DeformingPlateModel<M> {
    learned: M,
    config: ModelConfig,
    graph_builder: GraphBuilder,
    output_normalizer: Normalizer,
    device: Device,
}

impl<M: LearnedModel> DeformingPlateModel<M> {
    /// Create a model with fresh normalizer statistics.
    pub fn new(learned: M, config: ModelConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let graph_builder = GraphBuilder::new(&config, device)?;
        let output_normalizer = Normalizer::new(
            "output_normalizer",
            config.normalizer(ModelConfig::output_size()),
            device,
        )?;
        Ok(Self {
            learned,
            config,
            graph_builder,
            output_normalizer,
            device: device.clone(),
        })
    }

    /// Predict the next world positions, `(num_nodes, 3)`.
    pub fn predict(&self, mesh: &MeshState) -> Result<Tensor> {
        let graph = self.graph_builder.build_frozen(mesh)?;
        let per_node_output = self.run_learned(&graph, mesh)?;
        self.update(mesh, &per_node_output)
    }

    /// L2 loss on the normalized displacement of normal nodes.
    ///
    /// Returns a scalar tensor attached to the network output, so it can be
    /// passed to an optimizer. A mesh without normal nodes yields NaN.
    pub fn loss(&mut self, mesh: &MeshState) -> Result<Tensor> {
        // Fail before any statistics are touched.
        let target_position = mesh.target_world_pos_tensor(&self.device)?;

        let graph = self.graph_builder.build(mesh, true)?;
        let network_output = self.run_learned(&graph, mesh)?;

        let cur_position = mesh.world_pos_tensor(&self.device)?;
        let target_displacement = (target_position - cur_position)?;
        // Output statistics accumulate on every loss call.
        let target_normalized = self.output_normalizer.forward(&target_displacement, true)?;

        let error = (target_normalized - &network_output)?.sqr()?.sum(1)?;

        let normal = mesh.normal_nodes();
        if normal.is_empty() {
            tracing::warn!(
                nodes = mesh.num_nodes(),
                "no normal nodes in mesh, loss is undefined"
            );
            return Ok(Tensor::new(f32::NAN, &self.device)?);
        }
        let num_normal = normal.len();
        let mask = Tensor::from_vec(normal, num_normal, &self.device)?;
        let loss = error.index_select(&mask, 0)?.mean_all()?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                loss = loss.to_scalar::<f32>()?,
                normal_nodes = num_normal,
                nodes = mesh.num_nodes(),
                "computed loss"
            );
        }
        Ok(loss)
    }

    /// Integrate a raw network output as a displacement.
    pub fn update(&self, mesh: &MeshState, per_node_output: &Tensor) -> Result<Tensor> {
        let displacement = self.output_normalizer.inverse(per_node_output)?;
        let cur_position = mesh.world_pos_tensor(&self.device)?;
        Ok((cur_position + displacement)?)
    }

    fn run_learned(&self, graph: &MultiGraph, mesh: &MeshState) -> Result<Tensor> {
        let output = self.learned.forward(graph)?;
        let (rows, width) = output.dims2()?;
        if rows != mesh.num_nodes() {
            return Err(Error::DimensionMismatch {
                expected: mesh.num_nodes(),
                got: rows,
            });
        }
        if width != ModelConfig::output_size() {
            return Err(Error::DimensionMismatch {
                expected: ModelConfig::output_size(),
                got: width,
            });
        }
        Ok(output)
    }
}

impl<M> DeformingPlateModel<M> {
    pub fn learned(&self) -> &M {
        &self.learned
    }

    pub fn into_learned(self) -> M {
        self.learned
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn graph_builder(&self) -> &GraphBuilder {
        &self.graph_builder
    }

    pub fn node_normalizer(&self) -> &Normalizer {
        self.graph_builder.node_normalizer()
    }

    pub fn edge_normalizer(&self) -> &Normalizer {
        self.graph_builder.edge_normalizer()
    }

    pub fn output_normalizer(&self) -> &Normalizer {
        &self.output_normalizer
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
