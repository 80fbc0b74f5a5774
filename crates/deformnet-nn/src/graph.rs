//! Mesh to graph conversion.
//!
//! Builds the input graph for a static simulation step. There is no history,
//! so the velocity slot of every node is zero:
//!
//! ```text
//! node  = [ 0, 0, 0 | one_hot(node_type, 9) ]                        (12)
//! edge  = [ dx_world, |dx_world| | dx_mesh, |dx_mesh| ]               (8)
//!           dx = pos[sender] - pos[receiver]
//! ```
//!
//! Both feature matrices are normalized before they reach the learned model.

use candle_core::{Device, Tensor};
use candle_nn::encoding::one_hot;
use deformnet_core::{cells_to_edges, MeshState, NodeType, Normalizer, Result};

use crate::config::ModelConfig;

/// Name of the edge set derived from mesh connectivity.
pub const MESH_EDGES: &str = "mesh_edges";

/// A named set of directed edges with per-edge features.
#[derive(Debug, Clone)]
pub struct EdgeSet {
    pub name: String,
    /// Edge features `(E, F)`.
    pub features: Tensor,
    /// Sender node indices `(E,)`, u32.
    pub senders: Tensor,
    /// Receiver node indices `(E,)`, u32.
    pub receivers: Tensor,
}

impl EdgeSet {
    pub fn num_edges(&self) -> usize {
        self.senders.elem_count()
    }
}

/// Graph with one node feature matrix and any number of edge sets.
#[derive(Debug, Clone)]
pub struct MultiGraph {
    /// Node features `(N, F)`.
    pub node_features: Tensor,
    pub edge_sets: Vec<EdgeSet>,
}

impl MultiGraph {
    pub fn num_nodes(&self) -> usize {
        self.node_features.dims().first().copied().unwrap_or(0)
    }

    /// Look up an edge set by name.
    pub fn edge_set(&self, name: &str) -> Option<&EdgeSet> {
        self.edge_sets.iter().find(|set| set.name == name)
    }
}

/// Unnormalized graph features.
#[derive(Debug, Clone)]
pub struct GraphFeatures {
    pub node_features: Tensor,
    pub edge_features: Tensor,
    pub senders: Tensor,
    pub receivers: Tensor,
}

/// Node features: zero velocity followed by the one-hot node type.
pub fn node_features(mesh: &MeshState, device: &Device) -> Result<Tensor> {
    let velocity = mesh.world_pos_tensor(device)?.zeros_like()?;
    let node_type = one_hot(mesh.node_type_tensor(device)?, NodeType::SIZE, 1f32, 0f32)?;
    Ok(Tensor::cat(&[&velocity, &node_type], 1)?)
}

/// Edge features: relative world and mesh positions with their norms.
///
/// `world_pos` and `mesh_pos` are `(N, 3)`; `senders` and `receivers` are
/// `(E,)` index tensors. Returns `(E, 8)`.
pub fn edge_features(
    world_pos: &Tensor,
    mesh_pos: &Tensor,
    senders: &Tensor,
    receivers: &Tensor,
) -> Result<Tensor> {
    let relative_world_pos =
        (world_pos.index_select(senders, 0)? - world_pos.index_select(receivers, 0)?)?;
    let relative_mesh_pos =
        (mesh_pos.index_select(senders, 0)? - mesh_pos.index_select(receivers, 0)?)?;
    let world_norm = relative_world_pos.sqr()?.sum_keepdim(1)?.sqrt()?;
    let mesh_norm = relative_mesh_pos.sqr()?.sum_keepdim(1)?.sqrt()?;
    Ok(Tensor::cat(
        &[&relative_world_pos, &world_norm, &relative_mesh_pos, &mesh_norm],
        1,
    )?)
}

/// Compute all raw features of a mesh.
pub fn graph_features(mesh: &MeshState, device: &Device) -> Result<GraphFeatures> {
    mesh.validate()?;
    let edges = cells_to_edges(&mesh.cells, mesh.verts_per_cell);
    let (senders, receivers) = edges.to_tensors(device)?;

    let world_pos = mesh.world_pos_tensor(device)?;
    let mesh_pos = mesh.mesh_pos_tensor(device)?;
    let edge_features = edge_features(&world_pos, &mesh_pos, &senders, &receivers)?;

    tracing::debug!(
        nodes = mesh.num_nodes(),
        cells = mesh.num_cells(),
        edges = edges.num_edges(),
        "built graph features"
    );

    Ok(GraphFeatures {
        node_features: node_features(mesh, device)?,
        edge_features,
        senders,
        receivers,
    })
}

/// Builds normalized graphs and owns the node and edge normalizers.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    node_normalizer: Normalizer,
    edge_normalizer: Normalizer,
    device: Device,
}

impl GraphBuilder {
    pub fn new(config: &ModelConfig, device: &Device) -> Result<Self> {
        let node_normalizer = Normalizer::new(
            "node_normalizer",
            config.normalizer(ModelConfig::node_feature_size()),
            device,
        )?;
        let edge_normalizer = Normalizer::new(
            "edge_normalizer",
            config.normalizer(ModelConfig::edge_feature_size()),
            device,
        )?;
        Ok(Self {
            node_normalizer,
            edge_normalizer,
            device: device.clone(),
        })
    }

    /// Build a graph, folding its features into the normalizer statistics
    /// when `accumulate` is set.
    pub fn build(&mut self, mesh: &MeshState, accumulate: bool) -> Result<MultiGraph> {
        let raw = graph_features(mesh, &self.device)?;
        let node_features = self.node_normalizer.forward(&raw.node_features, accumulate)?;
        let edge_features = self.edge_normalizer.forward(&raw.edge_features, accumulate)?;
        Ok(assemble(raw, node_features, edge_features))
    }

    /// Build a graph against the current statistics without changing them.
    pub fn build_frozen(&self, mesh: &MeshState) -> Result<MultiGraph> {
        let raw = graph_features(mesh, &self.device)?;
        let node_features = self.node_normalizer.normalize(&raw.node_features)?;
        let edge_features = self.edge_normalizer.normalize(&raw.edge_features)?;
        Ok(assemble(raw, node_features, edge_features))
    }

    pub fn node_normalizer(&self) -> &Normalizer {
        &self.node_normalizer
    }

    pub fn edge_normalizer(&self) -> &Normalizer {
        &self.edge_normalizer
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

fn assemble(raw: GraphFeatures, node_features: Tensor, edge_features: Tensor) -> MultiGraph {
    MultiGraph {
        node_features,
        edge_sets: vec![EdgeSet {
            name: MESH_EDGES.to_string(),
            features: edge_features,
            senders: raw.senders,
            receivers: raw.receivers,
        }],
    }
}
