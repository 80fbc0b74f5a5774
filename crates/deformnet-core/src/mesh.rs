//! Per-step mesh state.
//!
//! A [`MeshState`] is one simulation step of a deforming mesh: current and
//! reference positions per node, a category per node, and the cells that
//! connect them. During training it also carries the ground-truth positions
//! under the key `target|world_pos`.

use crate::error::{Error, Result};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

/// Node categories.
///
/// Only [`NodeType::Normal`] nodes are simulated; the others are boundary
/// conditions and are excluded from the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NodeType {
    Normal = 0,
    Obstacle = 1,
    Airfoil = 2,
    Handle = 3,
    Inflow = 4,
    Outflow = 5,
    WallBoundary = 6,
}

impl NodeType {
    /// Width of the one-hot node type encoding.
    ///
    /// Larger than the number of variants: codes 7 and 8 are reserved.
    pub const SIZE: usize = 9;

    /// Raw category code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a category from its raw code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Obstacle),
            2 => Some(Self::Airfoil),
            3 => Some(Self::Handle),
            4 => Some(Self::Inflow),
            5 => Some(Self::Outflow),
            6 => Some(Self::WallBoundary),
            _ => None,
        }
    }
}

impl TryFrom<u32> for NodeType {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        Self::from_code(code).ok_or(Error::UnknownNodeType(code))
    }
}

/// One step of mesh state.
///
/// Per-node arrays (`world_pos`, `mesh_pos`, `node_type`, `target_world_pos`)
/// are aligned by node index. `cells` is flat, `verts_per_cell` indices per
/// cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshState {
    /// Current world-space position per node.
    pub world_pos: Vec<[f32; 3]>,
    /// Reference (material-space) position per node.
    pub mesh_pos: Vec<[f32; 3]>,
    /// Raw node type code per node.
    pub node_type: Vec<u32>,
    /// Flat cell vertex indices.
    pub cells: Vec<u32>,
    /// Vertices per cell (3 for triangles, 4 for tetrahedra).
    pub verts_per_cell: usize,
    /// Ground-truth next positions, only present for training.
    #[serde(
        rename = "target|world_pos",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_world_pos: Option<Vec<[f32; 3]>>,
}

impl MeshState {
    /// Create a validated mesh state without a training target.
    pub fn new(
        world_pos: Vec<[f32; 3]>,
        mesh_pos: Vec<[f32; 3]>,
        node_type: Vec<u32>,
        verts_per_cell: usize,
        cells: Vec<u32>,
    ) -> Result<Self> {
        let mesh = Self {
            world_pos,
            mesh_pos,
            node_type,
            cells,
            verts_per_cell,
            target_world_pos: None,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh state from column-shaped node types and nested cells.
    ///
    /// `node_type` is `[num_nodes, k]` with `k >= 1`; only the first column is
    /// kept. Every cell must have the same number of vertices.
    pub fn from_columns(
        world_pos: Vec<[f32; 3]>,
        mesh_pos: Vec<[f32; 3]>,
        node_type: &[Vec<u32>],
        cells: &[Vec<u32>],
    ) -> Result<Self> {
        let node_type = node_type
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.first()
                    .copied()
                    .ok_or_else(|| Error::InvalidMesh(format!("node {i} has an empty node_type row")))
            })
            .collect::<Result<Vec<_>>>()?;

        let verts_per_cell = cells.first().map(Vec::len).unwrap_or(3);
        if let Some((i, cell)) = cells
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != verts_per_cell)
        {
            return Err(Error::InvalidMesh(format!(
                "cell {i} has {} vertices, expected {verts_per_cell}",
                cell.len()
            )));
        }
        let cells = cells.iter().flatten().copied().collect();

        Self::new(world_pos, mesh_pos, node_type, verts_per_cell, cells)
    }

    /// Attach ground-truth positions for training.
    pub fn with_target(mut self, target_world_pos: Vec<[f32; 3]>) -> Result<Self> {
        self.target_world_pos = Some(target_world_pos);
        self.validate()?;
        Ok(self)
    }

    /// Check that all arrays agree with each other.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();
        if self.mesh_pos.len() != n {
            return Err(Error::InvalidMesh(format!(
                "mesh_pos has {} nodes, world_pos has {n}",
                self.mesh_pos.len()
            )));
        }
        if self.node_type.len() != n {
            return Err(Error::InvalidMesh(format!(
                "node_type has {} nodes, world_pos has {n}",
                self.node_type.len()
            )));
        }
        if let Some(target) = &self.target_world_pos {
            if target.len() != n {
                return Err(Error::InvalidMesh(format!(
                    "target|world_pos has {} nodes, world_pos has {n}",
                    target.len()
                )));
            }
        }
        if let Some(&code) = self.node_type.iter().find(|&&c| c as usize >= NodeType::SIZE) {
            return Err(Error::UnknownNodeType(code));
        }
        if self.verts_per_cell < 2 {
            return Err(Error::InvalidMesh(format!(
                "cells need at least 2 vertices, got {}",
                self.verts_per_cell
            )));
        }
        if self.cells.len() % self.verts_per_cell != 0 {
            return Err(Error::InvalidMesh(format!(
                "{} cell indices is not a multiple of {}",
                self.cells.len(),
                self.verts_per_cell
            )));
        }
        if let Some(&idx) = self.cells.iter().find(|&&i| i as usize >= n) {
            return Err(Error::InvalidMesh(format!(
                "cell index {idx} out of range for {n} nodes"
            )));
        }
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.world_pos.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len().checked_div(self.verts_per_cell).unwrap_or(0)
    }

    /// Iterate over cells as vertex index slices.
    pub fn cells(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.chunks_exact(self.verts_per_cell.max(1))
    }

    /// Indices of nodes whose type is [`NodeType::Normal`].
    pub fn normal_nodes(&self) -> Vec<u32> {
        self.node_type
            .iter()
            .enumerate()
            .filter(|(_, code)| **code == NodeType::Normal.code())
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// `world_pos` as an `(N, 3)` f32 tensor.
    pub fn world_pos_tensor(&self, device: &Device) -> Result<Tensor> {
        positions_to_tensor(&self.world_pos, device)
    }

    /// `mesh_pos` as an `(N, 3)` f32 tensor.
    pub fn mesh_pos_tensor(&self, device: &Device) -> Result<Tensor> {
        positions_to_tensor(&self.mesh_pos, device)
    }

    /// `target|world_pos` as an `(N, 3)` f32 tensor.
    pub fn target_world_pos_tensor(&self, device: &Device) -> Result<Tensor> {
        let target = self.target_world_pos.as_ref().ok_or(Error::MissingTarget)?;
        positions_to_tensor(target, device)
    }

    /// Node type codes as an `(N,)` u32 tensor.
    pub fn node_type_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.node_type, self.num_nodes(), device)?)
    }
}

/// Pack fixed-arity positions into an `(N, 3)` tensor.
pub fn positions_to_tensor(positions: &[[f32; 3]], device: &Device) -> Result<Tensor> {
    let flat: Vec<f32> = positions.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (positions.len(), 3), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshState {
        MeshState::new(
            vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
            vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
            vec![0, 0, 3],
            3,
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_node_type_codes() {
        for code in 0..7 {
            let t = NodeType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(NodeType::from_code(7).is_none());
        assert!(matches!(
            NodeType::try_from(42),
            Err(Error::UnknownNodeType(42))
        ));
    }

    #[test]
    fn test_normal_nodes() {
        assert_eq!(triangle().normal_nodes(), vec![0, 1]);
    }

    #[test]
    fn test_from_columns_keeps_first_column() {
        let mesh = MeshState::from_columns(
            vec![[0.; 3]; 4],
            vec![[0.; 3]; 4],
            &[vec![0, 9], vec![1, 9], vec![3, 9], vec![0, 9]],
            &[vec![0, 1, 2], vec![1, 2, 3]],
        )
        .unwrap();
        assert_eq!(mesh.node_type, vec![0, 1, 3, 0]);
        assert_eq!(mesh.verts_per_cell, 3);
        assert_eq!(mesh.num_cells(), 2);
        assert_eq!(mesh.cells().nth(1).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_from_columns_rejects_ragged_cells() {
        let result = MeshState::from_columns(
            vec![[0.; 3]; 4],
            vec![[0.; 3]; 4],
            &[vec![0], vec![0], vec![0], vec![0]],
            &[vec![0, 1, 2], vec![1, 2, 3, 0]],
        );
        assert!(matches!(result, Err(Error::InvalidMesh(_))));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut mesh = triangle();
        mesh.cells = vec![0, 1, 5];
        assert!(matches!(mesh.validate(), Err(Error::InvalidMesh(_))));

        let mut mesh = triangle();
        mesh.mesh_pos.pop();
        assert!(matches!(mesh.validate(), Err(Error::InvalidMesh(_))));

        let mut mesh = triangle();
        mesh.node_type[1] = NodeType::SIZE as u32;
        assert!(matches!(mesh.validate(), Err(Error::UnknownNodeType(9))));

        // Reserved codes still fit the one-hot width.
        let mut mesh = triangle();
        mesh.node_type[1] = 8;
        assert!(mesh.validate().is_ok());

        assert!(matches!(
            triangle().with_target(vec![[0.; 3]; 2]),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_tensors() {
        let mesh = triangle();
        let device = Device::Cpu;
        let world = mesh.world_pos_tensor(&device).unwrap();
        assert_eq!(world.dims(), &[3, 3]);
        assert_eq!(world.to_vec2::<f32>().unwrap()[1], vec![1., 0., 0.]);
        assert!(matches!(
            mesh.target_world_pos_tensor(&device),
            Err(Error::MissingTarget)
        ));
        let types = mesh.node_type_tensor(&device).unwrap();
        assert_eq!(types.to_vec1::<u32>().unwrap(), vec![0, 0, 3]);
    }

    #[test]
    fn test_serde_target_key() {
        let mesh = triangle().with_target(vec![[1.; 3]; 3]).unwrap();
        let json = serde_json::to_value(&mesh).unwrap();
        assert!(json.get("target|world_pos").is_some());
        let back: MeshState = serde_json::from_value(json).unwrap();
        assert_eq!(back, mesh);

        let plain = serde_json::to_value(triangle()).unwrap();
        assert!(plain.get("target|world_pos").is_none());
    }
}
