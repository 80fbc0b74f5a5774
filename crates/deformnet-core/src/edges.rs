//! Mesh connectivity to graph edges.
//!
//! Every undirected mesh edge becomes two directed graph edges, one in each
//! direction, so messages can flow both ways:
//!
//! ```text
//!   cell (a, b, c)  ->  {a-b, b-c, c-a}  ->  a->b, b->a, b->c, c->b, c->a, a->c
//! ```
//!
//! Pairs are canonicalized to `(max, min)` and deduplicated in first-seen
//! order, so an edge shared by two cells appears once per direction. The
//! output lists every `(max -> min)` edge first, then the reversed copies.

use candle_core::{Device, Tensor};
use std::collections::HashSet;

use crate::error::Result;

/// Directed edge list in sender/receiver form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshEdges {
    pub senders: Vec<u32>,
    pub receivers: Vec<u32>,
}

impl MeshEdges {
    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.senders.len()
    }

    /// Number of undirected mesh edges (half the directed count).
    pub fn num_undirected(&self) -> usize {
        self.senders.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Sender and receiver index tensors, each `(E,)` u32.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let n = self.num_edges();
        let senders = Tensor::from_slice(&self.senders, n, device)?;
        let receivers = Tensor::from_slice(&self.receivers, n, device)?;
        Ok((senders, receivers))
    }
}

/// Local vertex pairs that form the edges of one cell.
///
/// - 2 vertices: a single segment
/// - 3 vertices: triangle (0,1), (1,2), (2,0)
/// - 4 vertices: tetrahedron, all 6 pairs
/// - more: polygon boundary ring
pub fn cell_edge_pairs(verts_per_cell: usize) -> Vec<(usize, usize)> {
    match verts_per_cell {
        0 | 1 => Vec::new(),
        2 => vec![(0, 1)],
        4 => vec![(0, 1), (1, 2), (2, 0), (0, 3), (1, 3), (2, 3)],
        n => (0..n).map(|i| (i, (i + 1) % n)).collect(),
    }
}

/// Convert flat cell indices into bidirectional, deduplicated edges.
///
/// Degenerate pairs (a cell repeating a vertex) produce no edge.
pub fn cells_to_edges(cells: &[u32], verts_per_cell: usize) -> MeshEdges {
    let pairs = cell_edge_pairs(verts_per_cell);
    if pairs.is_empty() {
        return MeshEdges::default();
    }

    let mut seen: HashSet<(u32, u32)> = HashSet::new();
    let mut high = Vec::new();
    let mut low = Vec::new();

    for cell in cells.chunks_exact(verts_per_cell) {
        for &(i, j) in &pairs {
            let (a, b) = (cell[i], cell[j]);
            if a == b {
                continue;
            }
            let key = (a.max(b), a.min(b));
            if seen.insert(key) {
                high.push(key.0);
                low.push(key.1);
            }
        }
    }

    let mut senders = high.clone();
    senders.extend_from_slice(&low);
    let mut receivers = low;
    receivers.extend_from_slice(&high);

    tracing::trace!(
        cells = cells.len() / verts_per_cell,
        undirected = high.len(),
        "converted cells to edges"
    );

    MeshEdges { senders, receivers }
}
