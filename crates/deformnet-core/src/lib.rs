//! Mesh-side primitives for learned mesh simulators.
//!
//! `deformnet-core` holds everything that happens before a graph network sees
//! a mesh: the per-step mesh state, conversion of cell connectivity into
//! directed edges, and the running-statistics normalizers used to scale node,
//! edge and output features. The graph builder and model façade live in
//! `deformnet-nn`.
//!
//! # Modules
//!
//! - [`mesh`]: [`MeshState`] and the [`NodeType`] categories
//! - [`edges`]: Cell connectivity to sender/receiver pairs
//! - [`normalizer`]: Accumulating mean/std feature scaler
//! - [`error`]: Crate-wide error type
//!
//! # Example
//!
//! ```rust,ignore
//! use deformnet_core::{cells_to_edges, MeshState, NodeType};
//!
//! let mesh = MeshState::new(
//!     vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
//!     vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
//!     vec![NodeType::Normal.code(); 3],
//!     3,
//!     vec![0, 1, 2],
//! )?;
//! let edges = cells_to_edges(&mesh.cells, mesh.verts_per_cell);
//! assert_eq!(edges.num_edges(), 6); // 3 undirected edges, both directions
//! ```

pub mod edges;
pub mod error;
pub mod mesh;
pub mod normalizer;

pub use edges::{cell_edge_pairs, cells_to_edges, MeshEdges};
pub use error::{Error, Result};
pub use mesh::{MeshState, NodeType};
pub use normalizer::{Normalizer, NormalizerConfig, NormalizerStats};
