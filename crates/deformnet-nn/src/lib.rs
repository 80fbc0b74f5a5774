//! Learned DeformingPlate simulator plumbing.
//!
//! `deformnet-nn` turns a [`MeshState`] into a normalized [`MultiGraph`], runs
//! a [`LearnedModel`] over it, and maps the per-node output back to physical
//! space. It sits between the mesh layer (`deformnet-core`) and whatever graph
//! network the caller trains.
//!
//! # Modules
//!
//! - [`graph`]: Node/edge feature construction and [`GraphBuilder`]
//! - [`learned`]: The [`LearnedModel`] seam and a per-node MLP baseline
//! - [`model`]: [`DeformingPlateModel`] with predict, loss and update
//! - [`config`]: [`ModelConfig`]
//!
//! # Example: Predict and Loss
//!
//! ```rust,ignore
//! use candle_core::{DType, Device};
//! use candle_nn::{VarBuilder, VarMap};
//! use deformnet_nn::{DeformingPlateModel, MlpConfig, ModelConfig, PerNodeMlp};
//!
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//! let learned = PerNodeMlp::new(&MlpConfig::default(), vb)?;
//!
//! let mut model = DeformingPlateModel::new(learned, ModelConfig::default(), &device)?;
//! let loss = model.loss(&training_step)?;     // accumulates normalizer statistics
//! let next = model.predict(&inference_step)?; // (num_nodes, 3), read-only
//! ```
//!
//! [`MeshState`]: deformnet_core::MeshState

pub mod config;
pub mod graph;
pub mod learned;
pub mod model;

pub use config::ModelConfig;
pub use deformnet_core::{Error, MeshState, NodeType, Result};
pub use graph::{EdgeSet, GraphBuilder, MultiGraph, MESH_EDGES};
pub use learned::{LearnedModel, MlpConfig, PerNodeMlp};
pub use model::DeformingPlateModel;
