//! End-to-end tests for the DeformingPlate model façade.

use candle_core::{DType, Device, Tensor};
use candle_nn::{Optimizer, VarBuilder, VarMap, SGD};
use deformnet_nn::{
    DeformingPlateModel, LearnedModel, MeshState, MlpConfig, ModelConfig, MultiGraph, NodeType,
    PerNodeMlp, MESH_EDGES,
};

/// Learned-model stand-in: output row `i` is `scale * (i + 1, -(i + 1), 0.5)`.
struct IndexRamp {
    scale: f32,
}

impl LearnedModel for IndexRamp {
    fn forward(&self, graph: &MultiGraph) -> candle_core::Result<Tensor> {
        let n = graph.num_nodes();
        let rows: Vec<f32> = (0..n)
            .flat_map(|i| {
                let k = (i + 1) as f32 * self.scale;
                [k, -k, 0.5 * self.scale]
            })
            .collect();
        Tensor::from_vec(rows, (n, 3), graph.node_features.device())
    }
}

fn triangle() -> MeshState {
    MeshState::new(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.5]],
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![NodeType::Normal.code(); 3],
        3,
        vec![0, 1, 2],
    )
    .unwrap()
}

fn plate() -> MeshState {
    // 3x3 grid of nodes, 8 triangles; the left column is a handle.
    let mut world_pos = Vec::new();
    let mut node_type = Vec::new();
    for y in 0..3 {
        for x in 0..3 {
            world_pos.push([x as f32, y as f32, 0.0]);
            node_type.push(if x == 0 {
                NodeType::Handle.code()
            } else {
                NodeType::Normal.code()
            });
        }
    }
    let mut cells = Vec::new();
    for y in 0..2u32 {
        for x in 0..2u32 {
            let i = y * 3 + x;
            cells.extend_from_slice(&[i, i + 1, i + 3, i + 1, i + 4, i + 3]);
        }
    }
    let target = world_pos
        .iter()
        .map(|p| [p[0], p[1], 0.1 * p[0] * p[0] + 0.05 * p[1]])
        .collect();
    MeshState::new(world_pos.clone(), world_pos, node_type, 3, cells)
        .unwrap()
        .with_target(target)
        .unwrap()
}

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() <= tol, "{a:?} != {b:?}");
    }
}

#[test]
fn test_single_triangle_predict() {
    let device = Device::Cpu;
    let mut model =
        DeformingPlateModel::new(IndexRamp { scale: 1.0 }, ModelConfig::default(), &device)
            .unwrap();

    // Give the output normalizer non-trivial statistics first.
    let training = triangle()
        .with_target(vec![[0.5, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 2.5]])
        .unwrap();
    model.loss(&training).unwrap();
    let stats = model.output_normalizer().stats().unwrap();

    let mesh = triangle();
    let next = model.predict(&mesh).unwrap();
    assert_eq!(next.dims(), &[3, 3]);

    let rows = next.to_vec2::<f32>().unwrap();
    for (i, (row, pos)) in rows.iter().zip(&mesh.world_pos).enumerate() {
        let k = (i + 1) as f32;
        let raw = [k, -k, 0.5];
        let expected: Vec<f32> = (0..3)
            .map(|c| pos[c] + raw[c] * stats.std[c] + stats.mean[c])
            .collect();
        assert_close(row, &expected, 1e-4);
    }

    // The displacement depends on the learned output.
    let other = DeformingPlateModel::new(IndexRamp { scale: 2.0 }, ModelConfig::default(), &device)
        .unwrap();
    let a = model.predict(&mesh).unwrap().to_vec2::<f32>().unwrap();
    let b = other.predict(&mesh).unwrap().to_vec2::<f32>().unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_predict_never_changes_statistics() {
    let device = Device::Cpu;
    let mut model =
        DeformingPlateModel::new(IndexRamp { scale: 1.0 }, ModelConfig::default(), &device)
            .unwrap();
    model.loss(&plate()).unwrap();

    let snapshot = |m: &DeformingPlateModel<IndexRamp>| {
        (
            m.node_normalizer().stats().unwrap(),
            m.edge_normalizer().stats().unwrap(),
            m.output_normalizer().stats().unwrap(),
        )
    };
    let before = snapshot(&model);
    let first = model.predict(&plate()).unwrap().to_vec2::<f32>().unwrap();
    for _ in 0..5 {
        model.predict(&plate()).unwrap();
    }
    assert_eq!(snapshot(&model), before);

    // Same statistics, same answer.
    let last = model.predict(&plate()).unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(first, last);
}

#[test]
fn test_loss_accumulates_all_normalizers() {
    // Loss builds the graph with accumulation on and separately always
    // accumulates the output normalizer; predict does neither.
    let device = Device::Cpu;
    let mut model =
        DeformingPlateModel::new(IndexRamp { scale: 1.0 }, ModelConfig::default(), &device)
            .unwrap();
    let mesh = plate();

    model.predict(&mesh).unwrap();
    assert_eq!(model.node_normalizer().num_accumulations(), 0);
    assert_eq!(model.edge_normalizer().num_accumulations(), 0);
    assert_eq!(model.output_normalizer().num_accumulations(), 0);

    model.loss(&mesh).unwrap();
    model.loss(&mesh).unwrap();
    assert_eq!(model.node_normalizer().num_accumulations(), 2);
    assert_eq!(model.edge_normalizer().num_accumulations(), 2);
    assert_eq!(model.output_normalizer().num_accumulations(), 2);

    assert_eq!(model.node_normalizer().count(), 18.0);
    // 16 unique undirected edges in the grid, both directions.
    assert_eq!(model.edge_normalizer().count(), 64.0);
    assert_eq!(model.output_normalizer().count(), 18.0);
}

#[test]
fn test_accumulation_cap_freezes_statistics() {
    let device = Device::Cpu;
    let config = ModelConfig::default().with_max_accumulations(1);
    let mut model = DeformingPlateModel::new(IndexRamp { scale: 1.0 }, config, &device).unwrap();
    let mesh = plate();

    model.loss(&mesh).unwrap();
    let frozen = model.output_normalizer().stats().unwrap();
    model.loss(&mesh).unwrap();
    assert_eq!(model.output_normalizer().stats().unwrap(), frozen);
    assert_eq!(model.node_normalizer().num_accumulations(), 1);
}

#[test]
fn test_graph_edges_match_mesh() {
    let device = Device::Cpu;
    let model =
        DeformingPlateModel::new(IndexRamp { scale: 1.0 }, ModelConfig::default(), &device)
            .unwrap();
    let graph = model.graph_builder().build_frozen(&plate()).unwrap();
    let edges = graph.edge_set(MESH_EDGES).unwrap();
    assert_eq!(edges.num_edges(), 32);
    assert_eq!(edges.features.dims(), &[32, ModelConfig::edge_feature_size()]);
    assert_eq!(graph.node_features.dims(), &[9, ModelConfig::node_feature_size()]);
}

#[test]
fn test_mlp_trains_on_plate() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let mlp = PerNodeMlp::new(&MlpConfig::default().with_hidden_size(32), vb).unwrap();

    let mut model = DeformingPlateModel::new(mlp, ModelConfig::default(), &device).unwrap();
    let mut sgd = SGD::new(varmap.all_vars(), 0.01).unwrap();
    let mesh = plate();

    for _ in 0..50 {
        let loss = model.loss(&mesh).unwrap();
        assert!(loss.to_scalar::<f32>().unwrap().is_finite());
        sgd.backward_step(&loss).unwrap();
    }

    let next = model.predict(&mesh).unwrap();
    assert_eq!(next.dims(), &[9, 3]);
}
