pub mod cache;
pub mod cancel;
pub mod compiled;
pub mod diagnostics;
pub mod graph;
pub mod grid;
pub mod noise;
pub mod nodes;
pub mod schedule;

pub use cancel::CancelToken;
pub use compiled::{Operator, OperatorKind};
pub use diagnostics::{EvalObserver, EvalReport, GraphIssue};
pub use graph::{Connection, EvalGraph, GraphNode, NodePort, PortRef};
pub use grid::{
    evaluate_heightmap, evaluate_heightmap_with, EvalOptions, Evaluation, GridDims, Heightmap,
    Strategy,
};
