pub mod engine;
pub mod graph;
pub mod stages;

pub use engine::WorkflowEngine;
pub use graph::{Edge, Stage, StageGraph, StageUpdate};
pub use stages::canonical_graph;
