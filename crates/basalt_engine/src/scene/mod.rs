//! Scene graph and scene-level lookups

mod dictionary;
mod graph;

pub use dictionary::{SceneDictionary, SceneKey};
pub use graph::{InstanceSlot, NodeId, SceneGraph, TransformSink};
