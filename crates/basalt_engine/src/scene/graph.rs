//! Arena-backed scene graph with dirty-flag transform propagation
//!
//! Nodes live in a flat arena and reference each other by index, so there are
//! no owning parent pointers and the per-frame propagation is an iterative
//! walk with an explicit stack rather than recursion. A node's cached world
//! transform is recomputed only when the node or an ancestor was mutated
//! since the previous walk; clean subtrees produce no GPU-visible writes.

use crate::ecs::Entity;
use crate::foundation::math::{normal_matrix, Mat4, Transform};

slotmap::new_key_type! {
    /// Handle to a scene-graph node
    pub struct NodeId;
}

/// Reference into a GPU instance buffer: which buffer, and which record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceSlot {
    /// Identifier of the owning instance buffer (renderer-assigned)
    pub buffer: u32,
    /// Record index within that buffer
    pub index: u32,
}

/// Receiver for per-instance transform writes during propagation.
///
/// The renderer's instance table implements this; tests use a plain recorder.
pub trait TransformSink {
    /// Store `world` and its normal matrix at the given instance slot
    fn write_instance(&mut self, slot: InstanceSlot, world: &Mat4, normal: &Mat4);
}

struct Node {
    entity: Option<Entity>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Transform,
    world: Mat4,
    dirty: bool,
    instance: Option<InstanceSlot>,
}

/// Scene graph: a tree of transforms rooted at an implicit identity root
pub struct SceneGraph {
    nodes: slotmap::SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    /// Create an empty scene graph
    pub fn new() -> Self {
        Self {
            nodes: slotmap::SlotMap::with_key(),
            roots: Vec::new(),
        }
    }

    /// Add a node under `parent` (or at the root when `None`)
    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        entity: Option<Entity>,
        local: Transform,
    ) -> NodeId {
        let id = self.nodes.insert(Node {
            entity,
            parent,
            children: Vec::new(),
            local,
            world: Mat4::identity(),
            dirty: true,
            instance: None,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Remove a node and its entire subtree
    pub fn remove_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        } else {
            self.roots.retain(|&r| r != id);
        }
        let mut stack = node.children;
        while let Some(child) = stack.pop() {
            if let Some(node) = self.nodes.remove(child) {
                stack.extend(node.children);
            }
        }
    }

    /// Attach a GPU instance slot to a node; the next propagation writes it
    pub fn set_instance_slot(&mut self, id: NodeId, slot: InstanceSlot) {
        let node = &mut self.nodes[id];
        node.instance = Some(slot);
        node.dirty = true;
    }

    /// Instance slot attached to a node, if any
    pub fn instance_slot(&self, id: NodeId) -> Option<InstanceSlot> {
        self.nodes.get(id).and_then(|n| n.instance)
    }

    /// Replace a node's local transform and mark its subtree for update
    pub fn set_local(&mut self, id: NodeId, local: Transform) {
        let node = &mut self.nodes[id];
        node.local = local;
        node.dirty = true;
    }

    /// Read a node's local transform
    pub fn local(&self, id: NodeId) -> &Transform {
        &self.nodes[id].local
    }

    /// Read a node's cached world transform (valid after the last propagation)
    pub fn world(&self, id: NodeId) -> &Mat4 {
        &self.nodes[id].world
    }

    /// Like [`world`](Self::world), but `None` for a removed node. Draw
    /// submission uses this: a component can still reference a node whose
    /// subtree was removed earlier in the frame.
    pub fn try_world(&self, id: NodeId) -> Option<&Mat4> {
        self.nodes.get(id).map(|n| &n.world)
    }

    /// Entity attached to a node, if any
    pub fn entity(&self, id: NodeId) -> Option<Entity> {
        self.nodes[id].entity
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Propagate local transforms into cached world transforms.
    ///
    /// Runs once per frame before any draw submission. Children are always
    /// evaluated after their parent within the same walk, so no node ever
    /// sees a stale parent transform. Returns the number of nodes whose
    /// world transform was recomputed.
    pub fn propagate(&mut self, sink: &mut dyn TransformSink) -> usize {
        let mut recomputed = 0;
        let mut stack: Vec<(NodeId, Mat4, bool)> = self
            .roots
            .iter()
            .rev()
            .map(|&id| (id, Mat4::identity(), false))
            .collect();

        while let Some((id, parent_world, parent_dirty)) = stack.pop() {
            let node = &mut self.nodes[id];
            let dirty = node.dirty || parent_dirty;
            if dirty {
                node.world = parent_world * node.local.to_matrix();
                node.dirty = false;
                recomputed += 1;
                if let Some(slot) = node.instance {
                    let normal = normal_matrix(&node.world);
                    sink.write_instance(slot, &node.world, &normal);
                }
            }
            let world = node.world;
            for &child in node.children.clone().iter().rev() {
                stack.push((child, world, dirty));
            }
        }
        recomputed
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(InstanceSlot, Mat4)>,
    }

    impl TransformSink for Recorder {
        fn write_instance(&mut self, slot: InstanceSlot, world: &Mat4, _normal: &Mat4) {
            self.writes.push((slot, *world));
        }
    }

    fn translation(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn child_world_is_parent_times_local() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(None, None, translation(1.0, 0.0, 0.0));
        let child = graph.add_node(Some(parent), None, translation(0.0, 2.0, 0.0));
        graph.propagate(&mut Recorder::default());

        let expected = graph.local(parent).to_matrix() * graph.local(child).to_matrix();
        assert_relative_eq!(*graph.world(child), expected, epsilon = 1e-6);
    }

    #[test]
    fn clean_subtree_produces_no_writes() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(None, None, translation(1.0, 0.0, 0.0));
        let child = graph.add_node(Some(parent), None, translation(0.0, 2.0, 0.0));
        graph.set_instance_slot(child, InstanceSlot { buffer: 0, index: 0 });

        let mut first = Recorder::default();
        graph.propagate(&mut first);
        assert_eq!(first.writes.len(), 1);

        // Second walk with no mutation in between: no recompute, no writes.
        let mut second = Recorder::default();
        let recomputed = graph.propagate(&mut second);
        assert_eq!(recomputed, 0);
        assert!(second.writes.is_empty());
    }

    #[test]
    fn parent_mutation_dirties_descendants() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(None, None, translation(0.0, 0.0, 0.0));
        let child = graph.add_node(Some(parent), None, translation(0.0, 2.0, 0.0));
        let grandchild = graph.add_node(Some(child), None, translation(0.0, 0.0, 3.0));
        graph.propagate(&mut Recorder::default());

        graph.set_local(parent, translation(5.0, 0.0, 0.0));
        let recomputed = graph.propagate(&mut Recorder::default());
        assert_eq!(recomputed, 3);
        assert_relative_eq!(graph.world(grandchild).m14, 5.0, epsilon = 1e-6);
        assert_relative_eq!(graph.world(grandchild).m24, 2.0, epsilon = 1e-6);
        assert_relative_eq!(graph.world(grandchild).m34, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn each_node_visited_at_most_once_per_walk() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(None, None, translation(0.0, 0.0, 0.0));
        for i in 0..4 {
            let mid = graph.add_node(Some(root), None, translation(i as f32, 0.0, 0.0));
            graph.add_node(Some(mid), None, translation(0.0, 1.0, 0.0));
        }
        let recomputed = graph.propagate(&mut Recorder::default());
        assert_eq!(recomputed, graph.len());
    }

    #[test]
    fn remove_subtree_detaches_all_descendants() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(None, None, translation(0.0, 0.0, 0.0));
        let mid = graph.add_node(Some(root), None, translation(1.0, 0.0, 0.0));
        graph.add_node(Some(mid), None, translation(2.0, 0.0, 0.0));
        graph.remove_subtree(mid);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn try_world_is_none_after_removal() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(None, None, translation(0.0, 0.0, 0.0));
        let child = graph.add_node(Some(root), None, translation(1.0, 0.0, 0.0));
        graph.propagate(&mut Recorder::default());

        graph.remove_subtree(child);
        assert!(graph.try_world(child).is_none());
        assert!(graph.try_world(root).is_some());
    }
}
