//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids carry a
//! generation so a stale id kept by an async continuation never resolves to a
//! node that reused the slot. Every node has a name, a local [`Transform`]
//! and optionally a [`MeshRef`] to draw.

use cgmath::Matrix4;

use crate::data_structures::{instance::Transform, model::MeshRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshRef>,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    dirty: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root_node = Node {
            name: "scene".to_string(),
            transform: Transform::new(),
            mesh: None,
            visible: true,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root_node),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            dirty: true,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Adds a node below `parent`. Returns `None` if the parent no longer exists.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        transform: Transform,
        mesh: Option<MeshRef>,
    ) -> Option<NodeId> {
        self.get(parent)?;
        let node = Node {
            name: name.into(),
            transform,
            mesh,
            visible: true,
            parent: Some(parent),
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.push(id);
        }
        self.dirty = true;
        Some(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Mutable access marks the scene as changed.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dirty = true;
        self.node_mut(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get_local_transform(&self, id: NodeId) -> Option<&Transform> {
        self.get(id).map(|node| &node.transform)
    }

    pub fn set_local_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Whether the node can be reached from the root.
    pub fn is_reachable(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.get(current).and_then(|node| node.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn get_world_transform(&self, id: NodeId) -> Option<Matrix4<f32>> {
        let node = self.get(id)?;
        let local = node.transform.to_matrix();
        match node.parent {
            Some(parent) => Some(self.get_world_transform(parent)? * local),
            None => Some(local),
        }
    }

    /// Removes `id` and its whole subtree. Removed nodes are returned in
    /// depth-first order so the caller can inspect what they referenced.
    pub fn detach(&mut self, id: NodeId) -> Vec<Node> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        if let Some(parent) = self.get(id).and_then(|node| node.parent) {
            if let Some(parent) = self.node_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
        }
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                stack.extend(node.children.iter().rev().copied());
                removed.push(node);
            }
        }
        self.dirty = true;
        removed
    }

    /// Depth-first search from the root for the first node with this name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.collect(|node| node.name == name).into_iter().next()
    }

    /// Depth-first, pre-order list of nodes matching the predicate.
    pub fn collect(&self, predicate: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                if predicate(node) {
                    found.push(current);
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        found
    }

    /// Visits every visible node together with its world matrix. Invisible
    /// nodes hide their subtree.
    pub fn visit_world(&self, visitor: impl FnMut(NodeId, &Node, Matrix4<f32>)) {
        self.visit_world_from(self.root, visitor);
    }

    /// Like [`SceneGraph::visit_world`] but limited to the subtree of `id`.
    pub fn visit_world_from(
        &self,
        id: NodeId,
        mut visitor: impl FnMut(NodeId, &Node, Matrix4<f32>),
    ) {
        let Some(start) = self
            .get(id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.get_world_transform(parent))
            .or_else(|| self.contains(id).then(|| Matrix4::from_scale(1.0)))
        else {
            return;
        };
        let mut stack = vec![(id, start)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.to_matrix();
            visitor(current, node, world);
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }

    /// Number of live nodes including the root.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
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
    use cgmath::Vector4;

    #[test]
    fn add_and_find() {
        let mut scene = SceneGraph::new();
        let room = scene
            .add_child(scene.root(), "room_shell", Transform::new(), None)
            .unwrap();
        let wall = scene
            .add_child(room, "wall_north", Transform::at(0.0, 1.0, -5.0), None)
            .unwrap();
        assert_eq!(scene.find_by_name("wall_north"), Some(wall));
        assert_eq!(scene.get(wall).unwrap().parent(), Some(room));
        assert_eq!(scene.len(), 3);
        assert!(scene.is_reachable(wall));
    }

    #[test]
    fn world_transform_composes_parents() {
        let mut scene = SceneGraph::new();
        let a = scene
            .add_child(scene.root(), "a", Transform::at(1.0, 0.0, 0.0), None)
            .unwrap();
        let b = scene
            .add_child(a, "b", Transform::at(0.0, 2.0, 0.0), None)
            .unwrap();
        let world = scene.get_world_transform(b).unwrap();
        assert_eq!(world * Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(1.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn detach_removes_subtree_and_invalidates_ids() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), "a", Transform::new(), None).unwrap();
        let b = scene.add_child(a, "b", Transform::new(), None).unwrap();
        let c = scene.add_child(b, "c", Transform::new(), None).unwrap();

        let removed = scene.detach(a);
        let names: Vec<_> = removed.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(!scene.contains(a));
        assert!(!scene.contains(c));
        assert!(!scene.is_reachable(b));
        assert!(scene.get(scene.root()).unwrap().children().is_empty());

        // the slot is reused, the stale id still misses
        let d = scene.add_child(scene.root(), "d", Transform::new(), None).unwrap();
        assert!(scene.contains(d));
        assert!(!scene.contains(a) && !scene.contains(b) && !scene.contains(c));
        assert!(scene.add_child(a, "orphan", Transform::new(), None).is_none());
    }

    #[test]
    fn root_cannot_be_detached() {
        let mut scene = SceneGraph::new();
        assert!(scene.detach(scene.root()).is_empty());
        assert!(scene.contains(scene.root()));
    }

    #[test]
    fn invisible_nodes_hide_subtree() {
        let mut scene = SceneGraph::new();
        let a = scene.add_child(scene.root(), "a", Transform::new(), None).unwrap();
        scene.add_child(a, "b", Transform::new(), None).unwrap();
        scene.get_mut(a).unwrap().visible = false;
        let mut visited = Vec::new();
        scene.visit_world(|_, node, _| visited.push(node.name.clone()));
        assert_eq!(visited, ["scene"]);
    }

    #[test]
    fn dirty_flag() {
        let mut scene = SceneGraph::new();
        assert!(scene.take_dirty());
        assert!(!scene.take_dirty());
        let a = scene.add_child(scene.root(), "a", Transform::new(), None).unwrap();
        assert!(scene.take_dirty());
        scene.set_local_transform(a, Transform::at(1.0, 0.0, 0.0));
        assert!(scene.take_dirty());
    }
}
