//! Live debug parameters.
//!
//! A [`DebugPanel`] is a registry of [`ParameterBinding`]s. Each binding
//! ties one slider to one component of a node's transform. Bindings are
//! created per transform in sets of nine (position, rotation and scale on x, y
//! and z), edited through the egui panel and written back into the scene
//! before the next render.

use std::collections::BTreeMap;

use crate::data_structures::{instance::Transform, scene_graph::{NodeId, SceneGraph}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformField {
    Position,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldSelector {
    pub field: TransformField,
    pub axis: Axis,
}

impl FieldSelector {
    pub const ALL: [FieldSelector; 9] = {
        use Axis::*;
        use TransformField::*;
        [
            FieldSelector { field: Position, axis: X },
            FieldSelector { field: Position, axis: Y },
            FieldSelector { field: Position, axis: Z },
            FieldSelector { field: Rotation, axis: X },
            FieldSelector { field: Rotation, axis: Y },
            FieldSelector { field: Rotation, axis: Z },
            FieldSelector { field: Scale, axis: X },
            FieldSelector { field: Scale, axis: Y },
            FieldSelector { field: Scale, axis: Z },
        ]
    };

    /// Slider range and step for this field.
    pub fn range(&self) -> (f32, f32, f32) {
        match self.field {
            TransformField::Position => (-20.0, 20.0, 0.01),
            TransformField::Rotation => (-std::f32::consts::PI, std::f32::consts::PI, 0.01),
            TransformField::Scale => (0.1, 5.0, 0.01),
        }
    }

    pub fn read(&self, transform: &Transform) -> f32 {
        let v = match self.field {
            TransformField::Position => transform.position,
            TransformField::Rotation => transform.rotation,
            TransformField::Scale => transform.scale,
        };
        match self.axis {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn write(&self, transform: &mut Transform, value: f32) {
        let v = match self.field {
            TransformField::Position => &mut transform.position,
            TransformField::Rotation => &mut transform.rotation,
            TransformField::Scale => &mut transform.scale,
        };
        match self.axis {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
            Axis::Z => v.z = value,
        }
    }

    fn label(&self) -> &'static str {
        match self.axis {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub id: BindingId,
    pub node: NodeId,
    pub label: String,
    pub selector: FieldSelector,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub value: f32,
    dirty: bool,
}

#[derive(Debug, Default)]
pub struct DebugPanel {
    enabled: bool,
    bindings: BTreeMap<BindingId, ParameterBinding>,
    next_id: u32,
}

impl DebugPanel {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, id: BindingId) -> Option<&ParameterBinding> {
        self.bindings.get(&id)
    }

    pub fn bindings_for(&self, node: NodeId) -> Vec<&ParameterBinding> {
        self.bindings.values().filter(|b| b.node == node).collect()
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.bindings.values().any(|b| b.node == node)
    }

    /// Registers the nine sliders of `node`'s transform. A node gets at most
    /// one set; binding it again returns the existing ids. Returns nothing
    /// while the panel is disabled or the node is gone.
    pub fn bind_transform(
        &mut self,
        scene: &SceneGraph,
        node: NodeId,
        label: impl Into<String>,
    ) -> Vec<BindingId> {
        if !self.enabled {
            return Vec::new();
        }
        let existing: Vec<_> = self.bindings_for(node).iter().map(|b| b.id).collect();
        if !existing.is_empty() {
            return existing;
        }
        let Some(transform) = scene.get_local_transform(node) else {
            return Vec::new();
        };
        let label = label.into();
        FieldSelector::ALL
            .iter()
            .map(|selector| {
                let (min, max, step) = selector.range();
                let id = BindingId(self.next_id);
                self.next_id += 1;
                self.bindings.insert(
                    id,
                    ParameterBinding {
                        id,
                        node,
                        label: label.clone(),
                        selector: *selector,
                        min,
                        max,
                        step,
                        value: selector.read(transform),
                        dirty: false,
                    },
                );
                id
            })
            .collect()
    }

    /// Removes every binding of `node`. Returns how many were removed.
    pub fn unbind(&mut self, node: NodeId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|_, b| b.node != node);
        before - self.bindings.len()
    }

    /// Moves the binding set from `from` to `to`.
    pub fn rebind(
        &mut self,
        scene: &SceneGraph,
        from: NodeId,
        to: NodeId,
        label: impl Into<String>,
    ) -> Vec<BindingId> {
        self.unbind(from);
        self.bind_transform(scene, to, label)
    }

    /// Stores a slider edit, clamped to the binding's range. It reaches the
    /// scene on the next [`DebugPanel::apply`].
    pub fn set_value(&mut self, id: BindingId, value: f32) -> bool {
        let Some(binding) = self.bindings.get_mut(&id) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        binding.value = value.clamp(binding.min, binding.max);
        binding.dirty = true;
        true
    }

    /// Writes edited values into the scene. Bindings of removed nodes are
    /// dropped. Returns true if any transform was written.
    pub fn apply(&mut self, scene: &mut SceneGraph) -> bool {
        self.bindings.retain(|_, b| scene.contains(b.node));
        let mut written = false;
        for binding in self.bindings.values_mut().filter(|b| b.dirty) {
            if let Some(mut transform) = scene.get_local_transform(binding.node).cloned() {
                binding.selector.write(&mut transform, binding.value);
                written |= scene.set_local_transform(binding.node, transform);
            }
            binding.dirty = false;
        }
        written
    }

    /// Pulls current transform values into untouched sliders.
    pub fn sync(&mut self, scene: &SceneGraph) {
        for binding in self.bindings.values_mut().filter(|b| !b.dirty) {
            if let Some(transform) = scene.get_local_transform(binding.node) {
                binding.value = binding.selector.read(transform);
            }
        }
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        if !self.enabled {
            return;
        }
        let mut groups: BTreeMap<(String, NodeId), Vec<BindingId>> = BTreeMap::new();
        for binding in self.bindings.values() {
            groups
                .entry((binding.label.clone(), binding.node))
                .or_default()
                .push(binding.id);
        }

        let mut edits = Vec::new();
        egui::Window::new("Environment")
            .title_bar(true)
            .resizable(true)
            .default_pos(egui::pos2(10.0, 10.0))
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for ((label, node), ids) in &groups {
                        egui::CollapsingHeader::new(label.as_str())
                            .id_salt(node)
                            .show(ui, |ui| {
                                for field in [
                                    TransformField::Position,
                                    TransformField::Rotation,
                                    TransformField::Scale,
                                ] {
                                    ui.label(format!("{field:?}"));
                                    for id in ids {
                                        let Some(binding) = self.bindings.get(id) else {
                                            continue;
                                        };
                                        if binding.selector.field != field {
                                            continue;
                                        }
                                        let mut value = binding.value;
                                        let slider =
                                            egui::Slider::new(&mut value, binding.min..=binding.max)
                                                .step_by(binding.step as f64)
                                                .text(binding.selector.label());
                                        if ui.add(slider).changed() {
                                            edits.push((*id, value));
                                        }
                                    }
                                }
                            });
                    }
                });
            });
        for (id, value) in edits {
            self.set_value(id, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_node() -> (SceneGraph, NodeId) {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let node = scene
            .add_child(root, "desk", Transform::at(1.0, 0.0, -2.0), None)
            .unwrap();
        (scene, node)
    }

    #[test]
    fn one_binding_set_per_transform() {
        let (scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(true);
        let first = panel.bind_transform(&scene, node, "desk");
        let second = panel.bind_transform(&scene, node, "desk");
        assert_eq!(first.len(), 9);
        assert_eq!(first, second);
        assert_eq!(panel.len(), 9);
    }

    #[test]
    fn disabled_panel_registers_nothing() {
        let (scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(false);
        assert!(panel.bind_transform(&scene, node, "desk").is_empty());
        assert!(panel.is_empty());
    }

    #[test]
    fn edits_are_clamped_and_applied() {
        let (mut scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(true);
        let ids = panel.bind_transform(&scene, node, "desk");
        let x = ids
            .iter()
            .copied()
            .find(|id| {
                panel.get(*id).unwrap().selector
                    == FieldSelector {
                        field: TransformField::Position,
                        axis: Axis::X,
                    }
            })
            .unwrap();
        assert!(panel.set_value(x, 100.0));
        assert_eq!(panel.get(x).unwrap().value, 20.0);
        scene.take_dirty();
        assert!(panel.apply(&mut scene));
        assert_eq!(scene.get_local_transform(node).unwrap().position.x, 20.0);
        assert!(scene.take_dirty());
    }

    #[test]
    fn rebind_moves_the_set() {
        let (mut scene, placeholder) = scene_with_node();
        let real = scene
            .add_child(placeholder, "desk.glb", Transform::new(), None)
            .unwrap();
        let mut panel = DebugPanel::new(true);
        panel.bind_transform(&scene, placeholder, "desk");
        panel.rebind(&scene, placeholder, real, "desk");
        assert!(!panel.is_bound(placeholder));
        assert_eq!(panel.bindings_for(real).len(), 9);
    }

    #[test]
    fn bindings_of_removed_nodes_are_dropped() {
        let (mut scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(true);
        panel.bind_transform(&scene, node, "desk");
        scene.detach(node);
        assert!(!panel.apply(&mut scene));
        assert!(panel.is_empty());
    }

    #[test]
    fn sync_reads_external_changes() {
        let (mut scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(true);
        panel.bind_transform(&scene, node, "desk");
        scene.set_local_transform(node, Transform::at(3.0, 0.0, 0.0));
        panel.sync(&scene);
        let x = panel
            .bindings_for(node)
            .into_iter()
            .find(|b| b.selector == FieldSelector::ALL[0])
            .unwrap();
        assert_eq!(x.value, 3.0);
    }

    #[test]
    fn panel_renders_headlessly() {
        let (scene, node) = scene_with_node();
        let mut panel = DebugPanel::new(true);
        panel.bind_transform(&scene, node, "desk");
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| panel.show(ctx));
        assert_eq!(panel.len(), 9);
    }
}
