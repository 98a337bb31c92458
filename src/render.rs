//! Render/scene manager.
//!
//! [`RenderManager`] owns the scene graph, the first-person camera and its
//! projection, the office lighting rig and a [`RenderBackend`]. It also keeps
//! the ledger of every geometry and material handed to the backend so each
//! release reaches the backend exactly once, no matter whether the owner or the
//! final sweep in [`RenderManager::dispose`] asks for it.

use std::collections::{HashMap, HashSet};

use cgmath::Deg;

use crate::{
    backend::{DrawItem, Frame, Overlay, RenderBackend},
    camera::{Camera, CameraUniform, Projection},
    collision::Aabb,
    config::ViewerConfig,
    data_structures::{
        instance::InstanceRaw,
        model::{GeometryId, Material, MaterialId, MeshData},
        scene_graph::{NodeId, SceneGraph},
    },
    error::{RenderError, ViewerError},
    pipelines::light::LightRig,
};

pub struct RenderManager {
    pub scene: SceneGraph,
    pub camera: Camera,
    projection: Projection,
    lights: Option<LightRig>,
    lights_changed: bool,
    backend: Box<dyn RenderBackend>,
    geometries: HashMap<GeometryId, Option<Aabb>>,
    materials: HashSet<MaterialId>,
    next_geometry: u32,
    next_material: u32,
    size: (u32, u32),
    clear_colour: wgpu::Color,
    draws: Vec<DrawItem>,
    disposed: bool,
}

impl RenderManager {
    /// Builds the scene, camera and lighting rig on top of `backend`.
    ///
    /// On failure the backend has already been disposed.
    pub fn initialize(
        mut backend: Box<dyn RenderBackend>,
        size: (u32, u32),
        config: &ViewerConfig,
    ) -> Result<Self, ViewerError> {
        let projection = match Projection::first_person(size.0, size.1) {
            Ok(projection) => projection,
            Err(err) => {
                backend.dispose();
                return Err(err);
            }
        };
        let [x, z] = config.movement.spawn;
        let camera = Camera::new((x, config.movement.eye_height, z), Deg(-90.0), Deg(0.0));

        let lights = LightRig::office(&config.room);
        backend.set_lights(Some(&lights));
        backend.resize(size.0, size.1);
        log::info!(
            "render manager ready at {}x{} with {} lights",
            size.0,
            size.1,
            lights.len()
        );

        Ok(Self {
            scene: SceneGraph::new(),
            camera,
            projection,
            lights: Some(lights),
            lights_changed: true,
            backend,
            geometries: HashMap::new(),
            materials: HashSet::new(),
            next_geometry: 0,
            next_material: 0,
            size,
            clear_colour: config.clear_colour,
            draws: Vec::new(),
            disposed: false,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn lights(&self) -> Option<&LightRig> {
        self.lights.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Draws the current scene from the current camera once.
    pub fn render(&mut self, overlay: Option<Overlay<'_>>) -> Result<(), RenderError> {
        if self.disposed {
            return Ok(());
        }
        let mut camera = CameraUniform::new();
        camera.update_view_proj(&self.camera, &self.projection);

        self.draws.clear();
        let draws = &mut self.draws;
        self.scene.visit_world(|id, node, world| {
            if let Some(mesh) = node.mesh {
                draws.push(DrawItem {
                    node: id,
                    mesh,
                    instance: InstanceRaw::from_world(world),
                });
            }
        });

        let scene_changed = self.scene.take_dirty() | std::mem::take(&mut self.lights_changed);
        let frame = Frame {
            camera,
            draws: &self.draws,
            scene_changed,
            clear_colour: self.clear_colour,
        };
        self.backend.draw(&frame, overlay)
    }

    /// Updates the camera aspect and the backend viewport. Repeating a size is
    /// a no-op.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if self.disposed || (width, height) == self.size || width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.projection.resize(width, height);
        self.backend.resize(width, height);
    }

    /// Forces the backend to reconfigure its surface at the current size.
    pub fn reconfigure(&mut self) {
        if !self.disposed {
            self.backend.resize(self.size.0, self.size.1);
        }
    }

    pub fn on_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        !self.disposed && self.backend.on_window_event(event)
    }

    pub fn create_geometry(&mut self, mesh: &MeshData) -> GeometryId {
        let id = GeometryId(self.next_geometry);
        self.next_geometry += 1;
        self.backend.upload_geometry(id, mesh);
        self.geometries.insert(id, mesh.bounds());
        id
    }

    pub fn create_material(&mut self, material: &Material) -> MaterialId {
        let id = MaterialId(self.next_material);
        self.next_material += 1;
        self.backend.upload_material(id, material);
        self.materials.insert(id);
        id
    }

    /// Releases the geometry. Returns false if it was already released.
    pub fn release_geometry(&mut self, id: GeometryId) -> bool {
        if self.geometries.remove(&id).is_none() {
            return false;
        }
        self.backend.release_geometry(id);
        true
    }

    /// Releases the material. Returns false if it was already released.
    pub fn release_material(&mut self, id: MaterialId) -> bool {
        if !self.materials.remove(&id) {
            return false;
        }
        self.backend.release_material(id);
        true
    }

    pub fn is_geometry_live(&self, id: GeometryId) -> bool {
        self.geometries.contains_key(&id)
    }

    pub fn is_material_live(&self, id: MaterialId) -> bool {
        self.materials.contains(&id)
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_material_count(&self) -> usize {
        self.materials.len()
    }

    /// Local-space bounds of live geometry.
    pub fn geometry_bounds(&self, id: GeometryId) -> Option<Aabb> {
        self.geometries.get(&id).copied().flatten()
    }

    /// World-space boxes of every visible mesh below `root`.
    pub fn world_bounds_below(&self, root: NodeId) -> Vec<Aabb> {
        let mut boxes = Vec::new();
        self.scene.visit_world_from(root, |_, node, world| {
            if let Some(bounds) = node
                .mesh
                .and_then(|mesh| self.geometry_bounds(mesh.geometry))
            {
                boxes.push(bounds.transformed(&world));
            }
        });
        boxes
    }

    /// Releases the drawing context, removes the lights and frees every
    /// geometry and material still alive. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let mut geometries: Vec<_> = self.geometries.drain().map(|(id, _)| id).collect();
        geometries.sort();
        for id in geometries {
            self.backend.release_geometry(id);
        }
        let mut materials: Vec<_> = self.materials.drain().collect();
        materials.sort();
        for id in materials {
            self.backend.release_material(id);
        }
        if self.lights.take().is_some() {
            self.backend.set_lights(None);
        }
        let root = self.scene.root();
        let children: Vec<_> = self
            .scene
            .get(root)
            .map(|node| node.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.scene.detach(child);
        }
        self.draws.clear();
        self.backend.dispose();
        self.disposed = true;
        log::info!("render manager disposed");
    }
}

impl Drop for RenderManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::HeadlessBackend,
        data_structures::{instance::Transform, model::MeshRef, primitives},
    };

    fn manager() -> (RenderManager, std::rc::Rc<std::cell::RefCell<crate::backend::HeadlessLog>>) {
        let backend = HeadlessBackend::new(800, 600);
        let log = backend.log();
        let manager =
            RenderManager::initialize(Box::new(backend), (800, 600), &ViewerConfig::default())
                .unwrap();
        (manager, log)
    }

    #[test]
    fn initialize_installs_camera_and_rig() {
        let (manager, log) = manager();
        assert!((manager.projection().fovy().0.to_degrees() - 75.0).abs() < 1e-3);
        assert!((manager.projection().znear() - 0.1).abs() < 1e-6);
        assert!(manager.projection().zfar() <= 50.0);
        let points = manager.lights().unwrap().points.len();
        assert!((4..=6).contains(&points));
        assert_eq!(log.borrow().light_count, 3 + points);
    }

    #[test]
    fn render_draws_each_mesh_once() {
        let (mut manager, log) = manager();
        let geometry = manager.create_geometry(&primitives::cuboid("box", 1.0, 1.0, 1.0));
        let material = manager.create_material(&Material::new("grey", [0.5, 0.5, 0.5, 1.0]));
        let root = manager.scene.root();
        for x in 0..3 {
            manager.scene.add_child(
                root,
                format!("box_{x}"),
                Transform::at(x as f32, 0.0, 0.0),
                Some(MeshRef { geometry, material }),
            );
        }
        manager.render(None).unwrap();
        assert_eq!(log.borrow().frames, 1);
        assert_eq!(log.borrow().last_draw_count, 3);
    }

    #[test]
    fn resize_is_idempotent() {
        let (mut manager, log) = manager();
        manager.on_resize(1024, 512);
        let after_first = log.borrow().clone();
        let aspect = manager.projection().aspect();
        manager.on_resize(1024, 512);
        assert_eq!(log.borrow().resize_calls, after_first.resize_calls);
        assert_eq!(log.borrow().viewport, (1024, 512));
        assert_eq!(manager.projection().aspect(), aspect);
        assert!((aspect - 2.0).abs() < 1e-6);
    }

    #[test]
    fn releases_reach_the_backend_once() {
        let (mut manager, log) = manager();
        let geometry = manager.create_geometry(&primitives::plane("floor", 2.0, 2.0));
        let material = manager.create_material(&Material::new("floor", [1.0; 4]));
        assert!(manager.release_geometry(geometry));
        assert!(!manager.release_geometry(geometry));
        assert!(manager.release_material(material));
        manager.dispose();
        let log = log.borrow();
        assert_eq!(log.geometry_release_count(geometry), 1);
        assert_eq!(log.material_release_count(material), 1);
    }

    #[test]
    fn dispose_sweeps_remaining_resources_and_lights() {
        let (mut manager, log) = manager();
        let geometry = manager.create_geometry(&primitives::cuboid("wall", 4.0, 3.0, 0.2));
        let material = manager.create_material(&Material::new("wall", [0.8; 4]));
        manager.dispose();
        manager.dispose();
        let log = log.borrow();
        assert!(log.disposed);
        assert_eq!(log.light_count, 0);
        assert_eq!(log.geometry_release_count(geometry), 1);
        assert_eq!(log.material_release_count(material), 1);
        assert!(manager.lights().is_none());
    }

    #[test]
    fn world_bounds_follow_the_node_transform() {
        let (mut manager, _log) = manager();
        let geometry = manager.create_geometry(&primitives::cuboid("post", 1.0, 2.0, 1.0));
        let material = manager.create_material(&Material::new("post", [1.0; 4]));
        let root = manager.scene.root();
        let group = manager
            .scene
            .add_child(root, "group", Transform::at(5.0, 0.0, 0.0), None)
            .unwrap();
        manager.scene.add_child(
            group,
            "post",
            Transform::at(0.0, 1.0, -2.0),
            Some(MeshRef { geometry, material }),
        );
        let boxes = manager.world_bounds_below(group);
        assert_eq!(boxes.len(), 1);
        let centre = boxes[0].center();
        assert!((centre.x - 5.0).abs() < 1e-5);
        assert!((centre.y - 1.0).abs() < 1e-5);
        assert!((centre.z + 2.0).abs() < 1e-5);
    }
}
