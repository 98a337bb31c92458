//! Procedural office environment.
//!
//! [`EnvironmentBuilder::load`] builds the room shell and the cubicles right
//! away and starts one asynchronous load per piece of furniture. Finished
//! loads are picked up on the frame thread by [`EnvironmentBuilder::poll`] and
//! attached below the placeholder that was created for them.
//!
//! Every mesh the builder creates is recorded at creation time. `dispose`
//! releases GPU resources only through that record; the name-based sweep
//! that follows merely detaches nodes from the scene.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    collision::CollidableSet,
    config::{AssetConfig, CubicleConfig, RoomConfig, ViewerConfig},
    data_structures::{
        instance::Transform,
        model::{GeometryId, Material, MaterialId, MeshData, MeshRef},
        primitives,
        scene_graph::NodeId,
    },
    debug::DebugPanel,
    environment::cubicle::{CubicleSlot, FurnitureKind},
    render::RenderManager,
    resources::{AssetLoader, AssetNode},
};

pub mod cubicle;
pub mod room;

/// Name prefixes of nodes the builder owns.
pub const OWNED_PREFIXES: [&str; 4] = ["room_", "wall_", "cubicle_", "floor_"];

pub fn is_environment_name(name: &str) -> bool {
    OWNED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// A mesh node created by the builder together with what it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedMesh {
    pub node: NodeId,
    pub geometry: GeometryId,
    /// Set for materials that belong to this mesh alone.
    pub material: Option<MaterialId>,
}

#[derive(Debug, Clone)]
struct FurnitureSlot {
    placeholder: NodeId,
    label: String,
    file: String,
}

type PendingLoad = Pin<Box<dyn Future<Output = (FurnitureSlot, anyhow::Result<AssetNode>)>>>;

struct SharedMaterials {
    floor: MaterialId,
    wall: MaterialId,
    partition: MaterialId,
    protagonist: MaterialId,
}

pub struct EnvironmentBuilder {
    room: RoomConfig,
    cubicles: CubicleConfig,
    assets: AssetConfig,
    loader: Rc<dyn AssetLoader>,
    alive: Rc<Cell<bool>>,
    debug: DebugPanel,
    collidables: Rc<RefCell<CollidableSet>>,
    groups: Vec<NodeId>,
    created: Vec<CreatedMesh>,
    shared_materials: Vec<MaterialId>,
    pending: FuturesUnordered<PendingLoad>,
    loaded: bool,
    disposed: bool,
}

impl EnvironmentBuilder {
    /// `collidables` is rebuilt whenever geometry is added or removed.
    /// `alive` is cleared by the owner on unmount; loads resolving after that
    /// are dropped.
    pub fn new(
        config: &ViewerConfig,
        loader: Rc<dyn AssetLoader>,
        collidables: Rc<RefCell<CollidableSet>>,
        alive: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            room: config.room.clone(),
            cubicles: config.cubicles.clone(),
            assets: config.assets.clone(),
            loader,
            alive,
            debug: DebugPanel::new(config.debug_panel),
            collidables,
            groups: Vec::new(),
            created: Vec::new(),
            shared_materials: Vec::new(),
            pending: FuturesUnordered::new(),
            loaded: false,
            disposed: false,
        }
    }

    /// Shared handle to the solid geometry the movement controller samples.
    pub fn collidables(&self) -> Rc<RefCell<CollidableSet>> {
        self.collidables.clone()
    }

    pub fn debug(&self) -> &DebugPanel {
        &self.debug
    }

    pub fn debug_mut(&mut self) -> &mut DebugPanel {
        &mut self.debug
    }

    /// Every mesh node created so far, in creation order.
    pub fn created(&self) -> &[CreatedMesh] {
        &self.created
    }

    pub fn shared_materials(&self) -> &[MaterialId] {
        &self.shared_materials
    }

    /// Group nodes directly below the scene root: the room shell and one per cubicle.
    pub fn groups(&self) -> &[NodeId] {
        &self.groups
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Builds the room and the cubicles and starts the furniture loads.
    /// Only the first call does anything.
    pub fn load(&mut self, rm: &mut RenderManager) {
        if self.loaded || self.disposed {
            return;
        }
        self.loaded = true;

        let materials = SharedMaterials {
            floor: rm.create_material(&Material::new("floor", [0.42, 0.4, 0.38, 1.0])),
            wall: rm.create_material(&Material::new("wall", [0.85, 0.84, 0.8, 1.0])),
            partition: rm.create_material(&Material::new("partition", [0.55, 0.6, 0.66, 1.0])),
            protagonist: rm.create_material(&Material::new(
                "partition_protagonist",
                [0.75, 0.55, 0.3, 1.0],
            )),
        };
        self.shared_materials.extend([
            materials.floor,
            materials.wall,
            materials.partition,
            materials.protagonist,
        ]);

        self.build_room(rm, &materials);
        for slot in cubicle::grid(&self.cubicles) {
            self.build_cubicle(rm, &slot, &materials);
        }
        self.rebuild_collidables(rm);
        log::info!(
            "environment built: {} meshes, {} furniture loads pending",
            self.created.len(),
            self.pending.len()
        );
    }

    fn build_room(&mut self, rm: &mut RenderManager, materials: &SharedMaterials) {
        let root = rm.scene.root();
        let Some(shell) = rm.scene.add_child(root, "room_shell", Transform::new(), None) else {
            return;
        };
        self.groups.push(shell);
        self.debug.bind_transform(&rm.scene, shell, "room");

        let floor = room::floor(&self.room);
        let mesh = primitives::plane(&floor.name, floor.size.x, floor.size.z);
        self.add_mesh(rm, shell, &floor.name, floor.centre.into(), &mesh, materials.floor, false);

        for piece in room::walls(&self.room) {
            let mesh = primitives::cuboid(&piece.name, piece.size.x, piece.size.y, piece.size.z);
            self.add_mesh(rm, shell, &piece.name, piece.centre.into(), &mesh, materials.wall, false);
        }
    }

    fn build_cubicle(&mut self, rm: &mut RenderManager, slot: &CubicleSlot, materials: &SharedMaterials) {
        let root = rm.scene.root();
        let name = slot.name();
        let Some(group) = rm.scene.add_child(root, &name, slot.centre.into(), None) else {
            return;
        };
        self.groups.push(group);
        let label = if slot.protagonist {
            format!("{name} (protagonist)")
        } else {
            name.clone()
        };
        self.debug.bind_transform(&rm.scene, group, &label);

        let partition = if slot.protagonist {
            materials.protagonist
        } else {
            materials.partition
        };
        for piece in cubicle::partitions(slot, &self.cubicles) {
            let mesh = primitives::cuboid(&piece.name, piece.size.x, piece.size.y, piece.size.z);
            self.add_mesh(rm, group, &piece.name, piece.centre.into(), &mesh, partition, false);
        }

        for kind in FurnitureKind::ALL {
            let placeholder_name = format!("{name}_{}", kind.name());
            let Some(placeholder) =
                rm.scene
                    .add_child(group, &placeholder_name, kind.placement(&self.cubicles), None)
            else {
                continue;
            };
            let slot_label = format!("{label} {}", kind.name());
            self.debug.bind_transform(&rm.scene, placeholder, &slot_label);
            let file = kind.file(&self.assets).to_string();
            let load = self.loader.load(&file);
            let slot = FurnitureSlot {
                placeholder,
                label: slot_label,
                file,
            };
            self.pending.push(Box::pin(async move { (slot, load.await) }));
        }
    }

    fn add_mesh(
        &mut self,
        rm: &mut RenderManager,
        parent: NodeId,
        name: &str,
        transform: Transform,
        mesh: &MeshData,
        material: MaterialId,
        owns_material: bool,
    ) -> Option<NodeId> {
        let geometry = rm.create_geometry(mesh);
        let Some(node) = rm
            .scene
            .add_child(parent, name, transform, Some(MeshRef { geometry, material }))
        else {
            rm.release_geometry(geometry);
            if owns_material {
                rm.release_material(material);
            }
            return None;
        };
        self.created.push(CreatedMesh {
            node,
            geometry,
            material: owns_material.then_some(material),
        });
        Some(node)
    }

    fn attach_asset(&mut self, rm: &mut RenderManager, parent: NodeId, asset: &AssetNode) -> Option<NodeId> {
        let node = rm
            .scene
            .add_child(parent, &asset.name, asset.transform.clone(), None)?;
        for (mesh, material) in &asset.meshes {
            let material = rm.create_material(material);
            self.add_mesh(rm, node, &mesh.name, Transform::new(), mesh, material, true);
        }
        for child in &asset.children {
            self.attach_asset(rm, node, child);
        }
        Some(node)
    }

    /// Attaches every load that finished since the last call. Returns the
    /// number of assets attached.
    pub fn poll(&mut self, rm: &mut RenderManager) -> usize {
        if self.disposed || self.pending.is_empty() {
            return 0;
        }
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut attached = 0;
        while let Poll::Ready(Some((slot, result))) = self.pending.poll_next_unpin(&mut cx) {
            if !self.alive.get() {
                log::debug!("dropping late load of {}", slot.file);
                continue;
            }
            match result {
                Ok(asset) => {
                    if self.attach_loaded(rm, &slot, &asset) {
                        attached += 1;
                    }
                }
                Err(err) => log::warn!("could not load {} for {}: {err:#}", slot.file, slot.label),
            }
        }
        if attached > 0 {
            self.rebuild_collidables(rm);
        }
        attached
    }

    fn attach_loaded(&mut self, rm: &mut RenderManager, slot: &FurnitureSlot, asset: &AssetNode) -> bool {
        if !rm.scene.contains(slot.placeholder) {
            log::debug!("placeholder for {} is gone", slot.label);
            return false;
        }
        let Some(node) = self.attach_asset(rm, slot.placeholder, asset) else {
            return false;
        };
        self.debug
            .rebind(&rm.scene, slot.placeholder, node, &slot.label);
        log::info!("attached {} to {}", slot.file, slot.label);
        true
    }

    /// Recomputes the world-space boxes of all builder geometry.
    pub fn rebuild_collidables(&mut self, rm: &RenderManager) {
        let boxes = self
            .groups
            .iter()
            .flat_map(|group| rm.world_bounds_below(*group))
            .collect();
        self.collidables.borrow_mut().replace(boxes);
    }

    /// Frees everything the builder created and removes its nodes.
    pub fn dispose(&mut self, rm: &mut RenderManager) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pending = FuturesUnordered::new();

        for entry in self.created.drain(..) {
            rm.release_geometry(entry.geometry);
            if let Some(material) = entry.material {
                rm.release_material(material);
            }
        }
        for material in self.shared_materials.drain(..) {
            rm.release_material(material);
        }

        // Pre-order, so a group is detached before its children are visited.
        for node in rm.scene.collect(|node| is_environment_name(&node.name)) {
            rm.scene.detach(node);
        }

        self.groups.clear();
        self.debug.clear();
        self.collidables.borrow_mut().clear();
        log::info!("environment disposed");
    }
}
