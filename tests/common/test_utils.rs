use std::{cell::RefCell, collections::HashMap, rc::Rc};

use cubicle_view::{
    backend::{HeadlessBackend, HeadlessLog},
    config::ViewerConfig,
    data_structures::{instance::Transform, model::Material, primitives},
    resources::{AssetFuture, AssetLoader, AssetNode},
    viewer::Viewer,
};
use futures::channel::oneshot;

type Reply = oneshot::Sender<anyhow::Result<AssetNode>>;

/// Loader whose requests stay pending until the test resolves them.
#[derive(Default)]
pub struct ManualLoader {
    pending: RefCell<HashMap<String, Vec<Reply>>>,
    requests: RefCell<Vec<String>>,
}

impl ManualLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Every path requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn pending(&self, path: &str) -> usize {
        self.pending.borrow().get(path).map_or(0, Vec::len)
    }

    /// Completes every outstanding request for `path` with a copy of `asset`.
    /// Returns how many receivers were still listening.
    pub fn resolve(&self, path: &str, asset: &AssetNode) -> usize {
        self.reply(path, |_| Ok(asset.clone()))
    }

    pub fn fail(&self, path: &str) -> usize {
        self.reply(path, |path| Err(anyhow::anyhow!("{path}: not found")))
    }

    fn reply(&self, path: &str, result: impl Fn(&str) -> anyhow::Result<AssetNode>) -> usize {
        let senders = self.pending.borrow_mut().remove(path).unwrap_or_default();
        senders
            .into_iter()
            .filter(|tx| !tx.is_canceled())
            .map(|tx| tx.send(result(path)))
            .filter(Result::is_ok)
            .count()
    }
}

impl AssetLoader for ManualLoader {
    fn load(&self, path: &str) -> AssetFuture {
        let (tx, rx) = oneshot::channel();
        self.requests.borrow_mut().push(path.to_string());
        self.pending
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push(tx);
        Box::pin(async move { rx.await? })
    }
}

/// A small two-mesh asset shaped roughly like a desk.
pub fn desk_asset() -> AssetNode {
    let mut root = AssetNode::new("desk");
    root.meshes.push((
        primitives::cuboid("desk_top", 1.4, 0.04, 0.7),
        Material::new("oak", [0.6, 0.45, 0.3, 1.0]),
    ));
    let mut leg = AssetNode::new("desk_leg");
    leg.transform = Transform::at(0.0, -0.37, 0.0);
    leg.meshes.push((
        primitives::cuboid("desk_leg", 0.05, 0.7, 0.05),
        Material::new("steel", [0.5, 0.5, 0.55, 1.0]),
    ));
    root.children.push(leg);
    root
}

pub const SIZE: (u32, u32) = (800, 600);

/// Mounts a viewer on a headless backend. Returns the viewer, the backend's
/// call log and the loader so the test can resolve furniture loads.
pub fn mount_headless(config: &ViewerConfig) -> (Viewer, Rc<RefCell<HeadlessLog>>, Rc<ManualLoader>) {
    let backend = HeadlessBackend::new(SIZE.0, SIZE.1);
    let log = backend.log();
    let loader = ManualLoader::new();
    let viewer = Viewer::mount(Box::new(backend), SIZE, config, loader.clone(), None)
        .expect("headless mount");
    (viewer, log, loader)
}

/// Runs `frames` ticks of `delta` seconds each.
pub fn run_frames(viewer: &mut Viewer, frames: usize, delta: f32) {
    for _ in 0..frames {
        viewer.frame_with_delta(delta);
    }
}
