//! Drawing backends.
//!
//! [`RenderManager`](crate::render::RenderManager) talks to the GPU only
//! through [`RenderBackend`]. The `wgpu` backend draws into a window; the
//! headless backend records what it was asked to do and is used in tests and
//! on machines without a graphics adapter.

use winit::event::WindowEvent;

use crate::{
    camera::CameraUniform,
    data_structures::{
        instance::InstanceRaw,
        model::{GeometryId, Material, MaterialId, MeshData, MeshRef},
        scene_graph::NodeId,
    },
    error::RenderError,
    pipelines::light::LightRig,
};

pub mod gpu;
pub mod headless;

pub use gpu::WgpuBackend;
pub use headless::{HeadlessBackend, HeadlessLog};

/// One mesh to draw this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub mesh: MeshRef,
    pub instance: InstanceRaw,
}

/// Everything a backend needs to produce one frame.
#[derive(Debug)]
pub struct Frame<'a> {
    pub camera: CameraUniform,
    pub draws: &'a [DrawItem],
    /// Geometry, transforms or lights changed since the previous frame.
    pub scene_changed: bool,
    pub clear_colour: wgpu::Color,
}

/// UI drawn on top of the scene, e.g. the debug panel.
pub type Overlay<'a> = &'a mut dyn FnMut(&egui::Context);

pub trait RenderBackend {
    fn resize(&mut self, width: u32, height: u32);

    fn upload_geometry(&mut self, id: GeometryId, mesh: &MeshData);

    fn upload_material(&mut self, id: MaterialId, material: &Material);

    fn release_geometry(&mut self, id: GeometryId);

    fn release_material(&mut self, id: MaterialId);

    /// Installs the lighting rig, or removes all lights with `None`.
    fn set_lights(&mut self, rig: Option<&LightRig>);

    fn draw(&mut self, frame: &Frame<'_>, overlay: Option<Overlay<'_>>) -> Result<(), RenderError>;

    /// Returns true if the overlay consumed the event.
    fn on_window_event(&mut self, _event: &WindowEvent) -> bool {
        false
    }

    /// Releases the drawing context. Must tolerate repeated calls.
    fn dispose(&mut self);
}
