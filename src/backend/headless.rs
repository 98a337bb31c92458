use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::{
    backend::{Frame, Overlay, RenderBackend},
    data_structures::model::{GeometryId, Material, MaterialId, MeshData},
    error::RenderError,
    pipelines::{light::LightRig, shadow::ShadowCache},
};

/// Everything the headless backend was asked to do.
#[derive(Debug, Default, Clone)]
pub struct HeadlessLog {
    pub viewport: (u32, u32),
    pub resize_calls: usize,
    /// Live geometry by id with the mesh name it was uploaded with.
    pub geometries: BTreeMap<GeometryId, String>,
    pub materials: BTreeMap<MaterialId, String>,
    pub geometry_uploads: usize,
    pub material_uploads: usize,
    pub geometry_releases: BTreeMap<GeometryId, usize>,
    pub material_releases: BTreeMap<MaterialId, usize>,
    pub light_count: usize,
    pub frames: usize,
    pub last_draw_count: usize,
    pub shadow_renders: u64,
    pub overlay_frames: usize,
    pub disposed: bool,
}

impl HeadlessLog {
    pub fn geometry_release_count(&self, id: GeometryId) -> usize {
        self.geometry_releases.get(&id).copied().unwrap_or(0)
    }

    pub fn material_release_count(&self, id: MaterialId) -> usize {
        self.material_releases.get(&id).copied().unwrap_or(0)
    }
}

pub struct HeadlessBackend {
    log: Rc<RefCell<HeadlessLog>>,
    shadows: ShadowCache,
    egui: egui::Context,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let log = HeadlessLog {
            viewport: (width, height),
            ..Default::default()
        };
        Self {
            log: Rc::new(RefCell::new(log)),
            shadows: ShadowCache::default(),
            egui: egui::Context::default(),
        }
    }

    /// Shared handle to the call log; stays readable after the backend is dropped.
    pub fn log(&self) -> Rc<RefCell<HeadlessLog>> {
        self.log.clone()
    }
}

impl RenderBackend for HeadlessBackend {
    fn resize(&mut self, width: u32, height: u32) {
        let mut log = self.log.borrow_mut();
        log.resize_calls += 1;
        if width > 0 && height > 0 {
            log.viewport = (width, height);
        }
    }

    fn upload_geometry(&mut self, id: GeometryId, mesh: &MeshData) {
        let mut log = self.log.borrow_mut();
        log.geometry_uploads += 1;
        log.geometries.insert(id, mesh.name.clone());
    }

    fn upload_material(&mut self, id: MaterialId, material: &Material) {
        let mut log = self.log.borrow_mut();
        log.material_uploads += 1;
        log.materials.insert(id, material.name.clone());
    }

    fn release_geometry(&mut self, id: GeometryId) {
        let mut log = self.log.borrow_mut();
        log.geometries.remove(&id);
        *log.geometry_releases.entry(id).or_default() += 1;
    }

    fn release_material(&mut self, id: MaterialId) {
        let mut log = self.log.borrow_mut();
        log.materials.remove(&id);
        *log.material_releases.entry(id).or_default() += 1;
    }

    fn set_lights(&mut self, rig: Option<&LightRig>) {
        self.log.borrow_mut().light_count = rig.map_or(0, LightRig::len);
        self.shadows.invalidate();
    }

    fn draw(&mut self, frame: &Frame<'_>, overlay: Option<Overlay<'_>>) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if log.disposed {
            return Ok(());
        }
        log.frames += 1;
        log.last_draw_count = frame.draws.len();
        if log.light_count > 0 && self.shadows.needs_render(frame.scene_changed) {
            log.shadow_renders = self.shadows.renders();
        }
        if let Some(overlay) = overlay {
            let (width, height) = log.viewport;
            let input = egui::RawInput {
                screen_rect: Some(egui::Rect::from_min_size(
                    egui::Pos2::ZERO,
                    egui::vec2(width as f32, height as f32),
                )),
                ..Default::default()
            };
            let _ = self.egui.run(input, |ctx| overlay(ctx));
            log.overlay_frames += 1;
        }
        Ok(())
    }

    fn dispose(&mut self) {
        let mut log = self.log.borrow_mut();
        log.disposed = true;
        log.light_count = 0;
    }
}
