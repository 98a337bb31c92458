//! Depth-only pipeline that renders the sun's shadow map.
//!
//! The map is only re-rendered when the scene or the rig changed since the
//! last frame; see [`ShadowCache`].

use crate::data_structures::{
    instance::InstanceRaw,
    model::{ModelVertex, Vertex},
    texture::Texture,
};

pub fn mk_shadow_pipeline(
    device: &wgpu::Device,
    light_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Shadow Pipeline Layout"),
        bind_group_layouts: &[light_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
    };
    crate::pipelines::basic::mk_render_pipeline(
        device,
        &layout,
        None,
        None,
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader,
    )
}

/// Tracks whether the shadow map is stale.
#[derive(Debug, Default, Clone)]
pub struct ShadowCache {
    valid: bool,
    renders: u64,
}

impl ShadowCache {
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Returns true when the map has to be redrawn this frame and marks it fresh.
    pub fn needs_render(&mut self, scene_changed: bool) -> bool {
        if scene_changed {
            self.valid = false;
        }
        if self.valid {
            return false;
        }
        self.valid = true;
        self.renders += 1;
        true
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_once_until_invalidated() {
        let mut cache = ShadowCache::default();
        assert!(cache.needs_render(false));
        assert!(!cache.needs_render(false));
        assert!(cache.needs_render(true));
        cache.invalidate();
        assert!(cache.needs_render(false));
        assert!(!cache.needs_render(false));
        assert_eq!(cache.renders(), 3);
    }
}
