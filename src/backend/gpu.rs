//! Window-backed renderer on top of `wgpu`.
//!
//! Per frame it writes the camera and instance data, refreshes the shadow
//! map if the scene changed, draws every item with the lit pipeline and
//! finally composites the egui overlay.

use std::{collections::HashMap, iter, sync::Arc};

use wgpu::util::DeviceExt;
use winit::{event::WindowEvent, window::Window};

use crate::{
    backend::{Frame, Overlay, RenderBackend},
    camera::CameraUniform,
    context::Context,
    data_structures::{
        instance::InstanceRaw,
        model::{GeometryId, Material, MaterialId, MeshData},
        texture::Texture,
    },
    error::{RenderError, ViewerError},
    pipelines::{
        basic::{mk_lit_pipeline, mk_material_bind_group, mk_material_layout},
        light::{self, LightRig, LightUniform},
        shadow::{ShadowCache, mk_shadow_pipeline},
    },
};

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
}

struct GpuMaterial {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuBackend {
    ctx: Context,
    is_surface_configured: bool,
    disposed: bool,
    depth_texture: Texture,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    shadow_map: Texture,
    shadow_bind_group: wgpu::BindGroup,
    lit_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    material_layout: wgpu::BindGroupLayout,
    geometries: HashMap<GeometryId, GpuMesh>,
    materials: HashMap<MaterialId, GpuMaterial>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    shadows: ShadowCache,
    has_lights: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl WgpuBackend {
    /// Creates the drawing context for `window`. A missing window is fatal.
    pub async fn new(window: Option<Arc<Window>>) -> Result<Self, ViewerError> {
        let window = window.ok_or(ViewerError::MissingSurface)?;
        let ctx = Context::new(window.clone()).await?;
        let device = &ctx.device;

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let light_layout = light::mk_bind_group_layout(device);
        let light_buffer =
            light::mk_buffer(device, bytemuck::Zeroable::zeroed());
        let light_bind_group = light::mk_bind_group(device, &light_layout, &light_buffer);

        let shadow_map = Texture::create_shadow_map(device, light::MAX_SHADOW_MAP_SIZE);
        let shadow_layout = light::mk_shadow_bind_group_layout(device);
        let shadow_sampler = shadow_map
            .sampler
            .as_ref()
            .ok_or_else(|| ViewerError::DeviceRequest("shadow sampler missing".to_string()))?;
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
            label: Some("shadow_bind_group"),
        });

        let material_layout = mk_material_layout(device);
        let lit_pipeline = mk_lit_pipeline(
            device,
            &ctx.config,
            &camera_bind_group_layout,
            &light_layout,
            &shadow_layout,
            &material_layout,
        );
        let shadow_pipeline = mk_shadow_pipeline(device, &light_layout);

        let depth_texture = Texture::create_depth_texture(
            device,
            [ctx.config.width, ctx.config.height],
            "depth_texture",
        );

        let instance_capacity = 64;
        let instance_buffer = mk_instance_buffer(device, instance_capacity);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            ctx.config.format,
            egui_wgpu::RendererOptions::default(),
        );

        let is_surface_configured = ctx.config.width > 0 && ctx.config.height > 0;
        Ok(Self {
            ctx,
            is_surface_configured,
            disposed: false,
            depth_texture,
            camera_buffer,
            camera_bind_group,
            light_buffer,
            light_bind_group,
            shadow_map,
            shadow_bind_group,
            lit_pipeline,
            shadow_pipeline,
            material_layout,
            geometries: HashMap::new(),
            materials: HashMap::new(),
            instance_buffer,
            instance_capacity,
            shadows: ShadowCache::default(),
            has_lights: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.ctx.window
    }

    fn write_instances(&mut self, frame: &Frame<'_>) {
        if frame.draws.len() > self.instance_capacity {
            self.instance_capacity = frame.draws.len().next_power_of_two();
            self.instance_buffer.destroy();
            self.instance_buffer = mk_instance_buffer(&self.ctx.device, self.instance_capacity);
        }
        let raw: Vec<InstanceRaw> = frame.draws.iter().map(|draw| draw.instance).collect();
        if !raw.is_empty() {
            self.ctx
                .queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
    }

    fn draw_overlay(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        overlay: Overlay<'_>,
    ) {
        let window = self.ctx.window.clone();
        let raw_input = self.egui_state.take_egui_input(&window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| overlay(ctx));
        self.egui_state
            .handle_platform_output(&window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.ctx.device, &self.ctx.queue, *id, image_delta);
        }
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.ctx.config.width, self.ctx.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        self.egui_renderer.update_buffers(
            &self.ctx.device,
            &self.ctx.queue,
            encoder,
            &tris,
            &screen_descriptor,
        );
        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut render_pass, &tris, &screen_descriptor);
        }
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn mk_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && !self.disposed {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.surface.configure(&self.ctx.device, &self.ctx.config);
            self.depth_texture =
                Texture::create_depth_texture(&self.ctx.device, [width, height], "depth_texture");
        }
    }

    fn upload_geometry(&mut self, id: GeometryId, mesh: &MeshData) {
        let vertex_buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Index Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.geometries.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                num_elements: mesh.indices.len() as u32,
            },
        );
    }

    fn upload_material(&mut self, id: MaterialId, material: &Material) {
        let (buffer, bind_group) =
            mk_material_bind_group(&self.ctx.device, &self.material_layout, material);
        self.materials.insert(id, GpuMaterial { buffer, bind_group });
    }

    fn release_geometry(&mut self, id: GeometryId) {
        if let Some(mesh) = self.geometries.remove(&id) {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        if let Some(material) = self.materials.remove(&id) {
            material.buffer.destroy();
        }
    }

    fn set_lights(&mut self, rig: Option<&LightRig>) {
        let uniform: LightUniform = match rig {
            Some(rig) => rig.to_uniform(),
            None => bytemuck::Zeroable::zeroed(),
        };
        self.has_lights = rig.is_some();
        self.ctx
            .queue
            .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&[uniform]));
        self.shadows.invalidate();
    }

    fn draw(&mut self, frame: &Frame<'_>, overlay: Option<Overlay<'_>>) -> Result<(), RenderError> {
        if self.disposed || !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.ctx.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[frame.camera]),
        );
        self.write_instances(frame);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        if self.has_lights && self.shadows.needs_render(frame.scene_changed) {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            shadow_pass.set_pipeline(&self.shadow_pipeline);
            shadow_pass.set_bind_group(0, &self.light_bind_group, &[]);
            shadow_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (i, draw) in frame.draws.iter().enumerate() {
                let Some(mesh) = self.geometries.get(&draw.mesh.geometry) else {
                    continue;
                };
                shadow_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                shadow_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                shadow_pass.draw_indexed(0..mesh.num_elements, 0, i as u32..i as u32 + 1);
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.lit_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.light_bind_group, &[]);
            render_pass.set_bind_group(2, &self.shadow_bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (i, draw) in frame.draws.iter().enumerate() {
                let (Some(mesh), Some(material)) = (
                    self.geometries.get(&draw.mesh.geometry),
                    self.materials.get(&draw.mesh.material),
                ) else {
                    log::warn!("skipping draw of {:?}: resources not uploaded", draw.node);
                    continue;
                };
                render_pass.set_bind_group(3, &material.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_elements, 0, i as u32..i as u32 + 1);
            }
        }

        if let Some(overlay) = overlay {
            self.draw_overlay(&mut encoder, &view, overlay);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        self.ctx.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> bool {
        if self.disposed {
            return false;
        }
        self.egui_state
            .on_window_event(&self.ctx.window, event)
            .consumed
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for (_, mesh) in self.geometries.drain() {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
        for (_, material) in self.materials.drain() {
            material.buffer.destroy();
        }
        self.instance_buffer.destroy();
        self.has_lights = false;
        self.disposed = true;
        let _ = self.ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        log::info!("render context released");
    }
}
