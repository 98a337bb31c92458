//! The office lighting rig and its GPU representation.
//!
//! The rig is fixed: a dim ambient term, one shadow-casting sun, a
//! hemisphere sky/ground term and a handful of ceiling point lights. Only the
//! sun casts shadows and its orthographic frustum is sized to the room.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{camera::OPENGL_TO_WGPU_MATRIX, config::RoomConfig};

pub const MIN_POINT_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 6;
pub const MAX_SHADOW_MAP_SIZE: u32 = 2048;
pub const MAX_SHADOW_FAR: f32 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub colour: [f32; 3],
    pub intensity: f32,
}

/// Orthographic shadow frustum of the sun.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowCamera {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
    pub map_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub colour: [f32; 3],
    pub intensity: f32,
    pub shadow: ShadowCamera,
}

impl DirectionalLight {
    /// Direction the light travels in.
    pub fn direction(&self) -> Vector3<f32> {
        (self.target - self.position).normalize()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky: [f32; 3],
    pub ground: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Point3<f32>,
    pub colour: [f32; 3],
    pub intensity: f32,
    pub range: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    pub hemisphere: HemisphereLight,
    pub points: Vec<PointLight>,
}

impl LightRig {
    /// Standard rig for a room centred on the origin. Large rooms get six
    /// ceiling fixtures, small ones four.
    pub fn office(room: &RoomConfig) -> Self {
        let half_w = room.width / 2.0;
        let half_d = room.depth / 2.0;

        let position = Point3::new(half_w * 0.6, room.height + 9.0, half_d * 0.4);
        let target = Point3::new(0.0, 0.0, 0.0);
        let distance = (position - target).magnitude();
        let half_extent = half_w.hypot(half_d);
        let shadow = ShadowCamera {
            half_extent,
            near: 0.5,
            far: (distance + half_extent).min(MAX_SHADOW_FAR),
            map_size: MAX_SHADOW_MAP_SIZE,
        };

        let ceiling = room.height - 0.2;
        let (cols, rows) = if room.width * room.depth > 300.0 {
            (3, 2)
        } else {
            (2, 2)
        };
        let mut points = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = -half_w + room.width * (col as f32 + 0.5) / cols as f32;
                let z = -half_d + room.depth * (row as f32 + 0.5) / rows as f32;
                points.push(PointLight {
                    position: Point3::new(x, ceiling, z),
                    colour: [1.0, 0.95, 0.85],
                    intensity: 0.6,
                    range: half_w.max(half_d),
                });
            }
        }

        Self {
            ambient: AmbientLight {
                colour: [1.0, 1.0, 1.0],
                intensity: 0.15,
            },
            sun: DirectionalLight {
                position,
                target,
                colour: [1.0, 0.98, 0.92],
                intensity: 0.8,
                shadow,
            },
            hemisphere: HemisphereLight {
                sky: [0.85, 0.9, 1.0],
                ground: [0.35, 0.3, 0.25],
                intensity: 0.35,
            },
            points,
        }
    }

    /// Total number of lights in the rig.
    pub fn len(&self) -> usize {
        3 + self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn light_view_proj(&self) -> Matrix4<f32> {
        let sun = &self.sun;
        let e = sun.shadow.half_extent;
        let up = if sun.direction().y.abs() > 0.99 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let view = Matrix4::look_at_rh(sun.position, sun.target, up);
        let proj = cgmath::ortho(-e, e, -e, e, sun.shadow.near, sun.shadow.far);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }

    pub fn to_uniform(&self) -> LightUniform {
        let with = |rgb: [f32; 3], w: f32| [rgb[0], rgb[1], rgb[2], w];
        let mut points = [PointLightRaw::zeroed(); MAX_POINT_LIGHTS];
        for (raw, light) in points.iter_mut().zip(self.points.iter()) {
            *raw = PointLightRaw {
                position: light.position.to_vec().extend(light.range).into(),
                colour: with(light.colour, light.intensity),
            };
        }
        LightUniform {
            light_view_proj: self.light_view_proj().into(),
            ambient: with(self.ambient.colour, self.ambient.intensity),
            sun_direction: self.sun.direction().extend(0.0).into(),
            sun_colour: with(self.sun.colour, self.sun.intensity),
            sky_colour: with(self.hemisphere.sky, self.hemisphere.intensity),
            ground_colour: with(self.hemisphere.ground, 0.0),
            points,
            point_count: [self.points.len().min(MAX_POINT_LIGHTS) as u32, 0, 0, 0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    /// xyz position, w range.
    position: [f32; 4],
    /// rgb colour, w intensity.
    colour: [f32; 4],
}

impl PointLightRaw {
    fn zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

// Every member is a multiple of 16 bytes so the layout matches WGSL uniform rules.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    light_view_proj: [[f32; 4]; 4],
    ambient: [f32; 4],
    sun_direction: [f32; 4],
    sun_colour: [f32; 4],
    sky_colour: [f32; 4],
    ground_colour: [f32; 4],
    points: [PointLightRaw; MAX_POINT_LIGHTS],
    point_count: [u32; 4],
}

impl LightUniform {
    pub fn point_count(&self) -> u32 {
        self.point_count[0]
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Uniform Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
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
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("shadow_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_gets_six_fixtures() {
        let rig = LightRig::office(&RoomConfig::default());
        assert_eq!(rig.points.len(), 6);
        assert_eq!(rig.len(), 9);
    }

    #[test]
    fn small_room_gets_four_fixtures() {
        let room = RoomConfig {
            width: 8.0,
            depth: 10.0,
            ..Default::default()
        };
        let rig = LightRig::office(&room);
        assert_eq!(rig.points.len(), MIN_POINT_LIGHTS);
        assert_eq!(rig.to_uniform().point_count(), 4);
    }

    #[test]
    fn fixtures_hang_below_the_ceiling_inside_the_room() {
        let room = RoomConfig::default();
        let rig = LightRig::office(&room);
        for light in &rig.points {
            assert!(light.position.y < room.height);
            assert!(light.position.x.abs() < room.width / 2.0);
            assert!(light.position.z.abs() < room.depth / 2.0);
        }
    }

    #[test]
    fn shadow_frustum_is_bounded_and_covers_the_room() {
        let room = RoomConfig::default();
        let rig = LightRig::office(&room);
        let shadow = &rig.sun.shadow;
        assert!(shadow.far <= MAX_SHADOW_FAR);
        assert!(shadow.map_size <= MAX_SHADOW_MAP_SIZE);
        assert!(shadow.half_extent >= room.width / 2.0);
        assert!(shadow.half_extent >= room.depth / 2.0);
    }

    #[test]
    fn room_centre_projects_inside_shadow_clip_space() {
        let rig = LightRig::office(&RoomConfig::default());
        let clip = rig.light_view_proj() * cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn uniform_is_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
    }
}
