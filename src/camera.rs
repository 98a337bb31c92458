//! First-person camera, projection and the GPU uniform derived from both.
//!
//! Orientation is stored as yaw/pitch. Yaw turns around the world y axis and
//! pitch tilts the view up or down. Horizontal movement primitives only use
//! the yaw so that looking at the floor never slows the player down.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};

use crate::error::ViewerError;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const FIELD_OF_VIEW_DEG: f32 = 75.0;
pub const NEAR_PLANE: f32 = 0.1;
/// Upper bound for the far plane. Keeps depth precision and the shadow frustum tight.
pub const MAX_FAR_PLANE: f32 = 50.0;

const SAFE_FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2 - 0.0001;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }

    /// Viewing direction including pitch.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
    }

    /// Viewing direction projected onto the floor plane.
    pub fn forward_flat(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_yaw, 0.0, sin_yaw)
    }

    pub fn right_flat(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(-sin_yaw, 0.0, cos_yaw)
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.forward_flat() * distance;
    }

    pub fn move_right(&mut self, distance: f32) {
        self.position += self.right_flat() * distance;
    }

    /// Applies a pointer delta. Pitch stops just short of straight up or down.
    pub fn rotate(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw += Rad(dx * sensitivity);
        self.pitch -= Rad(dy * sensitivity);
        self.pitch = Rad(self.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(
        width: u32,
        height: u32,
        fovy: F,
        znear: f32,
        zfar: f32,
    ) -> Result<Self, ViewerError> {
        let fovy = fovy.into();
        if !(fovy.0 > 0.0 && fovy.0 < std::f32::consts::PI) {
            return Err(ViewerError::InvalidCamera(format!(
                "vertical field of view out of range: {:?}",
                fovy
            )));
        }
        if !(znear > 0.0 && zfar > znear && zfar <= MAX_FAR_PLANE) {
            return Err(ViewerError::InvalidCamera(format!(
                "clip planes must satisfy 0 < near < far <= {MAX_FAR_PLANE}, got near={znear} far={zfar}"
            )));
        }
        let mut projection = Self {
            aspect: 1.0,
            fovy,
            znear,
            zfar,
        };
        projection.resize(width, height);
        Ok(projection)
    }

    /// The viewer's standard lens: 75 degree vertical field of view.
    pub fn first_person(width: u32, height: u32) -> Result<Self, ViewerError> {
        Self::new(
            width,
            height,
            cgmath::Deg(FIELD_OF_VIEW_DEG),
            NEAR_PLANE,
            MAX_FAR_PLANE,
        )
    }

    /// Zero-sized surfaces (minimised windows) keep the previous aspect.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn znear(&self) -> f32 {
        self.znear
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Deg;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn yaw_minus_ninety_looks_down_negative_z() {
        let camera = Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0));
        let forward = camera.forward_flat();
        assert!(approx(forward.x, 0.0));
        assert!(approx(forward.z, -1.0));
        let right = camera.right_flat();
        assert!(approx(right.x, 1.0));
        assert!(approx(right.z, 0.0));
    }

    #[test]
    fn moving_ignores_pitch() {
        let mut camera = Camera::new((0.0, 1.6, 0.0), Deg(0.0), Deg(-60.0));
        camera.move_forward(2.0);
        assert!(approx(camera.position.x, 2.0));
        assert!(approx(camera.position.y, 1.6));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        camera.rotate(0.0, -100_000.0, 0.01);
        assert!(camera.pitch.0 < std::f32::consts::FRAC_PI_2);
        camera.rotate(0.0, 200_000.0, 0.01);
        assert!(camera.pitch.0 > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn first_person_lens() {
        let projection = Projection::first_person(1600, 900).unwrap();
        assert!(approx(projection.fovy().0, Deg(75.0f32).0.to_radians()));
        assert!(approx(projection.znear(), 0.1));
        assert!(projection.zfar() <= 50.0);
        assert!(approx(projection.aspect(), 16.0 / 9.0));
    }

    #[test]
    fn rejects_far_plane_beyond_cap() {
        let projection = Projection::new(800, 600, Deg(75.0), 0.1, 500.0);
        assert!(matches!(projection, Err(ViewerError::InvalidCamera(_))));
    }

    #[test]
    fn zero_size_keeps_aspect() {
        let mut projection = Projection::first_person(800, 400).unwrap();
        projection.resize(0, 0);
        assert!(approx(projection.aspect(), 2.0));
    }
}
