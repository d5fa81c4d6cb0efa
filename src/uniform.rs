//! Uniform block read by the ray-generation shader.

use bytemuck::{Pod, Zeroable};

use crate::sampling::SamplingAlgorithm;
use crate::settings::CameraSettings;
use crate::util::Mat4;

/// Per-frame parameters (144 bytes, std140-compatible).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RayTracingUniform {
    /// Camera space to world space
    pub inv_view: Mat4,
    /// Normalized device coordinates to camera space
    pub inv_projection: Mat4,
    pub samples_per_pixel: u32,
    /// Texture slot of the environment map, -1 for none
    pub env_map_texture_idx: i32,
    pub max_depth: u32,
    /// [`SamplingAlgorithm`] as u32
    pub algorithm: u32,
}

impl Default for RayTracingUniform {
    fn default() -> Self {
        Self {
            inv_view: Mat4::IDENTITY,
            inv_projection: Mat4::IDENTITY,
            samples_per_pixel: 1,
            env_map_texture_idx: -1,
            max_depth: 1,
            algorithm: SamplingAlgorithm::PathTracing as u32,
        }
    }
}

impl RayTracingUniform {
    /// Store the inverses of a view and projection matrix.
    pub fn set_camera(&mut self, view: &Mat4, projection: &Mat4) {
        self.inv_view = view.inverse();
        self.inv_projection = projection.inverse();
    }

    /// Right-handed look-at view and perspective projection for `camera`.
    pub fn set_camera_settings(&mut self, camera: &CameraSettings, aspect_ratio: f32) {
        let view = Mat4::look_at_rh(camera.position(), camera.look_at(), camera.up());
        let projection = Mat4::perspective_rh(camera.fov_y.to_radians(), aspect_ratio, camera.near, camera.far);
        self.set_camera(&view, &projection);
    }

    pub fn set_algorithm(&mut self, algorithm: SamplingAlgorithm) {
        self.algorithm = algorithm as u32;
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
