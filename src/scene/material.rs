//! PBR metallic-roughness material as seen by the closest-hit shader.

use bytemuck::{Pod, Zeroable};

use crate::util::{Vec3, Vec4};

/// Texture slot value meaning "no texture".
pub const NO_TEXTURE: i32 = -1;

/// How the alpha channel of the base color is interpreted.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque = 0,
    /// Fragments below `alpha_cutoff` are discarded.
    Mask = 1,
    Blend = 2,
}

impl AlphaMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Opaque),
            1 => Some(Self::Mask),
            2 => Some(Self::Blend),
            _ => None,
        }
    }
}

/// Material parameters (64 bytes, std430-compatible).
///
/// Field order is part of the GPU contract: the shader-side struct reads
/// these fields at the same offsets.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Material {
    /// Linear base color (rgb) and alpha (a)
    pub base_color: Vec4,
    /// Emitted radiance
    pub emissive: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_cutoff: f32,
    /// [`AlphaMode`] as u32
    pub alpha_mode: u32,
    /// Index into the texture table or [`NO_TEXTURE`]
    pub color_texture: i32,
    pub metallic_roughness_texture: i32,
    pub normal_texture: i32,
    pub emissive_texture: i32,
    pub _pad: u32,
}

impl Default for Material {
    /// Fully diffuse white.
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emissive: Vec3::ZERO,
            metallic: 0.0,
            roughness: 1.0,
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque as u32,
            color_texture: NO_TEXTURE,
            metallic_roughness_texture: NO_TEXTURE,
            normal_texture: NO_TEXTURE,
            emissive_texture: NO_TEXTURE,
            _pad: 0,
        }
    }
}

impl Material {
    /// Dielectric with the given roughness.
    pub fn dielectric(color: Vec3, roughness: f32) -> Self {
        Self {
            base_color: color.extend(1.0),
            roughness,
            ..Default::default()
        }
    }

    /// Metal with the given roughness.
    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self {
            base_color: color.extend(1.0),
            metallic: 1.0,
            roughness,
            ..Default::default()
        }
    }

    /// Pure emitter.
    pub fn emissive(radiance: Vec3) -> Self {
        Self {
            emissive: radiance,
            ..Default::default()
        }
    }

    pub fn with_color_texture(mut self, index: u32) -> Self {
        self.color_texture = index as i32;
        self
    }

    pub fn with_metallic_roughness_texture(mut self, index: u32) -> Self {
        self.metallic_roughness_texture = index as i32;
        self
    }

    pub fn with_normal_texture(mut self, index: u32) -> Self {
        self.normal_texture = index as i32;
        self
    }

    pub fn with_emissive_texture(mut self, index: u32) -> Self {
        self.emissive_texture = index as i32;
        self
    }

    pub fn with_alpha(mut self, mode: AlphaMode, cutoff: f32) -> Self {
        self.alpha_mode = mode as u32;
        self.alpha_cutoff = cutoff;
        self
    }

    pub fn alpha_mode(&self) -> Option<AlphaMode> {
        AlphaMode::from_u32(self.alpha_mode)
    }

    /// All four texture slots in declaration order.
    pub fn texture_slots(&self) -> [i32; 4] {
        [
            self.color_texture,
            self.metallic_roughness_texture,
            self.normal_texture,
            self.emissive_texture,
        ]
    }
}
