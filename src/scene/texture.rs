//! Texture table entries: texel data plus sampler state.

use crate::util::Vec4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Sampler state the GPU layer creates alongside the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

impl SamplerDesc {
    /// Equirectangular lookups wrap around in longitude and clamp at the poles.
    pub fn equirect() -> Self {
        Self {
            address_v: AddressMode::ClampToEdge,
            ..Default::default()
        }
    }
}

/// RGBA f32 image, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<Vec4>,
}

impl TextureImage {
    /// Expand 8-bit texels with `components` channels (1..=4) to RGBA f32.
    ///
    /// Missing color channels are zero; missing alpha is 1.
    pub fn from_u8(width: u32, height: u32, components: usize, data: &[u8]) -> Option<Self> {
        if !(1..=4).contains(&components) || data.len() != width as usize * height as usize * components {
            return None;
        }
        let texels = data
            .chunks_exact(components)
            .map(|px| {
                let mut rgba = [0.0, 0.0, 0.0, 1.0];
                for (dst, &src) in rgba.iter_mut().zip(px) {
                    *dst = src as f32 / 255.0;
                }
                Vec4::from_array(rgba)
            })
            .collect();
        Some(Self { width, height, texels })
    }

    pub fn texel_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

/// Image + sampler pair stored in the texture table.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub image: TextureImage,
    pub sampler: SamplerDesc,
}

impl Texture {
    pub fn new(image: TextureImage, sampler: SamplerDesc) -> Self {
        Self { image, sampler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_rgb() {
        let img = TextureImage::from_u8(2, 1, 3, &[255, 0, 0, 0, 255, 0]).unwrap();
        assert_eq!(img.texels, vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0)]);
        assert_eq!(img.texel_bytes().len(), 32);
    }

    #[test]
    fn test_from_u8_rejects_bad_size() {
        assert!(TextureImage::from_u8(2, 2, 3, &[0; 11]).is_none());
        assert!(TextureImage::from_u8(1, 1, 5, &[0; 5]).is_none());
    }

    #[test]
    fn test_equirect_sampler() {
        let s = SamplerDesc::equirect();
        assert_eq!(s.address_u, AddressMode::Repeat);
        assert_eq!(s.address_v, AddressMode::ClampToEdge);
        assert_eq!(s.mag_filter, Filter::Linear);
    }
}
