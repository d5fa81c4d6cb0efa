//! Environment maps and their importance-sampling tables.
//!
//! An [`EnvMap`] is a row-major grid of linear RGBA texels, usually decoded
//! from an equirectangular HDR/EXR file. [`EnvMapSamplingData`] turns it into a
//! piecewise-constant 2D density plus the marginal (row) and conditional
//! (column given row) CDFs used for inverse-CDF sampling on the GPU.

mod sampling;

pub use sampling::{EnvMapSamplingData, EnvSample, SamplingError};

use std::path::Path;

use half::f16;

use crate::util::{Error, Result, Vec3, Vec4};

/// Linear-light relative luminance (Rec. 709 primaries).
#[inline]
pub fn luminance(rgb: Vec3) -> f32 {
    0.2126 * rgb.x + 0.7152 * rgb.y + 0.0722 * rgb.z
}

/// 2D grid of linear RGBA texels, row 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvMap {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl EnvMap {
    /// Wrap RGBA texels. `texels.len()` must equal `width * height`.
    pub fn from_rgba(width: u32, height: u32, texels: Vec<Vec4>) -> std::result::Result<Self, SamplingError> {
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(SamplingError::DimensionMismatch {
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self { width, height, texels })
    }

    /// Wrap RGB texels with alpha 1.
    pub fn from_rgb(width: u32, height: u32, texels: &[Vec3]) -> std::result::Result<Self, SamplingError> {
        Self::from_rgba(width, height, texels.iter().map(|c| c.extend(1.0)).collect())
    }

    /// Every texel set to `color`.
    pub fn constant(width: u32, height: u32, color: Vec3) -> Self {
        Self {
            width,
            height,
            texels: vec![color.extend(1.0); width as usize * height as usize],
        }
    }

    /// 1x1 white environment, used when none is configured.
    pub fn white() -> Self {
        Self::constant(1, 1, Vec3::ONE)
    }

    /// Decode an HDR/EXR (or any format `image` understands) into linear RGBA f32.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        use image::ImageReader;

        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let img = ImageReader::open(path)?.decode()?;
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let texels: Vec<Vec4> = rgba
            .as_raw()
            .chunks_exact(4)
            .map(|px| Vec4::new(px[0], px[1], px[2], px[3]))
            .collect();

        tracing::info!(width, height, "environment map decoded");
        Ok(Self::from_rgba(width, height, texels)?)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn into_texels(self) -> Vec<Vec4> {
        self.texels
    }

    /// Texel at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if `row >= height` or `col >= width`.
    #[inline]
    pub fn texel(&self, row: u32, col: u32) -> Vec4 {
        self.texels[row as usize * self.width as usize + col as usize]
    }

    /// Texels as half floats for an `Rgba16Float` texture.
    pub fn to_rgba16f(&self) -> Vec<f16> {
        self.texels
            .iter()
            .flat_map(|t| t.to_array())
            .map(f16::from_f32)
            .collect()
    }

    /// Texels as raw bytes for an `Rgba32Float` texture.
    pub fn texel_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}
