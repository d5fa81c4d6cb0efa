//! Importance-sampling tables for environment maps.
//!
//! References:
//! - M. Pharr and G. Humphreys, "Monte Carlo Rendering with Natural
//!   Illumination", UVA tech report, 2004.
//! - CS184 Project 3-2, Part 3: Environment Map Lights.

use thiserror::Error;

use super::{luminance, EnvMap};
use crate::util::approx_eq;

/// Tolerance on the sum of the 2D pdf and of each conditional pdf/CDF.
pub const PDF_TOLERANCE: f32 = 1.0e-3;

/// Tolerance on the marginal pdf sum and its CDF tail (sum of row sums).
pub const MARGINAL_TOLERANCE: f32 = 1.0e-2;

/// Reasons the sampling tables cannot be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("expected {expected} texels, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("texel ({row}, {col}) has invalid luminance {luminance}")]
    InvalidTexel { row: u32, col: u32, luminance: f32 },

    #[error("total luminance is zero")]
    ZeroLuminance,

    #[error("row {row} has zero density")]
    ZeroRowDensity { row: u32 },

    #[error("{what} sums to {sum}, expected 1 within {tolerance}")]
    Normalization {
        what: &'static str,
        sum: f32,
        tolerance: f32,
    },
}

/// A texel drawn from the environment distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvSample {
    pub row: u32,
    pub col: u32,
    /// `pdf(row, col)` of the discrete distribution.
    pub pdf: f32,
}

/// Piecewise-constant density over an environment map and its CDFs.
///
/// Built once per environment map and read-only afterwards.
/// - `pdf[row * W + col]` is the texel's share of total luminance.
/// - `marginal_cdf[row]` is `sum(p(r) for r <= row)` with `p(r)` the row sum.
/// - `conditional_cdf[row * W + col]` is the CDF of `p(col | row)` within that row.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvMapSamplingData {
    width: u32,
    height: u32,
    total_luminance: f64,
    pdf: Vec<f32>,
    marginal_pdf: Vec<f32>,
    marginal_cdf: Vec<f32>,
    conditional_cdf: Vec<f32>,
}

/// Prefix sum of a 1D pdf. The last element is the pdf's total.
fn cdf_1d(pdf: &[f32]) -> Vec<f32> {
    let mut acc = 0.0f64;
    pdf.iter()
        .map(|&p| {
            acc += p as f64;
            acc as f32
        })
        .collect()
}

fn check_sum(what: &'static str, sum: f32, tolerance: f32) -> Result<(), SamplingError> {
    if approx_eq(sum, 1.0, tolerance) {
        Ok(())
    } else {
        Err(SamplingError::Normalization { what, sum, tolerance })
    }
}

impl EnvMapSamplingData {
    /// Build the pdf and CDF tables for `env`.
    ///
    /// Fails on an empty image, an all-black image, a black row (it would be
    /// a zero divisor for its conditional pdf), and negative or non-finite
    /// texels. Nothing is ever divided by zero.
    #[tracing::instrument(skip_all, fields(width = env.width(), height = env.height()))]
    pub fn build(env: &EnvMap) -> Result<Self, SamplingError> {
        let width = env.width();
        let height = env.height();
        if width == 0 || height == 0 {
            return Err(SamplingError::EmptyImage { width, height });
        }
        let w = width as usize;
        let h = height as usize;

        let pdf = Self::build_pdf(env)?;
        let total_luminance = env
            .texels()
            .iter()
            .map(|t| luminance(t.truncate()) as f64)
            .sum::<f64>();

        let mut marginal_pdf = vec![0.0f32; h];
        let mut conditional_cdf = Vec::with_capacity(w * h);
        let mut conditional_pdf = vec![0.0f32; w];

        for (row, row_pdf) in pdf.chunks_exact(w).enumerate() {
            // p(row) = sum over columns of p(row, col)
            let row_sum = row_pdf.iter().map(|&p| p as f64).sum::<f64>() as f32;
            if row_sum <= 0.0 {
                return Err(SamplingError::ZeroRowDensity { row: row as u32 });
            }
            marginal_pdf[row] = row_sum;

            // p(col | row) = p(row, col) / p(row)
            for (c, &p) in conditional_pdf.iter_mut().zip(row_pdf) {
                *c = p / row_sum;
            }
            let cond_sum = conditional_pdf.iter().map(|&p| p as f64).sum::<f64>() as f32;
            check_sum("conditional pdf", cond_sum, PDF_TOLERANCE)?;

            let row_cdf = cdf_1d(&conditional_pdf);
            check_sum("conditional CDF", row_cdf[w - 1], PDF_TOLERANCE)?;
            conditional_cdf.extend_from_slice(&row_cdf);
        }

        let marginal_sum = marginal_pdf.iter().map(|&p| p as f64).sum::<f64>() as f32;
        check_sum("marginal pdf", marginal_sum, MARGINAL_TOLERANCE)?;

        let marginal_cdf = cdf_1d(&marginal_pdf);
        check_sum("marginal CDF", marginal_cdf[h - 1], MARGINAL_TOLERANCE)?;

        tracing::debug!(total_luminance, "environment sampling tables built");

        Ok(Self {
            width,
            height,
            total_luminance,
            pdf,
            marginal_pdf,
            marginal_cdf,
            conditional_cdf,
        })
    }

    /// Relative luminance of every texel, normalized to sum to 1.
    fn build_pdf(env: &EnvMap) -> Result<Vec<f32>, SamplingError> {
        let width = env.width();
        let mut pdf = Vec::with_capacity(env.texels().len());
        let mut sum = 0.0f64;

        for (i, texel) in env.texels().iter().enumerate() {
            let l = luminance(texel.truncate());
            if !l.is_finite() || l < 0.0 {
                return Err(SamplingError::InvalidTexel {
                    row: i as u32 / width,
                    col: i as u32 % width,
                    luminance: l,
                });
            }
            pdf.push(l);
            sum += l as f64;
        }

        if sum <= 0.0 {
            return Err(SamplingError::ZeroLuminance);
        }

        for p in &mut pdf {
            *p = (*p as f64 / sum) as f32;
        }

        let total = pdf.iter().map(|&p| p as f64).sum::<f64>() as f32;
        check_sum("pdf", total, PDF_TOLERANCE)?;

        Ok(pdf)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sum of texel luminance before normalization.
    pub fn total_luminance(&self) -> f64 {
        self.total_luminance
    }

    /// `W * H` densities, row-major.
    pub fn pdf(&self) -> &[f32] {
        &self.pdf
    }

    /// `p(row)` for every row.
    pub fn marginal_pdf(&self) -> &[f32] {
        &self.marginal_pdf
    }

    /// `H` entries, non-decreasing, last one close to 1.
    pub fn marginal_cdf(&self) -> &[f32] {
        &self.marginal_cdf
    }

    /// `W * H` entries; each row is the CDF of `p(col | row)`.
    pub fn conditional_cdf(&self) -> &[f32] {
        &self.conditional_cdf
    }

    /// Conditional CDF of one row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= height`.
    pub fn conditional_row(&self, row: u32) -> &[f32] {
        let w = self.width as usize;
        let start = row as usize * w;
        &self.conditional_cdf[start..start + w]
    }

    /// Probability of texel (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if `row >= height` or `col >= width`.
    #[inline]
    pub fn pdf_at(&self, row: u32, col: u32) -> f32 {
        self.pdf[row as usize * self.width as usize + col as usize]
    }

    /// Inverse-CDF sampling: pick a row from `u`, then a column from `v`.
    ///
    /// `u` and `v` are uniform in `[0, 1)`. Mirrors the GPU-side lookup: the
    /// first entry whose CDF exceeds the variate is chosen.
    pub fn sample(&self, u: f32, v: f32) -> EnvSample {
        let row = Self::search(&self.marginal_cdf, u);
        let col = Self::search(self.conditional_row(row), v);
        EnvSample {
            row,
            col,
            pdf: self.pdf_at(row, col),
        }
    }

    fn search(cdf: &[f32], x: f32) -> u32 {
        let idx = cdf.partition_point(|&c| c <= x);
        idx.min(cdf.len() - 1) as u32
    }

    pub fn pdf_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pdf)
    }

    pub fn marginal_cdf_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.marginal_cdf)
    }

    pub fn conditional_cdf_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.conditional_cdf)
    }
}
