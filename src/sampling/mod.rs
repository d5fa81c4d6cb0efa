//! Sampling strategy selection and the cached QMC point set.
//!
//! With [`SamplingAlgorithm::QuasiMonteCarlo`] the renderer reads its random
//! numbers from a scrambled Hammersley buffer with one point per sample and
//! [`sample_dimensions`] values per point. [`QmcSequence`] owns that buffer and
//! regenerates it only when the sample count actually changes.

use std::fmt;
use std::str::FromStr;

use scrambled_hammersley::{HammersleyParams, HammersleySet};
use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// How the GPU draws its per-sample random numbers.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingAlgorithm {
    /// Pseudo-random path tracing
    #[default]
    #[serde(rename = "pt")]
    PathTracing = 0,
    /// Scrambled Hammersley points
    #[serde(rename = "qmc")]
    QuasiMonteCarlo = 1,
}

impl SamplingAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathTracing => "pt",
            Self::QuasiMonteCarlo => "qmc",
        }
    }
}

impl fmt::Display for SamplingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pt" => Ok(Self::PathTracing),
            "qmc" => Ok(Self::QuasiMonteCarlo),
            other => Err(Error::InvalidSettings(format!(
                "unknown sampling algorithm '{other}' (expected 'pt' or 'qmc')"
            ))),
        }
    }
}

/// Random numbers consumed per path: two for the pixel footprint, then three
/// per bounce.
#[inline]
pub const fn sample_dimensions(max_depth: u32) -> usize {
    (max_depth as usize).saturating_mul(3).saturating_add(2)
}

/// Hammersley buffer sized for the current samples-per-pixel setting.
#[derive(Debug, Clone)]
pub struct QmcSequence {
    set: HammersleySet,
}

impl QmcSequence {
    /// Generate `replications` scrambled copies of a `samples`-point set for
    /// paths up to `max_depth` bounces.
    pub fn new(max_depth: u32, samples: u32, replications: u32, seed: u64) -> Result<Self> {
        let params = HammersleyParams::new(sample_dimensions(max_depth), samples as usize, replications as usize)
            .with_seed(seed);
        Ok(Self {
            set: HammersleySet::new(params)?,
        })
    }

    /// Regenerate for a new sample count. Returns `true` if the buffer changed.
    pub fn set_samples(&mut self, samples: u32) -> Result<bool> {
        let params = *self.set.params();
        if params.samples == samples as usize {
            return Ok(false);
        }
        self.set = HammersleySet::new(HammersleyParams {
            samples: samples as usize,
            ..params
        })?;
        tracing::debug!(samples, len = self.set.as_slice().len(), "QMC sequence regenerated");
        Ok(true)
    }

    pub fn params(&self) -> &HammersleyParams {
        self.set.params()
    }

    pub fn samples(&self) -> u32 {
        self.set.params().samples as u32
    }

    pub fn dimensions(&self) -> usize {
        self.set.params().dimensions
    }

    pub fn set(&self) -> &HammersleySet {
        &self.set
    }

    pub fn as_slice(&self) -> &[f32] {
        self.set.as_slice()
    }

    /// Buffer contents for a storage-buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.set.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        assert_eq!(sample_dimensions(0), 2);
        assert_eq!(sample_dimensions(5), 17);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("pt".parse::<SamplingAlgorithm>().unwrap(), SamplingAlgorithm::PathTracing);
        assert_eq!("qmc".parse::<SamplingAlgorithm>().unwrap(), SamplingAlgorithm::QuasiMonteCarlo);
        assert!("mc".parse::<SamplingAlgorithm>().is_err());
        assert_eq!(SamplingAlgorithm::QuasiMonteCarlo.to_string(), "qmc");
        assert_eq!(serde_json::to_string(&SamplingAlgorithm::PathTracing).unwrap(), "\"pt\"");
    }

    #[test]
    fn test_set_samples_regenerates_on_change() {
        let mut seq = QmcSequence::new(1, 4, 2, 7).unwrap();
        assert_eq!(seq.dimensions(), 5);
        assert_eq!(seq.as_slice().len(), 2 * 4 * 5);

        assert!(!seq.set_samples(4).unwrap());
        assert!(seq.set_samples(8).unwrap());
        assert_eq!(seq.samples(), 8);
        assert_eq!(seq.as_slice().len(), 2 * 8 * 5);
        assert_eq!(seq.as_bytes().len(), 4 * 2 * 8 * 5);
        assert_eq!(seq.params().seed, 7);
    }

    #[test]
    fn test_zero_samples_rejected() {
        let mut seq = QmcSequence::new(1, 4, 1, 7).unwrap();
        assert!(matches!(seq.set_samples(0), Err(Error::Sequence(_))));
        assert_eq!(seq.samples(), 4);
    }

    #[test]
    fn test_too_deep_rejected() {
        // 2 + 3 * 40 = 122 dimensions exceeds the prime table.
        assert!(QmcSequence::new(40, 4, 1, 7).is_err());
    }

    #[test]
    fn test_oversized_buffer_rejected() {
        let err = QmcSequence::new(10, u32::MAX, u32::MAX, 7).unwrap_err();
        assert!(matches!(
            err,
            Error::Sequence(scrambled_hammersley::Error::TooManyValues { dimensions: 32, .. })
        ));
        assert_eq!(sample_dimensions(u32::MAX), 2 + 3 * u32::MAX as usize);
    }
}
