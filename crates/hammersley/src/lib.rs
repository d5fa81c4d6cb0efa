//! Scrambled Hammersley point sets.
//!
//! Generates `replications` independent copies of an `N`-point, `D`-dimensional
//! Hammersley set. Dimension 0 is the plain fraction `i / N`; every other
//! dimension `j` is the radical inverse of `i` in the `j`-th prime base with its
//! digits passed through a random permutation. Each replication draws fresh
//! permutations from one seeded stream, so replications are decorrelated from
//! each other while each one keeps its low discrepancy.
//!
//! References:
//! - T. Kollig and A. Keller, "Efficient Bidirectional Path Tracing by
//!   Randomized Quasi-Monte Carlo Integration", MCQMC 2000.
//! - M. Pharr et al., "The Halton Sampler", Physically Based Rendering, 3rd ed.
//!
//! ## Layout
//!
//! The output is one flat `f32` array, replication-major, then sample-major,
//! with dimensions innermost:
//!
//! ```text
//! offset(rep, i, j) = rep * N * D + i * D + j
//! ```

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// Seed used when the caller has no reason to pick another one.
pub const DEFAULT_SEED: u64 = 12345;

/// Prime bases for the scrambled dimensions. Dimension `j >= 1` uses `PRIMES[j - 1]`.
pub const PRIMES: [u32; 100] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541,
];

/// Largest dimension count the prime table supports.
pub const MAX_DIMENSIONS: usize = PRIMES.len() + 1;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{requested} dimensions requested, at most {max} are supported")]
    TooManyDimensions { requested: usize, max: usize },

    #[error("dimension count must be positive")]
    ZeroDimensions,

    #[error("sample count must be positive")]
    ZeroSamples,

    #[error("replication count must be positive")]
    ZeroReplications,

    #[error("sample count {0} does not fit the 32-bit sample index")]
    TooManySamples(usize),

    #[error("{dimensions} x {samples} x {replications} values do not fit in memory")]
    TooManyValues {
        dimensions: usize,
        samples: usize,
        replications: usize,
    },

    #[error("output buffer holds {actual} values, {expected} required")]
    BufferSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Radical inverse of `num` in `base` with digits remapped through `perm`.
///
/// `perm` must be a permutation of `0..base`.
#[inline]
pub fn scrambled_radical_inverse(mut num: u32, base: u32, perm: &[u32]) -> f32 {
    debug_assert_eq!(perm.len(), base as usize);

    let inv_base = 1.0 / base as f32;
    let mut inv_base_pow = inv_base;
    let mut result = 0.0f32;

    while num > 0 {
        let digit = num % base;
        result += perm[digit as usize] as f32 * inv_base_pow;
        num /= base;
        inv_base_pow *= inv_base;
    }

    result
}

/// Unscrambled radical inverse (identity digit permutation).
pub fn radical_inverse(mut num: u32, base: u32) -> f32 {
    let inv_base = 1.0 / base as f32;
    let mut inv_base_pow = inv_base;
    let mut result = 0.0f32;

    while num > 0 {
        result += (num % base) as f32 * inv_base_pow;
        num /= base;
        inv_base_pow *= inv_base;
    }

    result
}

/// Requested shape of a point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammersleyParams {
    pub dimensions: usize,
    pub samples: usize,
    pub replications: usize,
    pub seed: u64,
}

impl HammersleyParams {
    pub fn new(dimensions: usize, samples: usize, replications: usize) -> Self {
        Self {
            dimensions,
            samples,
            replications,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject shapes the generator cannot produce.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::ZeroDimensions);
        }
        if self.dimensions > MAX_DIMENSIONS {
            return Err(Error::TooManyDimensions {
                requested: self.dimensions,
                max: MAX_DIMENSIONS,
            });
        }
        if self.samples == 0 {
            return Err(Error::ZeroSamples);
        }
        if self.samples > u32::MAX as usize {
            return Err(Error::TooManySamples(self.samples));
        }
        if self.replications == 0 {
            return Err(Error::ZeroReplications);
        }
        if self.checked_len().is_none() {
            return Err(Error::TooManyValues {
                dimensions: self.dimensions,
                samples: self.samples,
                replications: self.replications,
            });
        }
        Ok(())
    }

    /// Number of floats in the flat output, or `None` when the buffer could not
    /// be allocated.
    pub fn checked_len(&self) -> Option<usize> {
        self.dimensions
            .checked_mul(self.samples)
            .and_then(|n| n.checked_mul(self.replications))
            .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<f32>())
    }

    /// Number of floats in the flat output. Saturates for shapes that fail
    /// [`validate`](Self::validate).
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fill `out` with the scrambled point set described by `params`.
#[tracing::instrument(skip(out), fields(len = out.len()))]
pub fn generate_into(params: &HammersleyParams, out: &mut [f32]) -> Result<()> {
    params.validate()?;
    if out.len() != params.len() {
        return Err(Error::BufferSize {
            expected: params.len(),
            actual: out.len(),
        });
    }

    let dims = params.dimensions;
    let samples = params.samples;
    let block = samples * dims;

    // One stream for all replications: earlier blocks never depend on how many follow.
    let mut rng = StdRng::seed_from_u64(params.seed);

    for (rep, chunk) in out.chunks_exact_mut(block).enumerate() {
        let permutations: Vec<Vec<u32>> = PRIMES[..dims - 1]
            .iter()
            .map(|&base| {
                let mut perm: Vec<u32> = (0..base).collect();
                perm.shuffle(&mut rng);
                perm
            })
            .collect();

        for (i, point) in chunk.chunks_exact_mut(dims).enumerate() {
            point[0] = i as f32 / samples as f32;
            for j in 1..dims {
                point[j] = scrambled_radical_inverse(i as u32, PRIMES[j - 1], &permutations[j - 1]);
            }
        }

        tracing::trace!(rep, "replication scrambled");
    }

    Ok(())
}

/// Generate the flat point set for `params`.
pub fn generate(params: &HammersleyParams) -> Result<Vec<f32>> {
    params.validate()?;
    let mut out = vec![0.0f32; params.len()];
    generate_into(params, &mut out)?;
    Ok(out)
}

/// A generated point set together with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct HammersleySet {
    params: HammersleyParams,
    data: Vec<f32>,
}

impl HammersleySet {
    pub fn new(params: HammersleyParams) -> Result<Self> {
        let data = generate(&params)?;
        Ok(Self { params, data })
    }

    pub fn params(&self) -> &HammersleyParams {
        &self.params
    }

    /// Flat buffer in `rep, sample, dimension` order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// All dimensions of one sample of one replication.
    ///
    /// # Panics
    ///
    /// Panics if `rep >= replications` or `sample >= samples`.
    pub fn point(&self, rep: usize, sample: usize) -> &[f32] {
        let dims = self.params.dimensions;
        let start = (rep * self.params.samples + sample) * dims;
        &self.data[start..start + dims]
    }

    /// The `samples * dimensions` block of one replication.
    ///
    /// # Panics
    ///
    /// Panics if `rep >= replications`.
    pub fn replication(&self, rep: usize) -> &[f32] {
        let block = self.params.samples * self.params.dimensions;
        &self.data[rep * block..(rep + 1) * block]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radical_inverse_base2() {
        assert_eq!(radical_inverse(0, 2), 0.0);
        assert_eq!(radical_inverse(1, 2), 0.5);
        assert_eq!(radical_inverse(2, 2), 0.25);
        assert_eq!(radical_inverse(3, 2), 0.75);
        assert_eq!(radical_inverse(4, 2), 0.125);
    }

    #[test]
    fn test_identity_permutation_matches_plain() {
        let perm: Vec<u32> = (0..3).collect();
        for i in 0..50 {
            assert_eq!(scrambled_radical_inverse(i, 3, &perm), radical_inverse(i, 3));
        }
    }

    #[test]
    fn test_reversed_permutation() {
        // Base 2 with digits swapped: 1 -> 0b1 becomes digit 0, so value 0.
        let perm = [1u32, 0];
        assert_eq!(scrambled_radical_inverse(1, 2, &perm), 0.0);
        // 2 = 0b10 -> digits (0, 1) -> (1, 0) -> 0.5
        assert_eq!(scrambled_radical_inverse(2, 2, &perm), 0.5);
    }

    #[test]
    fn test_values_in_unit_interval() {
        let set = HammersleySet::new(HammersleyParams::new(8, 64, 3)).unwrap();
        assert!(set.as_slice().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_first_dimension_is_fraction() {
        let n = 16;
        let set = HammersleySet::new(HammersleyParams::new(4, n, 2)).unwrap();
        for rep in 0..2 {
            for i in 0..n {
                assert_eq!(set.point(rep, i)[0], i as f32 / n as f32);
            }
        }
    }

    #[test]
    fn test_single_digit_samples_use_distinct_digits() {
        // Index 0 has no digits and maps to 0 in every scrambled dimension;
        // indices 1..base map to perm[i] / base, all distinct.
        let set = HammersleySet::new(HammersleyParams::new(4, 7, 1)).unwrap();
        assert_eq!(set.point(0, 0)[1..], [0.0, 0.0, 0.0]);

        let mut digits: Vec<usize> = (1..5)
            .map(|i| (set.point(0, i)[3] * 5.0).round() as usize)
            .collect();
        digits.sort();
        digits.dedup();
        assert_eq!(digits.len(), 4);
        assert!(digits.iter().all(|&d| d < 5));
    }

    #[test]
    fn test_one_dimension_has_no_scrambling() {
        let out = generate(&HammersleyParams::new(1, 4, 1)).unwrap();
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            HammersleyParams::new(0, 4, 1).validate(),
            Err(Error::ZeroDimensions)
        );
        assert_eq!(HammersleyParams::new(2, 0, 1).validate(), Err(Error::ZeroSamples));
        assert_eq!(
            HammersleyParams::new(2, 4, 0).validate(),
            Err(Error::ZeroReplications)
        );
        assert!(HammersleyParams::new(MAX_DIMENSIONS, 4, 1).validate().is_ok());
        assert_eq!(
            HammersleyParams::new(MAX_DIMENSIONS + 1, 4, 1).validate(),
            Err(Error::TooManyDimensions {
                requested: MAX_DIMENSIONS + 1,
                max: MAX_DIMENSIONS
            })
        );
    }

    #[test]
    fn test_oversized_shape_rejected() {
        let params = HammersleyParams::new(2, 2, usize::MAX / 2 + 1);
        let expected = Err(Error::TooManyValues {
            dimensions: 2,
            samples: 2,
            replications: usize::MAX / 2 + 1,
        });
        assert_eq!(params.validate(), expected);
        assert_eq!(params.checked_len(), None);
        assert_eq!(params.len(), usize::MAX);
        assert_eq!(generate(&params).map(|_| ()), expected);

        let mut out = Vec::new();
        assert_eq!(generate_into(&params, &mut out), expected);

        // Representable product, but too large to allocate as f32.
        let params = HammersleyParams::new(4, 1 << 20, usize::MAX >> 22);
        assert!(matches!(params.validate(), Err(Error::TooManyValues { .. })));
    }

    #[test]
    #[should_panic]
    fn test_point_past_last_replication() {
        let set = HammersleySet::new(HammersleyParams::new(2, 4, 1)).unwrap();
        let _ = set.point(1, 0);
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let params = HammersleyParams::new(2, 4, 1);
        let mut out = vec![0.0; 7];
        assert_eq!(
            generate_into(&params, &mut out),
            Err(Error::BufferSize { expected: 8, actual: 7 })
        );
    }
}
