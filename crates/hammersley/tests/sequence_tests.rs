//! Determinism and layout of generated point sets.

use scrambled_hammersley::{generate, radical_inverse, HammersleyParams, HammersleySet, DEFAULT_SEED, PRIMES};

#[test]
fn test_identical_inputs_identical_output() {
    let params = HammersleyParams::new(5, 32, 4).with_seed(99);
    let a = generate(&params).unwrap();
    let b = generate(&params).unwrap();
    let a_bits: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
    let b_bits: Vec<u32> = b.iter().map(|v| v.to_bits()).collect();
    assert_eq!(a_bits, b_bits);
}

#[test]
fn test_more_replications_only_append() {
    let one = generate(&HammersleyParams::new(3, 4, 1)).unwrap();
    let two = generate(&HammersleyParams::new(3, 4, 2)).unwrap();
    assert_eq!(one.len(), 12);
    assert_eq!(two.len(), 24);
    assert_eq!(&two[..12], one.as_slice());

    let five = generate(&HammersleyParams::new(3, 4, 5)).unwrap();
    assert_eq!(&five[..24], two.as_slice());
}

#[test]
fn test_replications_are_scrambled_differently() {
    let set = HammersleySet::new(HammersleyParams::new(6, 64, 2)).unwrap();
    assert_ne!(set.replication(0), set.replication(1));
}

#[test]
fn test_seed_changes_scrambling() {
    let a = generate(&HammersleyParams::new(6, 64, 1).with_seed(DEFAULT_SEED)).unwrap();
    let b = generate(&HammersleyParams::new(6, 64, 1).with_seed(DEFAULT_SEED + 1)).unwrap();
    assert_ne!(a, b);
    // Dimension 0 is never scrambled.
    for i in 0..64 {
        assert_eq!(a[i * 6], b[i * 6]);
    }
}

#[test]
fn test_layout_is_rep_sample_dimension() {
    let (d, n, r) = (4, 8, 3);
    let set = HammersleySet::new(HammersleyParams::new(d, n, r)).unwrap();
    let flat = set.as_slice();
    for rep in 0..r {
        for i in 0..n {
            assert_eq!(set.point(rep, i), &flat[rep * n * d + i * d..rep * n * d + (i + 1) * d]);
            assert_eq!(flat[rep * n * d + i * d], i as f32 / n as f32);
        }
    }
}

#[test]
fn test_scrambled_values_are_permuted_radical_inverses() {
    // Recover the base-5 digit permutation from the single-digit samples, then
    // check every two-digit sample against perm[d0] / 5 + perm[d1] / 25.
    let base = PRIMES[2] as usize;
    let n = base * base;
    let set = HammersleySet::new(HammersleyParams::new(4, n, 1)).unwrap();
    let value = |i: usize| set.point(0, i)[3];

    let mut perm = vec![usize::MAX; base];
    for (i, p) in perm.iter_mut().enumerate().skip(1) {
        *p = (value(i) * base as f32).round() as usize;
    }
    let missing = (0..base).find(|d| !perm.contains(d)).unwrap();
    perm[0] = missing;

    for i in base..n {
        let expected = perm[i % base] as f32 / base as f32 + perm[i / base] as f32 / (base * base) as f32;
        assert!((value(i) - expected).abs() < 1e-6, "sample {i}");
    }
    assert_eq!(value(0), 0.0);
    assert_eq!(radical_inverse(1, PRIMES[2]), 1.0 / base as f32);
}
