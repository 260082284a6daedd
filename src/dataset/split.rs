//! Deterministic train/validation splitting and sampling.

use crate::core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Train and held-out indices of a split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitIndices {
    /// Rows used for fitting
    pub train: Vec<usize>,
    /// Rows held out for evaluation
    pub test: Vec<usize>,
}

/// Stratified split: each class contributes `test_ratio` of its rows to the
/// held-out side, chosen by a seeded shuffle. A class with a single row stays
/// entirely on the training side.
pub fn stratified_split(labels: &[u8], test_ratio: f64, seed: u64) -> Result<SplitIndices> {
    if labels.is_empty() {
        return Err(Error::InvalidDataset("cannot split an empty dataset".into()));
    }
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "test ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let n_test = if members.len() < 2 {
            0
        } else {
            ((members.len() as f64 * test_ratio).round() as usize).clamp(1, members.len() - 1)
        };
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

/// Up to `cap` distinct indices from `0..len`, chosen by a seeded shuffle.
pub fn deterministic_sample(len: usize, cap: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    if cap < len {
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        indices.truncate(cap);
        indices.sort_unstable();
    }
    indices
}
