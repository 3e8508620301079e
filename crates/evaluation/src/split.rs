//! Deterministic stratified hold-out split
//!
//! Uses an LCG so the same seed yields the same split on every platform.

use crate::errors::{EvaluationError, Result};

/// Seeded source for the per-class shuffles of [`stratified_split`].
///
/// A 31-bit linear congruential sequence; the state depends only on the
/// seed, so a report rebuilt with the same seed holds out the same rows.
#[derive(Clone, Debug)]
pub struct ShuffleRng {
    state: u64,
}

impl ShuffleRng {
    const MULTIPLIER: u64 = 1_103_515_245;
    const INCREMENT: u64 = 12_345;
    const MASK: u64 = (1 << 31) - 1;

    pub fn new(seed: i64) -> Self {
        Self {
            state: seed.unsigned_abs() & Self::MASK,
        }
    }

    /// Next 31-bit value
    pub fn next_u31(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
            & Self::MASK;
        self.state
    }

    /// Index in `[0, bound)`; 0 for an empty range
    pub fn below(&mut self, bound: usize) -> usize {
        match bound {
            0 => 0,
            _ => (self.next_u31() % bound as u64) as usize,
        }
    }

    /// Fisher–Yates, back to front
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            items.swap(i, self.below(i + 1));
        }
    }
}

/// Row indices of the two folds, each ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `ceil(test_size · n)` rows, allocated to each class in proportion
/// to its frequency (largest remainder, ties to the lower class).
pub fn stratified_split(labels: &[u8], test_size: f64, seed: i64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(EvaluationError::InvalidSettings(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n = labels.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(EvaluationError::InvalidSettings(format!(
            "cannot hold out {n_test} of {n} rows"
        )));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        by_class[usize::from(label.min(1))].push(i);
    }

    // floor of each proportional quota, then hand out the rest by remainder
    let mut quota = [0usize; 2];
    let mut remainders = [(0.0f64, 0usize); 2];
    for class in 0..2 {
        let exact = n_test as f64 * by_class[class].len() as f64 / n as f64;
        quota[class] = exact.floor() as usize;
        remainders[class] = (exact - exact.floor(), class);
    }
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut left = n_test - quota.iter().sum::<usize>();
    for &(_, class) in &remainders {
        if left == 0 {
            break;
        }
        if quota[class] < by_class[class].len() {
            quota[class] += 1;
            left -= 1;
        }
    }

    let mut rng = ShuffleRng::new(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for class in 0..2 {
        let mut members = by_class[class].clone();
        rng.shuffle(&mut members);
        let (held_out, kept) = members.split_at(quota[class]);
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shuffle_depends_only_on_seed() {
        let shuffled = |seed| {
            let mut items: Vec<usize> = (0..50).collect();
            ShuffleRng::new(seed).shuffle(&mut items);
            items
        };
        assert_eq!(shuffled(42), shuffled(42));
        assert_eq!(shuffled(-42), shuffled(42));
        assert_ne!(shuffled(42), shuffled(43));

        let mut sorted = shuffled(7);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());

        let mut rng = ShuffleRng::new(1);
        assert!((0..1000).all(|_| rng.next_u31() < 1 << 31));
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn test_breast_cancer_sized_split() {
        // 357 benign, 212 malignant
        let labels: Vec<u8> = (0..569).map(|i| u8::from(i < 212)).collect();
        let split = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(split.test.len(), 114);
        assert_eq!(split.train.len(), 455);
        let positives = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(positives, 42);

        assert_eq!(split, stratified_split(&labels, 0.2, 42).unwrap());
        assert_ne!(split.test, stratified_split(&labels, 0.2, 7).unwrap().test);
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(stratified_split(&[0, 1, 0, 1], 0.0, 42).is_err());
        assert!(stratified_split(&[0, 1, 0, 1], 1.0, 42).is_err());
        assert!(stratified_split(&[0], 0.2, 42).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_partitions_rows(
            labels in proptest::collection::vec(0u8..2, 2..300),
            test_size in 0.05f64..0.5,
            seed in any::<i64>(),
        ) {
            let n = labels.len();
            let n_test = (test_size * n as f64).ceil() as usize;
            prop_assume!(n_test < n);

            let split = stratified_split(&labels, test_size, seed).unwrap();
            prop_assert_eq!(split.test.len(), n_test);

            let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());

            // each class share deviates from its quota by less than one row
            for class in 0..2u8 {
                let total = labels.iter().filter(|&&l| l == class).count() as f64;
                let held = split.test.iter().filter(|&&i| labels[i] == class).count() as f64;
                let exact = n_test as f64 * total / n as f64;
                prop_assert!((held - exact).abs() < 1.0 + 1e-9);
            }
        }
    }
}
