//! Train / validation / test split of the sample budget.

use std::fmt;

/// Dataset partition; each is written to its own sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Train,
    Valid,
    Test,
}

impl Partition {
    /// Processing order.
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Valid, Partition::Test];

    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Valid => "valid",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Number of samples per partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSizes {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

impl PartitionSizes {
    /// `train = floor(n·tr)`, `valid = floor(n·(tr + vr)) - train`, and the
    /// remainder goes to test. Ratios outside `[0, 1]` are clamped so the
    /// counts always sum to `n`.
    pub fn split(num_samples: usize, train_ratio: f64, valid_ratio: f64) -> Self {
        let n = num_samples as f64;
        let train = floor_count(n * train_ratio, num_samples);
        let train_valid = floor_count(n * (train_ratio + valid_ratio), num_samples).max(train);
        Self {
            train,
            valid: train_valid - train,
            test: num_samples - train_valid,
        }
    }

    pub fn get(&self, partition: Partition) -> usize {
        match partition {
            Partition::Train => self.train,
            Partition::Valid => self.valid,
            Partition::Test => self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.valid + self.test
    }

    /// `(partition, count)` in processing order, including empty partitions.
    pub fn iter(&self) -> impl Iterator<Item = (Partition, usize)> + '_ {
        Partition::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

impl fmt::Display for PartitionSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "train={} valid={} test={}", self.train, self.valid, self.test)
    }
}

fn floor_count(value: f64, max: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value.floor() as usize).min(max)
    }
}
