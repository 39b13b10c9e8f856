//! Numbered output paths.
//!
//! Sample files are numbered `1, 2, 3, ...` within a directory. The next free
//! number is found with an exponential probe followed by a binary search, so
//! a directory holding `n` contiguous files costs `O(log n)` existence checks.
//! The search assumes numbering is contiguous and that nobody else writes to
//! the directory while a run is in progress.

use std::path::PathBuf;

/// Smallest index `i >= 1` such that `exists(i)` is false, assuming
/// `exists` is true exactly on a prefix `1..=k`.
pub fn next_free_index_by<F>(mut exists: F) -> usize
where
    F: FnMut(usize) -> bool,
{
    let mut hi = 1usize;
    while exists(hi) {
        match hi.checked_mul(2) {
            Some(next) => hi = next,
            None => return usize::MAX,
        }
    }

    // Invariant: exists(lo) (or lo == 0) and !exists(hi).
    let mut lo = hi / 2;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if exists(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// [`next_free_index_by`] over the filesystem.
pub fn next_free_index<F>(pattern: F) -> usize
where
    F: Fn(usize) -> PathBuf,
{
    next_free_index_by(|i| pattern(i).exists())
}

/// `dir/<prefix><index>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedPattern {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl NumberedPattern {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_owned(),
            extension: extension.to_owned(),
        }
    }

    pub fn path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.{}", self.prefix, index, self.extension))
    }

    pub fn next_free(&self) -> usize {
        next_free_index(|i| self.path(i))
    }
}
