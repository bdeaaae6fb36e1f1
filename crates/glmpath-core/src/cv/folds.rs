// =============================================================================
// Fold Splitters
// =============================================================================
//
// A splitter turns a sample count into an ordered list of (train, test)
// index pairs. Folds are generated once per fit and shared read-only by
// every job.
//
// K-FOLD LAYOUT:
// --------------
// Samples are (optionally shuffled, then) cut into k contiguous blocks. The
// first n % k blocks get one extra sample, so block sizes differ by at most
// one. Block i is the test set of fold i; the training set is every other
// sample in ascending order.
//
// =============================================================================

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{GlmPathError, Result};

/// One train / test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Anything that can split `n_samples` rows into folds.
pub trait FoldSplitter: Send + Sync {
    fn split(&self, n_samples: usize) -> Result<Vec<Fold>>;
}

/// Plain k-fold cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    /// Number of folds.
    /// Default: 5
    pub n_splits: usize,

    /// Shuffle the rows before cutting them into blocks.
    /// Default: false
    pub shuffle: bool,

    /// Seed for the shuffle. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: false,
            seed: None,
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Self::default()
        }
    }

    pub fn with_shuffle(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }
}

impl FoldSplitter for KFold {
    fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(GlmPathError::InvalidValue(format!(
                "k-fold cross-validation needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n_samples {
            return Err(GlmPathError::InvalidValue(format!(
                "cannot make {} folds from {} samples",
                self.n_splits, n_samples
            )));
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = base + usize::from(i < extra);
            let test = order[start..start + size].to_vec();
            let mut in_test = vec![false; n_samples];
            for &t in &test {
                in_test[t] = true;
            }
            let train = (0..n_samples).filter(|&r| !in_test[r]).collect();
            folds.push(Fold { train, test });
            start += size;
        }
        Ok(folds)
    }
}

/// Caller-supplied (train, test) index pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitFolds {
    pub folds: Vec<Fold>,
}

impl ExplicitFolds {
    pub fn new(pairs: Vec<(Vec<usize>, Vec<usize>)>) -> Self {
        Self {
            folds: pairs
                .into_iter()
                .map(|(train, test)| Fold { train, test })
                .collect(),
        }
    }
}

impl FoldSplitter for ExplicitFolds {
    fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        for (i, fold) in self.folds.iter().enumerate() {
            validate_fold(i, fold, n_samples)?;
        }
        Ok(self.folds.clone())
    }
}

/// How the rows are split for cross-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CvSpec {
    KFold(KFold),
    Explicit(ExplicitFolds),
}

impl Default for CvSpec {
    fn default() -> Self {
        CvSpec::KFold(KFold::default())
    }
}

impl FoldSplitter for CvSpec {
    fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        match self {
            CvSpec::KFold(k) => k.split(n_samples),
            CvSpec::Explicit(e) => e.split(n_samples),
        }
    }
}

/// Indices in range, both sides non-empty, train and test disjoint.
pub fn validate_fold(index: usize, fold: &Fold, n_samples: usize) -> Result<()> {
    if fold.train.is_empty() || fold.test.is_empty() {
        return Err(GlmPathError::InvalidValue(format!(
            "fold {} has an empty train or test set",
            index
        )));
    }
    let mut side = vec![0u8; n_samples];
    for (mark, rows) in [(1u8, &fold.train), (2u8, &fold.test)] {
        for &r in rows {
            if r >= n_samples {
                return Err(GlmPathError::InvalidValue(format!(
                    "fold {} references row {} but there are only {} samples",
                    index, r, n_samples
                )));
            }
            if side[r] != 0 && side[r] != mark {
                return Err(GlmPathError::InvalidValue(format!(
                    "fold {} uses row {} for both training and testing",
                    index, r
                )));
            }
            side[r] = mark;
        }
    }
    Ok(())
}
