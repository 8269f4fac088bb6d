//! Training / testing / validation splitting
//!
//! The dataset is shuffled and cut into a training part and a remainder.
//! When a validation fraction is configured the remainder is shuffled again
//! and cut using the relative fraction `validation / (testing + validation)`.
//! Sizes follow the usual shuffle-split convention: the first cut keeps
//! `floor(training * n)` rows for training, the second sends
//! `ceil(relative * remainder)` rows to validation.

use crate::config::DatasetSplitConfig;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};

const ROUNDING_EPS: f64 = 1e-9;

/// The partitions produced by the splitter
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub training: DataFrame,
    pub testing: DataFrame,
    pub validation: Option<DataFrame>,
}

impl DatasetSplits {
    pub fn total_rows(&self) -> usize {
        self.training.height()
            + self.testing.height()
            + self.validation.as_ref().map_or(0, |v| v.height())
    }

    /// Splits paired with their snapshot names
    pub fn named(&self) -> Vec<(&'static str, &DataFrame)> {
        let mut named = vec![("training", &self.training), ("testing", &self.testing)];
        if let Some(validation) = &self.validation {
            named.push(("validation", validation));
        }
        named
    }
}

/// Row positions of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub training: Vec<usize>,
    pub testing: Vec<usize>,
    pub validation: Option<Vec<usize>>,
}

/// Partitions a dataset according to a [`DatasetSplitConfig`]
#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    config: DatasetSplitConfig,
}

impl DatasetSplitter {
    pub fn new(config: DatasetSplitConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, dataset: &DataFrame) -> Result<DatasetSplits> {
        let c = &self.config;
        info!(
            training = c.training * 100.0,
            testing = c.testing * 100.0,
            validation = c.validation * 100.0,
            random_seed = ?c.random_seed,
            "Split dataset with following configuration (%)"
        );

        let indices = self.split_indices(dataset.height()).inspect_err(|e| {
            error!(error = %e, "Error while splitting dataset");
        })?;

        let splits = DatasetSplits {
            training: take_rows(dataset, &indices.training)?,
            testing: take_rows(dataset, &indices.testing)?,
            validation: indices
                .validation
                .as_ref()
                .map(|rows| take_rows(dataset, rows))
                .transpose()?,
        };

        info!(
            training = splits.training.height(),
            testing = splits.testing.height(),
            validation = splits.validation.as_ref().map(|v| v.height()),
            "Original dataset split into datasets (rows)"
        );
        Ok(splits)
    }

    /// Compute the row partition for a dataset of `n_rows` rows
    pub fn split_indices(&self, n_rows: usize) -> Result<SplitIndices> {
        let c = &self.config;
        c.validate()?;

        let mut rng = match c.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let n_train = ((c.training * n_rows as f64) + ROUNDING_EPS).floor() as usize;
        let mut order: Vec<usize> = (0..n_rows).collect();
        order.shuffle(&mut rng);
        let remainder = order.split_off(n_train.min(n_rows));
        let training = order;

        let (testing, validation) = if c.has_validation() {
            let relative = c.validation / (c.testing + c.validation);
            let n_val = ((relative * remainder.len() as f64) - ROUNDING_EPS).ceil().max(0.0) as usize;

            // the second cut reuses the configured seed
            let mut rng = match c.random_seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let mut rest = remainder;
            rest.shuffle(&mut rng);
            let testing = rest.split_off(n_val.min(rest.len()));
            if rest.is_empty() {
                return Err(empty_split("validation", n_rows));
            }
            (testing, Some(rest))
        } else {
            (remainder, None)
        };

        if training.is_empty() {
            return Err(empty_split("training", n_rows));
        }
        if testing.is_empty() {
            return Err(empty_split("testing", n_rows));
        }

        Ok(SplitIndices {
            training,
            testing,
            validation,
        })
    }
}

fn empty_split(name: &str, n_rows: usize) -> PipelineError {
    PipelineError::DataError(format!(
        "{} split would be empty for a dataset of {} rows",
        name, n_rows
    ))
}

fn take_rows(dataset: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&r| r as IdxSize).collect());
    Ok(dataset.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sizes_for_hundred_rows() {
        let splitter = DatasetSplitter::new(DatasetSplitConfig::new(0.7, 0.2, 0.1).with_seed(42));
        let indices = splitter.split_indices(100).unwrap();
        assert_eq!(indices.training.len(), 70);
        assert_eq!(indices.testing.len(), 20);
        assert_eq!(indices.validation.as_ref().unwrap().len(), 10);
    }

    #[test]
    fn test_partitions_are_disjoint_and_exhaustive() {
        let splitter = DatasetSplitter::new(DatasetSplitConfig::new(0.6, 0.25, 0.15).with_seed(7));
        let indices = splitter.split_indices(37).unwrap();

        let mut seen = HashSet::new();
        let all = indices
            .training
            .iter()
            .chain(&indices.testing)
            .chain(indices.validation.iter().flatten());
        for row in all {
            assert!(seen.insert(*row), "row {} assigned twice", row);
        }
        assert_eq!(seen.len(), 37);
    }

    #[test]
    fn test_seed_makes_split_deterministic() {
        let config = DatasetSplitConfig::new(0.8, 0.2, 0.0).with_seed(3);
        let a = DatasetSplitter::new(config.clone()).split_indices(50).unwrap();
        let b = DatasetSplitter::new(config).split_indices(50).unwrap();
        assert_eq!(a, b);
        assert!(a.validation.is_none());
    }

    #[test]
    fn test_invalid_fractions_rejected_before_splitting() {
        let splitter = DatasetSplitter::new(DatasetSplitConfig::new(0.5, 0.2, 0.1));
        let err = splitter.split_indices(100).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSplitFractions { .. }));
    }

    #[test]
    fn test_split_keeps_schema() {
        let df = df!(
            "a" => (0..20).map(|i| i as f64).collect::<Vec<_>>(),
            "b" => (0..20).map(|i| i % 3).collect::<Vec<i32>>()
        )
        .unwrap();
        let splits = DatasetSplitter::new(DatasetSplitConfig::new(0.5, 0.25, 0.25).with_seed(1))
            .split(&df)
            .unwrap();

        assert_eq!(splits.total_rows(), 20);
        assert_eq!(splits.named().len(), 3);
        for (_, part) in splits.named() {
            assert_eq!(part.schema(), df.schema());
        }
    }

    #[test]
    fn test_tiny_dataset_fails_instead_of_empty_split() {
        let splitter = DatasetSplitter::new(DatasetSplitConfig::new(0.9, 0.1, 0.0).with_seed(1));
        assert!(splitter.split_indices(1).is_err());
    }
}
