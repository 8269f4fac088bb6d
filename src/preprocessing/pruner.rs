//! Column pruning

use crate::config::DatasetConfig;
use crate::error::Result;
use polars::prelude::*;
use tracing::info;

/// Drops configured-out columns from a dataset and its configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnPruner;

impl ColumnPruner {
    pub fn new() -> Self {
        Self
    }

    /// Keep only the dataset columns configured with `drop = false`.
    ///
    /// Columns present in the dataset but absent from the configuration are
    /// dropped as well. Surviving columns keep their dataset order.
    pub fn prune(&self, dataset: &DataFrame, config: &DatasetConfig) -> Result<(DataFrame, DatasetConfig)> {
        let keep = config.kept_column_names();
        let all: Vec<String> = dataset
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let (kept, dropped): (Vec<String>, Vec<String>) =
            all.iter().cloned().partition(|name| keep.contains(name));

        info!(count = all.len(), columns = ?all, "All columns");
        info!(count = keep.len(), columns = ?keep, "Columns to keep");
        info!(count = dropped.len(), columns = ?dropped, "Columns to drop");

        let pruned = dataset.select(kept)?;

        let mut pruned_config = config.clone();
        pruned_config.columns.retain(|c| !c.drop);

        info!("Unused columns dropped successfully");
        Ok((pruned, pruned_config))
    }
}
