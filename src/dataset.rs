//! Dataset loading
//!
//! Sample datasets live in `<samples_dir>/<name>/` with a `dataset.csv` and
//! a `config.json` describing its columns.

use crate::config::{DatasetConfig, SAMPLE_CONFIG_FILE_NAME, SAMPLE_DATASETS_PATH, SAMPLE_DATASET_FILE_NAME};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Reads datasets and their configuration from a samples folder
#[derive(Debug, Clone)]
pub struct DatasetReader {
    samples_dir: PathBuf,
}

impl Default for DatasetReader {
    fn default() -> Self {
        Self::new(SAMPLE_DATASETS_PATH)
    }
}

impl DatasetReader {
    pub fn new(samples_dir: impl Into<PathBuf>) -> Self {
        Self {
            samples_dir: samples_dir.into(),
        }
    }

    pub fn samples_dir(&self) -> &Path {
        &self.samples_dir
    }

    /// Names of the sample dataset folders, sorted
    pub fn list_sample_datasets(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.samples_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load `dataset.csv` and `config.json` of the named sample dataset
    pub fn read_dataset(&self, dataset_name: &str) -> Result<(DataFrame, DatasetConfig)> {
        self.read_dataset_inner(dataset_name).inspect_err(|e| {
            error!(dataset = dataset_name, error = %e, "Error while reading files for dataset");
        })
    }

    fn read_dataset_inner(&self, dataset_name: &str) -> Result<(DataFrame, DatasetConfig)> {
        let folder = self.samples_dir.join(dataset_name);
        if !folder.is_dir() {
            return Err(not_found(format!(
                "Folder for dataset '{}' not found",
                folder.display()
            )));
        }

        let dataset_path = folder.join(SAMPLE_DATASET_FILE_NAME);
        let config_path = folder.join(SAMPLE_CONFIG_FILE_NAME);
        if !dataset_path.is_file() {
            return Err(not_found(format!(
                "File '{}' not found in dataset folder '{}'",
                SAMPLE_DATASET_FILE_NAME, dataset_name
            )));
        }
        if !config_path.is_file() {
            return Err(not_found(format!(
                "File '{}' not found in dataset folder '{}'",
                SAMPLE_CONFIG_FILE_NAME, dataset_name
            )));
        }

        read_dataset_files(&dataset_path, &config_path)
    }
}

/// Load a dataset/config pair from explicit paths
pub fn read_dataset_files(
    dataset_path: impl AsRef<Path>,
    config_path: impl AsRef<Path>,
) -> Result<(DataFrame, DatasetConfig)> {
    let dataset_path = dataset_path.as_ref();
    let config_path = config_path.as_ref();

    let dataset = load_csv(dataset_path)?;
    info!(path = %dataset_path.display(), rows = dataset.height(), columns = dataset.width(), "Dataset file read successfully");

    let config = DatasetConfig::from_file(config_path)?;
    info!(path = %config_path.display(), "Dataset config file read successfully");

    check_header(&dataset, &config)?;
    Ok((dataset, config))
}

/// Read a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(not_found(format!("Dataset file '{}' not found", path.display())));
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Every non-dropped configured column must be present in the CSV header
pub fn check_header(dataset: &DataFrame, config: &DatasetConfig) -> Result<()> {
    let header: Vec<&str> = dataset.get_column_names().iter().map(|n| n.as_str()).collect();
    let missing: Vec<String> = config
        .kept_column_names()
        .into_iter()
        .filter(|name| !header.contains(&name.as_str()))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::ConfigError(format!(
            "configured columns missing from dataset '{}': {:?}",
            config.dataset_name, missing
        )));
    }
    Ok(())
}

fn not_found(message: String) -> PipelineError {
    PipelineError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = r#"{
        "dataset_name": "toy",
        "problem_type": "regression",
        "dataset_split_config": {"training": 0.8, "testing": 0.2},
        "columns": [
            {"name": "x", "type": "continuous", "drop": false},
            {"name": "note", "type": "str", "drop": true},
            {"name": "y", "type": "continuous", "drop": false, "target": true}
        ]
    }"#;

    fn write_sample(root: &Path, name: &str, csv: &str) {
        let folder = root.join(name);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(SAMPLE_DATASET_FILE_NAME), csv).unwrap();
        fs::write(folder.join(SAMPLE_CONFIG_FILE_NAME), CONFIG).unwrap();
    }

    #[test]
    fn test_list_sample_datasets_sorted() {
        let root = tempdir().unwrap();
        write_sample(root.path(), "zeta", "x,note,y\n1,a,2\n");
        write_sample(root.path(), "alpha", "x,note,y\n1,a,2\n");
        fs::write(root.path().join("README.txt"), "not a dataset").unwrap();

        let reader = DatasetReader::new(root.path());
        assert_eq!(reader.list_sample_datasets().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_read_dataset() {
        let root = tempdir().unwrap();
        write_sample(root.path(), "toy", "x,note,y\n1.0,a,2.0\n2.0,b,4.0\n");

        let (df, config) = DatasetReader::new(root.path()).read_dataset("toy").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(config.dataset_name, "toy");
    }

    #[test]
    fn test_missing_folder_is_io_error() {
        let root = tempdir().unwrap();
        let err = DatasetReader::new(root.path()).read_dataset("ghost").unwrap_err();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_header_must_contain_kept_columns() {
        let root = tempdir().unwrap();
        // "note" is dropped so it may be absent, "y" may not
        write_sample(root.path(), "toy", "x,z\n1.0,2.0\n");
        let err = DatasetReader::new(root.path()).read_dataset("toy").unwrap_err();
        assert!(err.is_config_error());
    }
}
