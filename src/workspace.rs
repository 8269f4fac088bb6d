//! Per-run working directory
//!
//! Every run gets its own folder `<root>/<dataset>_<YYYYmmdd_HHMMSS>` holding
//! the intermediary snapshots, fitted scalers, fitted models and the JSON
//! reports. A folder is never reused: if the timestamped name is already
//! taken a numeric suffix is appended.

use crate::config::{
    ProblemType, ScalingMethod, INTERMEDIARY_DATASETS_FOLDER, MODELS_FOLDER, SCALERS_FOLDER,
    SUB_FOLDERS,
};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Handle to the folder every artifact of one run is written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create a fresh working directory for `dataset_name` under `root`
    pub fn create(root: impl AsRef<Path>, dataset_name: &str) -> Result<Self> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let base_name = format!("{}_{}", dataset_name, timestamp);
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        let mut path = root.join(&base_name);
        let mut suffix = 1;
        // create_dir fails on an existing folder, so a taken name moves to the next suffix
        loop {
            match fs::create_dir(&path) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    path = root.join(format!("{}_{}", base_name, suffix));
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(path = %path.display(), "Working directory created");

        for sub_folder in SUB_FOLDERS {
            fs::create_dir_all(path.join(sub_folder))?;
            debug!(sub_folder, "Sub directory created");
        }

        Ok(Self { path })
    }

    /// Wrap an existing folder, e.g. to reload artifacts of a finished run
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(PipelineError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("working directory '{}' not found", path.display()),
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn intermediary_datasets_path(&self) -> PathBuf {
        self.path.join(INTERMEDIARY_DATASETS_FOLDER)
    }

    pub fn scalers_path(&self) -> PathBuf {
        self.path.join(SCALERS_FOLDER)
    }

    /// `models/<problem_type>/`, created on demand
    pub fn models_path(&self, problem_type: ProblemType) -> Result<PathBuf> {
        let path = self.path.join(MODELS_FOLDER).join(problem_type.as_str());
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn scaler_artifact_path(&self, method: ScalingMethod) -> PathBuf {
        self.scalers_path().join(format!("{}.bin", method.as_str()))
    }

    pub fn model_artifact_path(&self, problem_type: ProblemType, model_name: &str) -> Result<PathBuf> {
        Ok(self.models_path(problem_type)?.join(format!("{}.bin", model_name)))
    }

    /// Write a CSV snapshot to `intermediary_datasets/[<sub_folder>/]<name>.csv`
    pub fn save_snapshot(
        &self,
        df: &DataFrame,
        name: &str,
        sub_folder: Option<&str>,
    ) -> Result<PathBuf> {
        let mut folder = self.intermediary_datasets_path();
        if let Some(sub_folder) = sub_folder {
            folder = folder.join(sub_folder);
        }
        fs::create_dir_all(&folder)?;

        let path = folder.join(format!("{}.csv", name));
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).finish(&mut df.clone())?;
        info!(path = %path.display(), rows = df.height(), "Intermediary dataset saved");
        Ok(path)
    }

    /// Write `value` as pretty JSON to `<working_dir>/<file_name>`
    pub fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path.join(file_name);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, value)?;
        Ok(path)
    }

    pub fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        read_json_file(self.path.join(file_name))
    }
}

/// Serialize `value` with bincode into `path`
pub fn write_binary<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)
        .map_err(|e| PipelineError::SerializationError(format!("Failed to serialize: {}", e)))?;
    fs::write(path.as_ref(), bytes)?;
    Ok(())
}

/// Restore a bincode artifact written by [`write_binary`]
pub fn read_binary<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let bytes = fs::read(path.as_ref())?;
    bincode::deserialize(&bytes)
        .map_err(|e| PipelineError::SerializationError(format!("Failed to deserialize: {}", e)))
}

pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_builds_sub_folders() {
        let root = tempdir().unwrap();
        let workspace = WorkingDirectory::create(root.path(), "iris").unwrap();

        assert!(workspace.path().starts_with(root.path()));
        let name = workspace.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("iris_"));
        for sub_folder in SUB_FOLDERS {
            assert!(workspace.path().join(sub_folder).is_dir());
        }
    }

    #[test]
    fn test_directory_never_reused() {
        let root = tempdir().unwrap();
        let first = WorkingDirectory::create(root.path(), "iris").unwrap();
        let second = WorkingDirectory::create(root.path(), "iris").unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_snapshot_and_json_roundtrip() {
        let root = tempdir().unwrap();
        let workspace = WorkingDirectory::create(root.path(), "toy").unwrap();

        let df = df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap();
        let path = workspace.save_snapshot(&df, "training", Some("dataset_splits")).unwrap();
        assert!(path.ends_with("intermediary_datasets/dataset_splits/training.csv"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("a,b"));

        let values = vec!["first".to_string(), "second".to_string()];
        workspace.write_json("list.json", &values).unwrap();
        let restored: Vec<String> = workspace.read_json("list.json").unwrap();
        assert_eq!(restored, values);
    }

    #[test]
    fn test_model_path_is_namespaced_by_problem_type() {
        let root = tempdir().unwrap();
        let workspace = WorkingDirectory::create(root.path(), "toy").unwrap();
        let path = workspace
            .model_artifact_path(ProblemType::Classification, "knn")
            .unwrap();
        assert!(path.ends_with("models/classification/knn.bin"));
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_open_missing_folder_fails() {
        let root = tempdir().unwrap();
        assert!(WorkingDirectory::open(root.path().join("nope")).is_err());
    }
}
