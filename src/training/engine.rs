//! Training engine implementation

use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::{LinearRegression, LogisticRegression};
use super::models::{ClassificationModelPerformance, Model, ModelPerformance, RegressionModelPerformance};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use super::registry::{self, ModelEntry};
use super::svm::SVMClassifier;
use crate::config::{DatasetConfig, ProblemType, MODELS_PERFORMANCE_FILE};
use crate::error::{PipelineError, Result};
use crate::preprocessing::statistics::is_numeric_dtype;
use crate::preprocessing::{DatasetSplits, EncodingConfig};
use crate::workspace::{read_binary, write_binary, WorkingDirectory};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, info_span};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    DecisionTree(DecisionTree),
    SupportVectorMachine(SVMClassifier),
    KNearestNeighbors(KNNClassifier),
    NaiveBayes(GaussianNaiveBayes),
    LinearRegression(LinearRegression),
}

impl TrainedModel {
    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::SupportVectorMachine(m) => m,
            TrainedModel::KNearestNeighbors(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::LinearRegression(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::SupportVectorMachine(m) => m,
            TrainedModel::KNearestNeighbors(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::LinearRegression(m) => m,
        }
    }

    /// Persist the model with bincode
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_binary(path, self)
    }

    /// Restore a model written by [`TrainedModel::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_binary(path)
    }
}

impl Model for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }
}

/// Predictors and target of one split
#[derive(Debug, Clone)]
pub struct PartitionedSplit {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

/// Model-ready view of the dataset splits
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// Original target values in label order; empty for regression
    pub class_labels: Vec<String>,
    pub training: PartitionedSplit,
    pub testing: PartitionedSplit,
    pub validation: Option<PartitionedSplit>,
}

/// Trains every registered model of the configured problem type and
/// evaluates it on the testing split
pub struct TrainEngine<'a> {
    workspace: &'a WorkingDirectory,
}

impl<'a> TrainEngine<'a> {
    pub fn new(workspace: &'a WorkingDirectory) -> Self {
        Self { workspace }
    }

    /// Train, persist and evaluate the models of `config.problem_type`.
    ///
    /// The first failing model aborts the run; the performance report is
    /// only written once every model has been evaluated.
    pub fn train(
        &self,
        splits: &DatasetSplits,
        config: &DatasetConfig,
        encodings: &[EncodingConfig],
    ) -> Result<Vec<ModelPerformance>> {
        let _span = info_span!("training", problem_type = %config.problem_type).entered();
        let problem_type = config.problem_type;
        if problem_type == ProblemType::Unsupervised {
            error!("Unsupervised training is not implemented");
            return Err(PipelineError::NotImplemented("unsupervised training".to_string()));
        }

        let data = prepare_training_data(splits, config, encodings)?;
        info!(
            target_column = %data.target_name,
            features = data.feature_names.len(),
            training_rows = data.training.x.nrows(),
            testing_rows = data.testing.x.nrows(),
            "Training data prepared"
        );

        let mut performances = Vec::new();
        for ModelEntry { name, mut model } in registry::models_for(problem_type)? {
            let performance = self
                .train_one(name, &mut model, &data, problem_type)
                .inspect_err(|e| error!(model = name, error = %e, "Model training failed"))?;
            performance.log_summary();
            performances.push(performance);
        }

        let path = self.workspace.write_json(MODELS_PERFORMANCE_FILE, &performances)?;
        info!(path = %path.display(), models = performances.len(), "Model performances saved");
        Ok(performances)
    }

    fn train_one(
        &self,
        name: &str,
        model: &mut TrainedModel,
        data: &TrainingData,
        problem_type: ProblemType,
    ) -> Result<ModelPerformance> {
        let _span = info_span!("model", model = name).entered();
        let start = Instant::now();
        model.fit(&data.training.x, &data.training.y)?;
        info!(elapsed_secs = start.elapsed().as_secs_f64(), "Model fitted");

        let path = self.workspace.model_artifact_path(problem_type, name)?;
        model.save(&path)?;
        debug!(path = %path.display(), "Model saved");

        let predictions = model.predict(&data.testing.x)?;
        let model_path = path.display().to_string();
        Ok(match problem_type {
            ProblemType::Regression => ModelPerformance::Regression(RegressionModelPerformance::compute(
                name,
                model_path,
                &data.testing.y,
                &predictions,
            )),
            _ => ModelPerformance::Classification(ClassificationModelPerformance::compute(
                name,
                model_path,
                &data.testing.y,
                &predictions,
            )),
        })
    }
}

/// Resolve the single target column as it is named after encoding
pub fn resolve_target_column(config: &DatasetConfig, encodings: &[EncodingConfig]) -> Result<String> {
    let targets = config.target_columns();
    let target = match targets.as_slice() {
        [target] => *target,
        [] => return Err(PipelineError::ConfigError("no target column configured".to_string())),
        many => {
            return Err(PipelineError::ConfigError(format!(
                "exactly one target column is supported, found {}",
                many.len()
            )))
        }
    };

    match encodings
        .iter()
        .find(|e| e.original_feature_name() == target.name)
    {
        Some(EncodingConfig::BinaryOnehot(binary)) => Ok(binary.renamed_feature_name.clone()),
        Some(EncodingConfig::MultiOnehot(_)) => Err(PipelineError::ConfigError(format!(
            "target column '{}' cannot be multi one-hot encoded",
            target.name
        ))),
        Some(EncodingConfig::Ordinal(_)) | None => Ok(target.name.clone()),
    }
}

/// Split every dataset split into predictors and target
pub fn prepare_training_data(
    splits: &DatasetSplits,
    config: &DatasetConfig,
    encodings: &[EncodingConfig],
) -> Result<TrainingData> {
    let target_name = resolve_target_column(config, encodings)?;
    if splits.training.column(&target_name).is_err() {
        return Err(PipelineError::FeatureNotFound(target_name));
    }

    let feature_names: Vec<String> = splits
        .training
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| *name != target_name)
        .collect();

    let class_labels = if config.problem_type == ProblemType::Classification {
        let mut labels = Vec::new();
        for (_, df) in splits.named() {
            labels.extend(target_strings(df, &target_name)?);
        }
        labels.sort();
        labels.dedup();
        labels
    } else {
        Vec::new()
    };

    let partition = |df: &DataFrame| -> Result<PartitionedSplit> {
        let x = columns_to_array2(df, &feature_names)?;
        let y = if class_labels.is_empty() {
            regression_target(df, &target_name)?
        } else {
            encode_labels(&target_strings(df, &target_name)?, &class_labels)
        };
        Ok(PartitionedSplit { x, y })
    };

    let training = partition(&splits.training)?;
    let testing = partition(&splits.testing)?;
    let validation = match &splits.validation {
        Some(df) => Some(partition(df)?),
        None => None,
    };

    Ok(TrainingData {
        training,
        testing,
        validation,
        feature_names,
        target_name,
        class_labels,
    })
}

fn target_strings(df: &DataFrame, target_name: &str) -> Result<Vec<String>> {
    let values = df.column(target_name)?.cast(&DataType::String)?;
    values
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string).ok_or_else(|| {
                PipelineError::DataError(format!("target column '{}' has missing values", target_name))
            })
        })
        .collect()
}

fn encode_labels(values: &[String], class_labels: &[String]) -> Array1<f64> {
    values
        .iter()
        .map(|v| class_labels.binary_search(v).unwrap_or(0) as f64)
        .collect()
}

fn regression_target(df: &DataFrame, target_name: &str) -> Result<Array1<f64>> {
    let column = df.column(target_name)?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(PipelineError::DataError(format!(
            "regression target '{}' is not numeric ({})",
            target_name,
            column.dtype()
        )));
    }
    column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!("target column '{}' has missing values", target_name))
            })
        })
        .collect()
}

/// Extract named columns into a row-major `Array2<f64>`. Numeric and boolean
/// columns are accepted; anything else is a data error naming the column.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?;
            let dtype = column.dtype();
            if !is_numeric_dtype(dtype) && *dtype != DataType::Boolean {
                return Err(PipelineError::DataError(format!(
                    "predictor '{}' is not numeric ({}); encode it or mark it as dropped",
                    col_name, dtype
                )));
            }
            column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        PipelineError::DataError(format!("predictor '{}' has missing values", col_name))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| col_data[j][i]))
}
