//! Model registry
//!
//! Maps every model identifier of a problem type to a constructor with its
//! fixed hyperparameters. The tables are checked against the identifier
//! enums at startup so a missing entry surfaces before any work is done.

use super::decision_tree::DecisionTree;
use super::engine::TrainedModel;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::{LinearRegression, LogisticRegression};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::config::ProblemType;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed shared by every model with a random component
pub const MODEL_RANDOM_STATE: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationModel {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
    DecisionTree,
    SupportVectorMachine,
    KNearestNeighbors,
    NaiveBayes,
}

impl ClassificationModel {
    pub const ALL: [ClassificationModel; 7] = [
        ClassificationModel::LogisticRegression,
        ClassificationModel::RandomForest,
        ClassificationModel::GradientBoosting,
        ClassificationModel::DecisionTree,
        ClassificationModel::SupportVectorMachine,
        ClassificationModel::KNearestNeighbors,
        ClassificationModel::NaiveBayes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationModel::LogisticRegression => "logistic_regression",
            ClassificationModel::RandomForest => "random_forest",
            ClassificationModel::GradientBoosting => "gradient_boosting",
            ClassificationModel::DecisionTree => "decision_tree",
            ClassificationModel::SupportVectorMachine => "support_vector_machine",
            ClassificationModel::KNearestNeighbors => "k_nearest_neighbors",
            ClassificationModel::NaiveBayes => "naive_bayes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionModel {
    LinearRegression,
}

impl RegressionModel {
    pub const ALL: [RegressionModel; 1] = [RegressionModel::LinearRegression];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegressionModel::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for ClassificationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RegressionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ModelFactory = fn() -> TrainedModel;

const CLASSIFIERS: [(ClassificationModel, ModelFactory); 7] = [
    (ClassificationModel::LogisticRegression, || {
        TrainedModel::LogisticRegression(LogisticRegression::new().with_max_iter(1000))
    }),
    (ClassificationModel::RandomForest, || {
        TrainedModel::RandomForest(
            RandomForest::new()
                .with_n_estimators(100)
                .with_random_state(MODEL_RANDOM_STATE),
        )
    }),
    (ClassificationModel::GradientBoosting, || {
        TrainedModel::GradientBoosting(
            GradientBoostingClassifier::new()
                .with_n_estimators(100)
                .with_random_state(MODEL_RANDOM_STATE),
        )
    }),
    (ClassificationModel::DecisionTree, || {
        TrainedModel::DecisionTree(DecisionTree::new_classifier().with_random_state(MODEL_RANDOM_STATE))
    }),
    (ClassificationModel::SupportVectorMachine, || {
        TrainedModel::SupportVectorMachine(SVMClassifier::new().with_random_state(MODEL_RANDOM_STATE))
    }),
    (ClassificationModel::KNearestNeighbors, || {
        TrainedModel::KNearestNeighbors(KNNClassifier::new(5))
    }),
    (ClassificationModel::NaiveBayes, || {
        TrainedModel::NaiveBayes(GaussianNaiveBayes::new())
    }),
];

const REGRESSORS: [(RegressionModel, ModelFactory); 1] = [(RegressionModel::LinearRegression, || {
    TrainedModel::LinearRegression(LinearRegression::new())
})];

/// A model ready to be fitted, with the identifier it is saved under
pub struct ModelEntry {
    pub name: &'static str,
    pub model: TrainedModel,
}

/// Fail if any model identifier lacks a constructor
pub fn validate() -> Result<()> {
    for id in ClassificationModel::ALL {
        if !CLASSIFIERS.iter().any(|(entry, _)| *entry == id) {
            return Err(PipelineError::ConfigError(format!(
                "classification model '{}' has no constructor",
                id
            )));
        }
    }
    for id in RegressionModel::ALL {
        if !REGRESSORS.iter().any(|(entry, _)| *entry == id) {
            return Err(PipelineError::ConfigError(format!(
                "regression model '{}' has no constructor",
                id
            )));
        }
    }
    Ok(())
}

/// Fresh, unfitted instances of every model of a problem type, in
/// identifier order
pub fn models_for(problem_type: ProblemType) -> Result<Vec<ModelEntry>> {
    match problem_type {
        ProblemType::Classification => Ok(ClassificationModel::ALL
            .iter()
            .filter_map(|id| {
                CLASSIFIERS
                    .iter()
                    .find(|(entry, _)| entry == id)
                    .map(|(_, build)| ModelEntry { name: id.as_str(), model: build() })
            })
            .collect()),
        ProblemType::Regression => Ok(RegressionModel::ALL
            .iter()
            .filter_map(|id| {
                REGRESSORS
                    .iter()
                    .find(|(entry, _)| entry == id)
                    .map(|(_, build)| ModelEntry { name: id.as_str(), model: build() })
            })
            .collect()),
        ProblemType::Unsupervised => Err(PipelineError::NotImplemented(
            "unsupervised training".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_complete() {
        assert!(validate().is_ok());
    }

    #[test]
    fn test_models_for_classification() {
        let models = models_for(ProblemType::Classification).unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec![
                "logistic_regression",
                "random_forest",
                "gradient_boosting",
                "decision_tree",
                "support_vector_machine",
                "k_nearest_neighbors",
                "naive_bayes"
            ]
        );
    }

    #[test]
    fn test_models_for_regression_and_unsupervised() {
        let models = models_for(ProblemType::Regression).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "linear_regression");

        assert!(matches!(
            models_for(ProblemType::Unsupervised),
            Err(PipelineError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_identifiers_serialize_snake_case() {
        let json = serde_json::to_string(&ClassificationModel::SupportVectorMachine).unwrap();
        assert_eq!(json, "\"support_vector_machine\"");
    }
}
