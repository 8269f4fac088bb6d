//! Model training module
//!
//! Trains the fixed model registry of a problem type on the training split
//! and evaluates every model on the testing split:
//! - Classification: logistic regression, random forest, gradient boosting,
//!   decision tree, support vector machine, k-nearest neighbors, naive Bayes
//! - Regression: linear regression
//!
//! All models are `ndarray` based and serialisable with `bincode`.

mod engine;
mod models;
pub mod registry;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod knn;
pub mod naive_bayes;
pub mod svm;

pub use engine::{
    columns_to_array2, prepare_training_data, resolve_target_column, PartitionedSplit, TrainEngine,
    TrainedModel, TrainingData,
};
pub use models::{
    accuracy, mean_absolute_error, mean_squared_error, r2_score, weighted_precision_recall_f1,
    ClassificationModelPerformance, Model, ModelPerformance, RegressionModelPerformance,
};
pub use registry::{models_for, ClassificationModel, ModelEntry, RegressionModel, MODEL_RANDOM_STATE};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::RandomForest;
pub use gradient_boosting::GradientBoostingClassifier;
pub use knn::KNNClassifier;
pub use naive_bayes::GaussianNaiveBayes;
pub use svm::SVMClassifier;
