//! Model training
//!
//! Decision trees and the random forest built on them, SMOTE oversampling,
//! stratified splitting, evaluation metrics, and the pipeline tying them
//! together.

mod decision_tree;
mod metrics;
mod pipeline;
mod random_forest;
mod smote;
mod split;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use metrics::{ClassScores, ClassificationReport};
pub use pipeline::{train, ModelArtifact, TrainingConfig, TrainingOutcome, TrainingPipeline};
pub use random_forest::{MaxFeatures, RandomForest};
pub use smote::Smote;
pub use split::stratified_split;
