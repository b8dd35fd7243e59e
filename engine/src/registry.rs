//! The seven model pairs the service can dispatch to.

use crate::{
    error::AppError,
    estimators::{
        AdaBoostParams, BaggingParams, EstimatorParams, ForestParams, GradientBoostingParams,
        LogisticRegressionParams, SvmParams, TreeParams,
    },
    types::{ModelInfo, ReportedScores},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "logreg")]
    LogisticRegression,
    #[serde(rename = "xgboost")]
    XgBoost,
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "svm")]
    SupportVectorMachine,
    #[serde(rename = "ada")]
    AdaBoost,
    #[serde(rename = "bagging")]
    Bagging,
    #[serde(rename = "decision_tree")]
    DecisionTree,
}

impl ModelId {
    pub const ALL: [ModelId; 7] = [
        ModelId::LogisticRegression,
        ModelId::XgBoost,
        ModelId::RandomForest,
        ModelId::SupportVectorMachine,
        ModelId::AdaBoost,
        ModelId::Bagging,
        ModelId::DecisionTree,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "Logistic Regression",
            ModelId::XgBoost => "XGBoost Classifier",
            ModelId::RandomForest => "Random Forest Classifier",
            ModelId::SupportVectorMachine => "Support Vector Machine",
            ModelId::AdaBoost => "AdaBoost Classifier",
            ModelId::Bagging => "Bagging Classifier",
            ModelId::DecisionTree => "Decision Tree",
        }
    }

    /// Prefix of the model's artifact file names.
    pub fn key(&self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "logreg",
            ModelId::XgBoost => "xgboost",
            ModelId::RandomForest => "random_forest",
            ModelId::SupportVectorMachine => "svm",
            ModelId::AdaBoost => "ada",
            ModelId::Bagging => "bagging",
            ModelId::DecisionTree => "decision_tree",
        }
    }

    /// F1 scores published with the trained models.
    pub fn reported_f1(&self) -> ReportedScores {
        let (y1, y2) = match self {
            ModelId::LogisticRegression => (0.9856, 0.9759),
            ModelId::XgBoost => (1.0, 1.0),
            ModelId::RandomForest => (1.0, 1.0),
            ModelId::SupportVectorMachine => (1.0, 1.0),
            ModelId::AdaBoost => (1.0, 1.0),
            ModelId::Bagging => (0.9856, 0.9711),
            ModelId::DecisionTree => (1.0, 1.0),
        };
        ReportedScores { y1, y2 }
    }

    /// Fixed hyperparameters used when training this model.
    pub fn params(&self) -> EstimatorParams {
        match self {
            ModelId::LogisticRegression => {
                EstimatorParams::LogisticRegression(LogisticRegressionParams::default())
            }
            ModelId::XgBoost => EstimatorParams::GradientBoosting(GradientBoostingParams {
                n_estimators: 35,
                max_depth: 26,
                ..Default::default()
            }),
            ModelId::RandomForest => EstimatorParams::RandomForest(ForestParams {
                n_estimators: 35,
                max_depth: Some(26),
                seed: 10,
            }),
            ModelId::SupportVectorMachine => EstimatorParams::Svm(SvmParams {
                c: 100.0,
                gamma: 0.0001,
                ..Default::default()
            }),
            ModelId::AdaBoost => EstimatorParams::AdaBoost(AdaBoostParams {
                n_estimators: 180,
                learning_rate: 0.201,
                seed: 0,
            }),
            ModelId::Bagging => EstimatorParams::Bagging(BaggingParams {
                n_estimators: 50,
                seed: 42,
                base: ForestParams {
                    n_estimators: 100,
                    max_depth: None,
                    seed: 42,
                },
            }),
            ModelId::DecisionTree => EstimatorParams::DecisionTree(TreeParams {
                max_depth: Some(150),
                seed: 0,
                ..Default::default()
            }),
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.display_name().to_string(),
            key: self.key().to_string(),
            f1: self.reported_f1(),
        }
    }

    /// Resolve a display name ("Decision Tree") or artifact key ("decision_tree").
    pub fn resolve(name: &str) -> Result<Self, AppError> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.display_name() == name || id.key() == name)
            .ok_or_else(|| AppError::UnknownModel(name.to_string()))
    }
}

impl FromStr for ModelId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which of the two survey outcomes an estimator predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Y1,
    Y2,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Y1, Target::Y2];

    pub fn suffix(&self) -> &'static str {
        match self {
            Target::Y1 => "y1",
            Target::Y2 => "y2",
        }
    }

    /// Dataset column holding this target's label.
    pub fn column(&self) -> &'static str {
        match self {
            Target::Y1 => {
                "Would you feel comfortable discussing a mental health issue with your coworkers?"
            }
            Target::Y2 => {
                "Would you feel comfortable discussing a mental health issue with your direct supervisor(s)?"
            }
        }
    }
}
