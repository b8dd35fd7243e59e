//! Binary classifiers behind the model registry.
//!
//! Every estimator predicts the probability of class 1 for one feature row.
//! Training labels are reduced to "class 1 vs. rest" before fitting, which is
//! the only distinction the predictions are read with.

mod adaboost;
mod bagging;
mod boosting;
mod forest;
mod linear;
mod svm;
mod tree;

pub use adaboost::{AdaBoost, AdaBoostParams};
pub use bagging::{Bagging, BaggingParams};
pub use boosting::{GradientBoosting, GradientBoostingParams};
pub use forest::{ForestParams, RandomForest};
pub use linear::{LogisticRegression, LogisticRegressionParams};
pub use svm::{SupportVectorMachine, SvmParams};
pub use tree::{DecisionTree, MaxFeatures, TreeParams};

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub trait Classifier {
    /// Row length the estimator was fitted on.
    fn n_features(&self) -> usize;

    /// Probability (or monotone score in [0, 1]) of class 1.
    fn predict_proba(&self, row: &[f64]) -> f64;

    fn predict(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_proba(row) > 0.5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EstimatorParams {
    LogisticRegression(LogisticRegressionParams),
    GradientBoosting(GradientBoostingParams),
    RandomForest(ForestParams),
    Svm(SvmParams),
    AdaBoost(AdaBoostParams),
    Bagging(BaggingParams),
    DecisionTree(TreeParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    GradientBoosting(GradientBoosting),
    RandomForest(RandomForest),
    Svm(SupportVectorMachine),
    AdaBoost(AdaBoost),
    Bagging(Bagging),
    DecisionTree(DecisionTree),
}

impl Estimator {
    pub fn fit(params: &EstimatorParams, x: &[Vec<f64>], y: &[u8]) -> Result<Self, AppError> {
        validate_training_data(x, y)?;

        let estimator = match params {
            EstimatorParams::LogisticRegression(p) => {
                Estimator::LogisticRegression(LogisticRegression::fit(p, x, y)?)
            }
            EstimatorParams::GradientBoosting(p) => {
                Estimator::GradientBoosting(GradientBoosting::fit(p, x, y))
            }
            EstimatorParams::RandomForest(p) => Estimator::RandomForest(RandomForest::fit(p, x, y)),
            EstimatorParams::Svm(p) => Estimator::Svm(SupportVectorMachine::fit(p, x, y)),
            EstimatorParams::AdaBoost(p) => Estimator::AdaBoost(AdaBoost::fit(p, x, y)),
            EstimatorParams::Bagging(p) => Estimator::Bagging(Bagging::fit(p, x, y)),
            EstimatorParams::DecisionTree(p) => Estimator::DecisionTree(DecisionTree::fit(p, x, y)),
        };

        debug!("Fitted {} on {} rows", estimator.kind(), x.len());
        Ok(estimator)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression(_) => "logistic_regression",
            Estimator::GradientBoosting(_) => "gradient_boosting",
            Estimator::RandomForest(_) => "random_forest",
            Estimator::Svm(_) => "svm",
            Estimator::AdaBoost(_) => "adaboost",
            Estimator::Bagging(_) => "bagging",
            Estimator::DecisionTree(_) => "decision_tree",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::Svm(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::Bagging(m) => m,
            Estimator::DecisionTree(m) => m,
        }
    }

    /// Structural consistency of a deserialized model: every tree index and
    /// support vector must fit the declared feature count.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Estimator::LogisticRegression(m) => m.validate(),
            Estimator::GradientBoosting(m) => m.validate(),
            Estimator::RandomForest(m) => m.validate(),
            Estimator::Svm(m) => m.validate(),
            Estimator::AdaBoost(m) => m.validate(),
            Estimator::Bagging(m) => m.validate(),
            Estimator::DecisionTree(m) => m.validate(),
        }
    }

    /// Classify one row, rejecting rows of the wrong length.
    pub fn classify(&self, row: &[f64]) -> Result<u8, AppError> {
        if row.len() != self.n_features() {
            return Err(AppError::ShapeMismatch(format!(
                "{} expects {} features, got {}",
                self.kind(),
                self.n_features(),
                row.len()
            )));
        }
        Ok(self.predict(row))
    }
}

impl Classifier for Estimator {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        self.inner().predict_proba(row)
    }

    fn predict(&self, row: &[f64]) -> u8 {
        self.inner().predict(row)
    }
}

fn validate_training_data(x: &[Vec<f64>], y: &[u8]) -> Result<(), AppError> {
    if x.is_empty() {
        return Err(AppError::Training("no training rows".to_string()));
    }
    if x.len() != y.len() {
        return Err(AppError::Training(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(AppError::Training("rows have inconsistent width".to_string()));
    }
    if x.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AppError::Training("non-finite feature value".to_string()));
    }
    if y.iter().any(|&label| label > 1) {
        return Err(AppError::Training("labels must be 0 or 1".to_string()));
    }
    Ok(())
}

#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Forty rows where class 1 is exactly `x0 >= 5`; x1 and x2 are noise.
    pub fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let x0 = i as f64 * 0.25;
            x.push(vec![x0, ((i * 7) % 5) as f64, ((i * 3) % 4) as f64]);
            y.push(u8::from(x0 >= 5.0));
        }
        (x, y)
    }

    pub fn accuracy(model: &dyn super::Classifier, x: &[Vec<f64>], y: &[u8]) -> f64 {
        let correct = x
            .iter()
            .zip(y)
            .filter(|(row, &label)| model.predict(row) == label)
            .count();
        correct as f64 / y.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_rejects_bad_data() {
        let params = EstimatorParams::DecisionTree(TreeParams::default());
        assert!(Estimator::fit(&params, &[], &[]).is_err());
        assert!(Estimator::fit(&params, &[vec![1.0], vec![2.0]], &[0]).is_err());
        assert!(Estimator::fit(&params, &[vec![1.0], vec![2.0, 3.0]], &[0, 1]).is_err());
        assert!(Estimator::fit(&params, &[vec![1.0], vec![2.0]], &[0, 2]).is_err());
        assert!(Estimator::fit(&params, &[vec![f64::NAN], vec![2.0]], &[0, 1]).is_err());
    }

    #[test]
    fn test_classify_checks_shape() {
        let (x, y) = fixtures::separable();
        let params = EstimatorParams::DecisionTree(TreeParams::default());
        let model = Estimator::fit(&params, &x, &y).expect("fit");

        assert_eq!(model.classify(&[9.0, 0.0, 0.0]).unwrap(), 1);
        let err = model.classify(&[9.0, 0.0]).unwrap_err();
        assert!(matches!(err, AppError::ShapeMismatch(_)));
    }

    #[test]
    fn test_estimator_survives_json_and_bincode() {
        let (x, y) = fixtures::separable();
        let params = EstimatorParams::AdaBoost(AdaBoostParams {
            n_estimators: 10,
            ..Default::default()
        });
        let model = Estimator::fit(&params, &x, &y).expect("fit");

        let from_json: Estimator =
            serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        let from_bin: Estimator = bincode::deserialize(&bincode::serialize(&model).unwrap()).unwrap();
        for row in &x {
            assert_eq!(from_json.predict(row), model.predict(row));
            assert_eq!(from_bin.predict(row), model.predict(row));
        }
    }
}
