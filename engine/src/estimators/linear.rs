use super::{sigmoid, Classifier};
use crate::error::AppError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    /// Inverse L2 regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-6,
        }
    }
}

/// L2-regularised logistic regression fitted by Newton's method. The
/// intercept is not penalised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn fit(params: &LogisticRegressionParams, x: &[Vec<f64>], y: &[u8]) -> Result<Self, AppError> {
        let n = x.len();
        let d = x[0].len();
        let cols = d + 1;

        // design matrix with a trailing intercept column
        let design = DMatrix::from_fn(n, cols, |i, j| if j < d { x[i][j] } else { 1.0 });
        let targets = DVector::from_iterator(n, y.iter().map(|&label| f64::from(label)));
        let lambda = 1.0 / params.c;

        let mut penalty = DMatrix::<f64>::identity(cols, cols) * lambda;
        penalty[(d, d)] = 1e-10;

        let mut beta = DVector::<f64>::zeros(cols);
        let mut converged = false;

        for iteration in 0..params.max_iter {
            let probs = (&design * &beta).map(sigmoid);
            let gradient = design.transpose() * (&probs - &targets) + &penalty * &beta;

            let mut weighted = design.clone();
            for i in 0..n {
                let w = probs[i] * (1.0 - probs[i]);
                for j in 0..cols {
                    weighted[(i, j)] *= w;
                }
            }
            let hessian = design.transpose() * weighted + &penalty;

            let step = hessian
                .cholesky()
                .map(|chol| chol.solve(&gradient))
                .ok_or_else(|| {
                    AppError::Training("logistic regression Hessian is not positive definite".to_string())
                })?;

            beta -= &step;
            if step.norm() < params.tol {
                debug!("Logistic regression converged after {} iterations", iteration + 1);
                converged = true;
                break;
            }
        }

        if !converged {
            debug!(
                "Logistic regression stopped at max_iter={} before converging",
                params.max_iter
            );
        }

        Ok(Self {
            weights: beta.rows(0, d).iter().copied().collect(),
            intercept: beta[d],
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.weights.is_empty() {
            return Err("model has no weights".to_string());
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>();
        sigmoid(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::fixtures::{accuracy, separable};

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&LogisticRegressionParams::default(), &x, &y).expect("fit");
        assert!(accuracy(&model, &x, &y) >= 0.9);
        // x0 drives the label
        assert!(model.weights()[0] > 0.0);
    }

    #[test]
    fn test_stronger_penalty_shrinks_weights() {
        let (x, y) = separable();
        let loose = LogisticRegression::fit(&LogisticRegressionParams::default(), &x, &y).expect("fit");
        let tight = LogisticRegression::fit(
            &LogisticRegressionParams {
                c: 0.01,
                ..Default::default()
            },
            &x,
            &y,
        )
        .expect("fit");
        assert!(tight.weights()[0].abs() < loose.weights()[0].abs());
    }
}
