use super::{sigmoid, Classifier};
use nalgebra::DMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmParams {
    pub c: f64,
    /// RBF kernel coefficient.
    pub gamma: f64,
    pub tol: f64,
    /// Consecutive sweeps without an update before stopping.
    pub max_passes: usize,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: 0.1,
            tol: 1e-3,
            max_passes: 10,
            max_iter: 200,
            seed: 0,
        }
    }
}

/// Soft-margin SVM with an RBF kernel, trained by simplified SMO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorMachine {
    support_vectors: Vec<Vec<f64>>,
    /// alpha_i * y_i for each support vector.
    coefs: Vec<f64>,
    bias: f64,
    gamma: f64,
    n_features: usize,
}

fn rbf(gamma: f64, a: &[f64], b: &[f64]) -> f64 {
    let dist: f64 = a.iter().zip(b).map(|(u, v)| (u - v) * (u - v)).sum();
    (-gamma * dist).exp()
}

impl SupportVectorMachine {
    pub fn fit(params: &SvmParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        let n = x.len();
        let n_features = x[0].len();
        let signs: Vec<f64> = y.iter().map(|&label| if label == 1 { 1.0 } else { -1.0 }).collect();

        if n < 2 || signs.iter().all(|&s| s == signs[0]) {
            return Self {
                support_vectors: Vec::new(),
                coefs: Vec::new(),
                bias: signs[0],
                gamma: params.gamma,
                n_features,
            };
        }

        let kernel = DMatrix::from_fn(n, n, |i, j| rbf(params.gamma, &x[i], &x[j]));
        let mut alphas = vec![0.0; n];
        let mut bias = 0.0;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let decision = |alphas: &[f64], bias: f64, i: usize| -> f64 {
            (0..n)
                .filter(|&k| alphas[k] > 0.0)
                .map(|k| alphas[k] * signs[k] * kernel[(k, i)])
                .sum::<f64>()
                + bias
        };

        let mut passes = 0;
        let mut sweeps = 0;
        while passes < params.max_passes && sweeps < params.max_iter {
            let mut changed = 0;

            for i in 0..n {
                let err_i = decision(&alphas, bias, i) - signs[i];
                let violates = (signs[i] * err_i < -params.tol && alphas[i] < params.c)
                    || (signs[i] * err_i > params.tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let err_j = decision(&alphas, bias, j) - signs[j];
                let (old_i, old_j) = (alphas[i], alphas[j]);

                let (low, high) = if signs[i] != signs[j] {
                    ((old_j - old_i).max(0.0), (params.c + old_j - old_i).min(params.c))
                } else {
                    ((old_i + old_j - params.c).max(0.0), (old_i + old_j).min(params.c))
                };
                if low >= high {
                    continue;
                }

                let eta = 2.0 * kernel[(i, j)] - kernel[(i, i)] - kernel[(j, j)];
                if eta >= 0.0 {
                    continue;
                }

                let new_j = (old_j - signs[j] * (err_i - err_j) / eta).clamp(low, high);
                if (new_j - old_j).abs() < 1e-5 {
                    continue;
                }
                let new_i = old_i + signs[i] * signs[j] * (old_j - new_j);
                alphas[i] = new_i;
                alphas[j] = new_j;

                let di = signs[i] * (new_i - old_i);
                let dj = signs[j] * (new_j - old_j);
                let b1 = bias - err_i - di * kernel[(i, i)] - dj * kernel[(i, j)];
                let b2 = bias - err_j - di * kernel[(i, j)] - dj * kernel[(j, j)];
                bias = if new_i > 0.0 && new_i < params.c {
                    b1
                } else if new_j > 0.0 && new_j < params.c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                changed += 1;
            }

            passes = if changed == 0 { passes + 1 } else { 0 };
            sweeps += 1;
        }

        let (support_vectors, coefs): (Vec<Vec<f64>>, Vec<f64>) = (0..n)
            .filter(|&i| alphas[i] > 0.0)
            .map(|i| (x[i].clone(), alphas[i] * signs[i]))
            .unzip();
        debug!(
            "SMO finished after {} sweeps with {} support vectors",
            sweeps,
            support_vectors.len()
        );

        Self {
            support_vectors,
            coefs,
            bias,
            gamma: params.gamma,
            n_features,
        }
    }

    pub fn decision_function(&self, row: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.coefs)
            .map(|(sv, coef)| coef * rbf(self.gamma, sv, row))
            .sum::<f64>()
            + self.bias
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.coefs.len() != self.support_vectors.len() {
            return Err(format!(
                "{} coefficients for {} support vectors",
                self.coefs.len(),
                self.support_vectors.len()
            ));
        }
        if let Some(sv) = self.support_vectors.iter().find(|sv| sv.len() != self.n_features) {
            return Err(format!(
                "support vector has {} features, expected {}",
                sv.len(),
                self.n_features
            ));
        }
        Ok(())
    }
}

impl Classifier for SupportVectorMachine {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision_function(row))
    }
}
