use super::{
    tree::{grow_classifier, MaxFeatures, Tree, TreeParams},
    Classifier,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            seed: 0,
        }
    }
}

/// Discrete AdaBoost (SAMME, two classes) over depth-1 trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoost {
    stumps: Vec<(Tree, f64)>,
    n_features: usize,
}

impl AdaBoost {
    pub fn fit(params: &AdaBoostParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        let n = x.len();
        let mut weights = vec![1.0 / n as f64; n];
        let mut rng = StdRng::seed_from_u64(params.seed);
        let stump_params = TreeParams {
            max_depth: Some(1),
            max_features: MaxFeatures::All,
            ..Default::default()
        };
        let mut stumps: Vec<(Tree, f64)> = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let stump = grow_classifier(x, y, &weights, &stump_params, &mut rng);
            let missed: Vec<bool> = x
                .iter()
                .zip(y)
                .map(|(row, &label)| u8::from(stump.leaf_value(row) > 0.5) != label)
                .collect();

            let total: f64 = weights.iter().sum();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, &m)| m)
                .map(|(w, _)| w)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                stumps.push((stump, 1.0));
                debug!("AdaBoost stopped at round {}: perfect stump", round);
                break;
            }
            if error >= 0.5 {
                if stumps.is_empty() {
                    stumps.push((stump, 1.0));
                }
                debug!("AdaBoost stopped at round {}: error {:.3}", round, error);
                break;
            }

            let alpha = params.learning_rate * ((1.0 - error) / error).ln();
            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= total);

            stumps.push((stump, alpha));
        }

        Self {
            stumps,
            n_features: x[0].len(),
        }
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.stumps.is_empty() {
            return Err("ensemble has no stumps".to_string());
        }
        self.stumps
            .iter()
            .try_for_each(|(stump, _)| stump.validate(self.n_features))
    }

    /// Weighted vote in [-1, 1]; positive means class 1.
    fn vote(&self, row: &[f64]) -> f64 {
        let (score, norm) = self
            .stumps
            .iter()
            .fold((0.0, 0.0), |(score, norm), (stump, alpha)| {
                let sign = if stump.leaf_value(row) > 0.5 { 1.0 } else { -1.0 };
                (score + alpha * sign, norm + alpha)
            });
        if norm > 0.0 {
            score / norm
        } else {
            0.0
        }
    }
}

impl Classifier for AdaBoost {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        (self.vote(row) + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::fixtures::{accuracy, separable};

    #[test]
    fn test_perfect_stump_stops_early() {
        let (x, y) = separable();
        let model = AdaBoost::fit(&AdaBoostParams::default(), &x, &y);
        assert_eq!(model.n_stumps(), 1);
        assert_eq!(accuracy(&model, &x, &y), 1.0);
    }

    #[test]
    fn test_boosting_combines_stumps() {
        // class 1 inside a band on x0: no single stump separates it
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y: Vec<u8> = (0..30).map(|i| u8::from((10..20).contains(&i))).collect();
        let model = AdaBoost::fit(
            &AdaBoostParams {
                n_estimators: 40,
                learning_rate: 1.0,
                seed: 0,
            },
            &x,
            &y,
        );
        assert!(model.n_stumps() > 1);
        assert!(accuracy(&model, &x, &y) >= 0.9);
    }
}
