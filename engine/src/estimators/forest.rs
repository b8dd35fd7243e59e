use super::{
    tree::{grow_classifier, MaxFeatures, Tree, TreeParams},
    Classifier,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            seed: 0,
        }
    }
}

/// Bootstrap-aggregated CART trees, each split drawn from √d features.
/// Predicted probability is the mean of the trees' leaf fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(params: &ForestParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        Self::fit_weighted(params, x, y, &vec![1.0; x.len()])
    }

    /// Fit with per-row base weights; bootstrap counts multiply them.
    pub fn fit_weighted(params: &ForestParams, x: &[Vec<f64>], y: &[u8], base: &[f64]) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_features: MaxFeatures::Sqrt,
            ..Default::default()
        };

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let counts = bootstrap_counts(x.len(), &mut rng);
                let weights: Vec<f64> = counts.iter().zip(base).map(|(c, w)| c * w).collect();
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                grow_classifier(x, y, &weights, &tree_params, &mut tree_rng)
            })
            .collect();

        Self {
            trees,
            n_features: x[0].len(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        self.trees.iter().try_for_each(|tree| tree.validate(self.n_features))
    }

    pub(crate) fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.leaf_value(row)).sum();
        total / self.trees.len() as f64
    }
}

/// How many times each of `n` rows is drawn in a sample of size `n` with
/// replacement.
pub(crate) fn bootstrap_counts(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut counts = vec![0.0; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1.0;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::fixtures::{accuracy, separable};

    #[test]
    fn test_forest_fits_separable_data() {
        let (x, y) = separable();
        let params = ForestParams {
            n_estimators: 15,
            max_depth: None,
            seed: 10,
        };
        let forest = RandomForest::fit(&params, &x, &y);
        assert_eq!(forest.n_trees(), 15);
        assert!(accuracy(&forest, &x, &y) >= 0.9);

        let p = forest.predict_proba(&[9.5, 1.0, 1.0]);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let params = ForestParams {
            n_estimators: 5,
            max_depth: Some(3),
            seed: 7,
        };
        let a = RandomForest::fit(&params, &x, &y);
        let b = RandomForest::fit(&params, &x, &y);
        for row in &x {
            approx::assert_relative_eq!(a.predict_proba(row), b.predict_proba(row));
        }
    }

    #[test]
    fn test_bootstrap_counts_sum_to_n() {
        let mut rng = StdRng::seed_from_u64(3);
        let counts = bootstrap_counts(50, &mut rng);
        assert_eq!(counts.iter().sum::<f64>(), 50.0);
    }
}
