use super::{
    sigmoid,
    tree::{midpoint, sorted_by_feature, Node, Tree, TreeBuilder},
    Classifier,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight (eta).
    pub learning_rate: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    pub min_child_weight: f64,
    /// Minimum loss reduction required to split.
    pub gamma: f64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.3,
            lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
        }
    }
}

/// Second-order gradient-boosted trees on the logistic loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    base_margin: f64,
    trees: Vec<Tree>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn fit(params: &GradientBoostingParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        // base score 0.5
        let base_margin = 0.0;
        let mut margins = vec![base_margin; x.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let indices: Vec<usize> = (0..x.len()).collect();

        for round in 0..params.n_estimators {
            let (gradients, hessians): (Vec<f64>, Vec<f64>) = margins
                .iter()
                .zip(y)
                .map(|(&m, &label)| {
                    let p = sigmoid(m);
                    (p - f64::from(label), (p * (1.0 - p)).max(1e-16))
                })
                .unzip();

            let grower = RegressionGrower {
                x,
                gradients: &gradients,
                hessians: &hessians,
                params,
            };
            let mut builder = TreeBuilder::new();
            grower.grow(&mut builder, &indices, 0);
            let tree = builder.finish();

            for (margin, row) in margins.iter_mut().zip(x) {
                *margin += tree.leaf_value(row);
            }
            debug!("Boosting round {} depth {}", round, tree.depth());
            trees.push(tree);
        }

        Self {
            base_margin,
            trees,
            n_features: x[0].len(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        self.trees.iter().try_for_each(|tree| tree.validate(self.n_features))
    }

    fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.leaf_value(row)).sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.margin(row))
    }
}

struct RegressionGrower<'a> {
    x: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: &'a GradientBoostingParams,
}

impl RegressionGrower<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&self, builder: &mut TreeBuilder, indices: &[usize], depth: usize) -> usize {
        let node = builder.reserve();
        let g: f64 = indices.iter().map(|&i| self.gradients[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hessians[i]).sum();
        let leaf = Node::Leaf {
            value: -g / (h + self.params.lambda) * self.params.learning_rate,
        };

        if depth >= self.params.max_depth || indices.len() < 2 {
            builder.set(node, leaf);
            return node;
        }

        let Some((feature, threshold)) = self.best_split(indices, g, h) else {
            builder.set(node, leaf);
            return node;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][feature] <= threshold);

        let left = self.grow(builder, &left_rows, depth + 1);
        let right = self.grow(builder, &right_rows, depth + 1);
        builder.set(
            node,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            },
        );
        node
    }

    fn best_split(&self, indices: &[usize], g: f64, h: f64) -> Option<(usize, f64)> {
        let parent = self.score(g, h);
        let mut best_gain = 0.0;
        let mut best = None;

        for feature in 0..self.x[0].len() {
            let sorted = sorted_by_feature(self.x, indices, feature);
            let (mut gl, mut hl) = (0.0, 0.0);

            for pair in sorted.windows(2) {
                let (i, next) = (pair[0], pair[1]);
                gl += self.gradients[i];
                hl += self.hessians[i];

                let (low, high) = (self.x[i][feature], self.x[next][feature]);
                if low >= high {
                    continue;
                }

                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent) - self.params.gamma;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, midpoint(low, high)));
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::fixtures::{accuracy, separable};

    #[test]
    fn test_boosting_fits_separable_data() {
        let (x, y) = separable();
        let params = GradientBoostingParams {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        };
        let model = GradientBoosting::fit(&params, &x, &y);
        assert_eq!(accuracy(&model, &x, &y), 1.0);
        assert!(model.predict_proba(&[9.75, 0.0, 0.0]) > 0.9);
        assert!(model.predict_proba(&[0.0, 0.0, 0.0]) < 0.1);
    }

    #[test]
    fn test_more_rounds_sharpen_probabilities() {
        let (x, y) = separable();
        let short = GradientBoosting::fit(
            &GradientBoostingParams {
                n_estimators: 2,
                max_depth: 2,
                ..Default::default()
            },
            &x,
            &y,
        );
        let long = GradientBoosting::fit(
            &GradientBoostingParams {
                n_estimators: 10,
                max_depth: 2,
                ..Default::default()
            },
            &x,
            &y,
        );
        let row = [9.0, 1.0, 1.0];
        assert!(long.predict_proba(&row) > short.predict_proba(&row));
    }
}
