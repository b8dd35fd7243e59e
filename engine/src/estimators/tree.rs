use super::Classifier;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Flat binary tree; node 0 is the root. Rows with `x[feature] <= threshold`
/// go left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Structural check for trees read from disk. Children always sit after
    /// their parent, which also rules out cycles.
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!(
                        "node {} splits on feature {} of {}",
                        index, feature, n_features
                    ));
                }
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", index, child));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Incremental construction shared by the classification and the
/// gradient-boosting tree growers.
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn reserve(&mut self) -> usize {
        self.nodes.push(Node::Leaf { value: 0.0 });
        self.nodes.len() - 1
    }

    pub(crate) fn set(&mut self, index: usize, node: Node) {
        self.nodes[index] = node;
    }

    pub(crate) fn finish(self) -> Tree {
        Tree { nodes: self.nodes }
    }
}

/// Row indices ordered by one feature, for threshold sweeps.
pub(crate) fn sorted_by_feature(x: &[Vec<f64>], indices: &[usize], feature: usize) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
    sorted
}

/// Midpoint between two distinct neighbouring values.
pub(crate) fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high {
        low
    } else {
        mid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn count(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_features: MaxFeatures::All,
            min_samples_split: 2,
            seed: 0,
        }
    }
}

/// Weighted Gini impurity of a binary node.
fn gini(weight: f64, positive: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    let p = positive / weight;
    2.0 * p * (1.0 - p)
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// CART classification tree over weighted rows. Leaves hold the weighted
/// fraction of class 1. Rows with zero weight are ignored.
pub(crate) fn grow_classifier(
    x: &[Vec<f64>],
    y: &[u8],
    weights: &[f64],
    params: &TreeParams,
    rng: &mut StdRng,
) -> Tree {
    let indices: Vec<usize> = (0..x.len()).filter(|&i| weights[i] > 0.0).collect();
    let mut builder = TreeBuilder::new();
    let grower = ClassifierGrower {
        x,
        y,
        weights,
        params,
        n_features: x[0].len(),
    };
    grower.grow(&mut builder, &indices, 0, rng);
    builder.finish()
}

struct ClassifierGrower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
}

impl ClassifierGrower<'_> {
    fn grow(&self, builder: &mut TreeBuilder, indices: &[usize], depth: usize, rng: &mut StdRng) -> usize {
        let node = builder.reserve();

        let (weight, positive) = indices.iter().fold((0.0, 0.0), |(w, p), &i| {
            let wi = self.weights[i];
            (w + wi, p + wi * f64::from(self.y[i]))
        });
        let value = if weight > 0.0 { positive / weight } else { 0.0 };

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        let pure = positive <= 0.0 || positive >= weight;
        if depth_reached || pure || indices.len() < self.params.min_samples_split {
            builder.set(node, Node::Leaf { value });
            return node;
        }

        let Some(split) = self.best_split(indices, weight, positive, rng) else {
            builder.set(node, Node::Leaf { value });
            return node;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(builder, &left_rows, depth + 1, rng);
        let right = self.grow(builder, &right_rows, depth + 1, rng);
        builder.set(
            node,
            Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            },
        );
        node
    }

    fn best_split(
        &self,
        indices: &[usize],
        weight: f64,
        positive: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);
        let budget = self.params.max_features.count(self.n_features);

        let parent = weight * gini(weight, positive);
        let mut best: Option<SplitCandidate> = None;

        for (visited, feature) in features.into_iter().enumerate() {
            // past the sampling budget, only keep looking while nothing splits
            if visited >= budget && best.is_some() {
                break;
            }
            let sorted = sorted_by_feature(self.x, indices, feature);
            let mut left_w = 0.0;
            let mut left_pos = 0.0;

            for pair in sorted.windows(2) {
                let (i, next) = (pair[0], pair[1]);
                left_w += self.weights[i];
                left_pos += self.weights[i] * f64::from(self.y[i]);

                let (low, high) = (self.x[i][feature], self.x[next][feature]);
                if low >= high {
                    continue;
                }

                let right_w = weight - left_w;
                let right_pos = positive - left_pos;
                let impurity = left_w * gini(left_w, left_pos) + right_w * gini(right_w, right_pos);

                if impurity < parent && best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(low, high),
                        impurity,
                    });
                }
            }
        }

        best
    }
}

/// Single CART tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    tree: Tree,
    n_features: usize,
}

impl DecisionTree {
    pub fn fit(params: &TreeParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        let weights = vec![1.0; x.len()];
        let mut rng = StdRng::seed_from_u64(params.seed);
        Self {
            tree: grow_classifier(x, y, &weights, params, &mut rng),
            n_features: x[0].len(),
        }
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        self.tree.validate(self.n_features)
    }
}

impl Classifier for DecisionTree {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        self.tree.leaf_value(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::fixtures::{accuracy, separable};

    #[test]
    fn test_perfect_fit_on_separable_data() {
        let (x, y) = separable();
        let tree = DecisionTree::fit(&TreeParams::default(), &x, &y);
        assert_eq!(accuracy(&tree, &x, &y), 1.0);
        // one threshold on x0 separates the classes
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[4.9, 0.0, 0.0]), 0);
        assert_eq!(tree.predict(&[5.1, 4.0, 3.0]), 1);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        // xor of two features needs depth 2
        let x = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let y = vec![0, 1, 1, 0];
        let stump = DecisionTree::fit(
            &TreeParams {
                max_depth: Some(1),
                ..Default::default()
            },
            &x,
            &y,
        );
        assert!(stump.depth() <= 1);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![0, 1, 0, 1];
        let weights = vec![1.0, 0.0, 1.0, 0.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = grow_classifier(&x, &y, &weights, &TreeParams::default(), &mut rng);
        assert_eq!(tree.leaf_value(&[1.0]), 0.0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_structure() {
        let leaf = Node::Leaf { value: 1.0 };
        let split = |feature, left, right| Node::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        };

        let good = Tree {
            nodes: vec![split(1, 1, 2), leaf.clone(), leaf.clone()],
        };
        assert!(good.validate(2).is_ok());

        let wide = Tree {
            nodes: vec![split(2, 1, 2), leaf.clone(), leaf.clone()],
        };
        assert!(wide.validate(2).is_err());

        let dangling = Tree {
            nodes: vec![split(0, 1, 7), leaf.clone()],
        };
        assert!(dangling.validate(2).is_err());

        let cyclic = Tree {
            nodes: vec![split(0, 0, 1), leaf.clone()],
        };
        assert!(cyclic.validate(2).is_err());

        assert!(Tree { nodes: Vec::new() }.validate(2).is_err());
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(1.0, 2.0), 1.5);
        assert!(midpoint(1.0, 1.0 + f64::EPSILON) < 1.0 + f64::EPSILON);
    }
}
