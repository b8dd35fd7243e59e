use super::{
    forest::{bootstrap_counts, ForestParams, RandomForest},
    Classifier,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggingParams {
    pub n_estimators: usize,
    pub seed: u64,
    /// Configuration of every member forest.
    pub base: ForestParams,
}

impl Default for BaggingParams {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            seed: 0,
            base: ForestParams::default(),
        }
    }
}

/// Bagged random forests. Each member is fitted on its own bootstrap sample
/// and the ensemble averages their probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bagging {
    members: Vec<RandomForest>,
    n_features: usize,
}

impl Bagging {
    pub fn fit(params: &BaggingParams, x: &[Vec<f64>], y: &[u8]) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let members = (0..params.n_estimators.max(1))
            .map(|_| {
                let counts = bootstrap_counts(x.len(), &mut rng);
                let member_params = ForestParams {
                    seed: rng.gen(),
                    ..params.base.clone()
                };
                RandomForest::fit_weighted(&member_params, x, y, &counts)
            })
            .collect();

        Self {
            members,
            n_features: x[0].len(),
        }
    }

    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.members.is_empty() {
            return Err("ensemble has no members".to_string());
        }
        for member in &self.members {
            if member.n_features() != self.n_features {
                return Err(format!(
                    "member forest expects {} features, ensemble {}",
                    member.n_features(),
                    self.n_features
                ));
            }
            member.validate()?;
        }
        Ok(())
    }
}

impl Classifier for Bagging {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.predict_proba(row)).sum();
        total / self.members.len() as f64
    }
}
