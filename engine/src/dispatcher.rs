use crate::{
    artifacts::EstimatorSource,
    error::AppError,
    features::{FeatureVector, FEATURE_COUNT},
    registry::ModelId,
    types::{CareNeed, DisorderLikelihood, ReportedScores},
};
use std::sync::Arc;
use tracing::debug;

/// Both predicted labels plus the model's published F1 pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub model: ModelId,
    pub y1_class: u8,
    pub y2_class: u8,
    pub y1: CareNeed,
    pub y2: DisorderLikelihood,
    pub f1: ReportedScores,
}

/// Routes a feature vector to the estimator pair of the named model.
#[derive(Clone)]
pub struct ModelDispatcher {
    source: Arc<dyn EstimatorSource>,
}

impl ModelDispatcher {
    pub fn new(source: Arc<dyn EstimatorSource>) -> Self {
        Self { source }
    }

    pub fn predict(&self, model_name: &str, vector: &FeatureVector) -> Result<Prediction, AppError> {
        let model = ModelId::resolve(model_name)?;

        if vector.len() != FEATURE_COUNT {
            return Err(AppError::ShapeMismatch(format!(
                "feature vector has {} entries, expected {}",
                vector.len(),
                FEATURE_COUNT
            )));
        }

        let pair = self.source.load_pair(model)?;
        let y1_class = pair.y1.estimator.classify(vector.as_slice())?;
        let y2_class = pair.y2.estimator.classify(vector.as_slice())?;
        debug!("{} predicted y1={} y2={}", model, y1_class, y2_class);

        Ok(Prediction {
            model,
            y1_class,
            y2_class,
            y1: CareNeed::from_class(y1_class),
            y2: DisorderLikelihood::from_class(y2_class),
            f1: model.reported_f1(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{testing::save_tree_pair, ArtifactFormat, ArtifactStore, PreloadedModels};

    fn vector(first: f64, second: f64) -> FeatureVector {
        let mut values = vec![0.0; FEATURE_COUNT];
        values[0] = first;
        values[1] = second;
        FeatureVector::new(values)
    }

    #[test]
    fn test_predicts_both_targets() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = ArtifactStore::new(dir.path(), ArtifactFormat::Bincode);
        save_tree_pair(&store, ModelId::DecisionTree);
        let dispatcher = ModelDispatcher::new(Arc::new(store));

        let prediction = dispatcher.predict("Decision Tree", &vector(1.0, 0.0)).expect("predict");
        assert_eq!(prediction.y1, CareNeed::NeedsCare);
        assert_eq!(prediction.y2, DisorderLikelihood::LowLikelihood);
        assert_eq!(prediction.f1, ReportedScores { y1: 1.0, y2: 1.0 });

        let prediction = dispatcher.predict("decision_tree", &vector(0.0, 1.0)).expect("predict");
        assert_eq!((prediction.y1_class, prediction.y2_class), (0, 1));
    }

    #[test]
    fn test_unknown_model() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let dispatcher = ModelDispatcher::new(Arc::new(ArtifactStore::new(
            dir.path(),
            ArtifactFormat::Bincode,
        )));
        let err = dispatcher.predict("Perceptron", &vector(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, AppError::UnknownModel(_)));
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let dispatcher = ModelDispatcher::new(Arc::new(ArtifactStore::new(
            dir.path(),
            ArtifactFormat::Json,
        )));
        let err = dispatcher
            .predict("Support Vector Machine", &vector(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, AppError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_short_vector_is_shape_mismatch() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = ArtifactStore::new(dir.path(), ArtifactFormat::Bincode);
        save_tree_pair(&store, ModelId::DecisionTree);
        let dispatcher = ModelDispatcher::new(Arc::new(store));

        let err = dispatcher
            .predict("Decision Tree", &FeatureVector::new(vec![0.0; 50]))
            .unwrap_err();
        assert!(matches!(err, AppError::ShapeMismatch(_)));
    }

    #[test]
    fn test_preloaded_and_fresh_agree() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = ArtifactStore::new(dir.path(), ArtifactFormat::Json);
        save_tree_pair(&store, ModelId::AdaBoost);

        let fresh = ModelDispatcher::new(Arc::new(store.clone()));
        let cached = ModelDispatcher::new(Arc::new(PreloadedModels::load(store)));
        for (a, b) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)] {
            assert_eq!(
                fresh.predict("ada", &vector(a, b)).expect("fresh"),
                cached.predict("AdaBoost Classifier", &vector(a, b)).expect("cached"),
            );
        }
    }
}
