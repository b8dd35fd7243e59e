use crate::{
    artifacts::{ArtifactStore, EstimatorSource, PreloadedModels},
    config::ModelsConfig,
    dispatcher::ModelDispatcher,
    error::AppError,
    features::FeatureEncoder,
    questionnaire::{Question, Questionnaire},
    registry::ModelId,
    types::*,
};
use std::{sync::Arc, time::Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Encoder and dispatcher wired together for the request path. Holds only
/// immutable state, so one instance is shared by every request.
pub struct PredictionEngine {
    encoder: FeatureEncoder,
    dispatcher: ModelDispatcher,
}

impl PredictionEngine {
    pub fn new(questionnaire: Arc<Questionnaire>, source: Arc<dyn EstimatorSource>) -> Self {
        Self {
            encoder: FeatureEncoder::new(questionnaire),
            dispatcher: ModelDispatcher::new(source),
        }
    }

    /// Build from configuration: artifacts are read per prediction unless
    /// `models.preload` is set.
    pub fn from_config(config: &ModelsConfig) -> Self {
        info!("Initializing prediction engine...");
        let store = ArtifactStore::new(&config.artifact_dir, config.format);

        let source: Arc<dyn EstimatorSource> = if config.preload {
            let preloaded = PreloadedModels::load(store);
            if preloaded.is_empty() {
                warn!("No model artifacts could be preloaded; every prediction will fail");
            }
            Arc::new(preloaded)
        } else {
            info!(
                "Loading artifacts per prediction from {}",
                config.artifact_dir.display()
            );
            Arc::new(store)
        };

        Self::new(Arc::new(Questionnaire::standard()), source)
    }

    // Blocking: may read artifacts from disk.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, AppError> {
        let start = Instant::now();
        metrics::counter!("predictions_total").increment(1);

        let result = self
            .encoder
            .encode(&request.answers)
            .and_then(|vector| self.dispatcher.predict(&request.model, &vector));

        let prediction = match result {
            Ok(prediction) => prediction,
            Err(e) => {
                metrics::counter!("prediction_errors_total", "kind" => e.kind()).increment(1);
                warn!("Prediction with model '{}' failed: {}", request.model, e);
                return Err(e);
            }
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("prediction_duration_ms").record(latency_ms);
        metrics::counter!("predictions_by_model_total", "model" => prediction.model.key()).increment(1);

        let response = PredictResponse {
            prediction_id: Uuid::new_v4(),
            model: prediction.model.display_name().to_string(),
            y1: LabelView {
                class: prediction.y1_class,
                label: prediction.y1,
                description: prediction.y1.description().to_string(),
            },
            y2: LabelView {
                class: prediction.y2_class,
                label: prediction.y2,
                description: prediction.y2.description().to_string(),
            },
            f1: prediction.f1,
            latency_ms,
        };

        info!(
            "Prediction {} with {} completed in {:.2}ms",
            response.prediction_id, response.model, latency_ms
        );
        Ok(response)
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        ModelId::ALL.iter().map(ModelId::info).collect()
    }

    pub fn questionnaire(&self) -> Vec<QuestionView> {
        let questionnaire = self.encoder.questionnaire();
        Question::ALL
            .iter()
            .map(|&question| {
                QuestionView {
                    field: question.field(),
                    prompt: question.prompt(),
                    choices: questionnaire.choices(question),
                    // "Other" opens a free-text country field
                    free_text: question == Question::Country,
                }
            })
            .collect()
    }
}
