use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mhp_engine::{
    artifacts::{ArtifactFormat, ArtifactStore},
    engine::PredictionEngine,
    features::{FEATURE_COUNT, FEATURE_NAMES},
    questionnaire::Questionnaire,
    registry::{ModelId, Target},
    routes::{router, AppState},
    training::{Dataset, Trainer},
};
use serde_json::{json, Value};
use std::{path::Path, sync::Arc, sync::OnceLock};
use tempfile::TempDir;
use tower::ServiceExt;

fn survey_csv(rows: usize) -> String {
    let mut out = format!(
        ",{},\"{}\",\"{}\"\n",
        FEATURE_NAMES.join(","),
        Target::Y1.column(),
        Target::Y2.column()
    );
    for i in 0..rows {
        let mut values = vec!["0".to_string(); FEATURE_COUNT];
        values[0] = (i % 2).to_string();
        values[1] = ((i / 2) % 2).to_string();
        values[42] = (i % 4).to_string();
        out.push_str(&format!(
            "{},{},{},{}\n",
            i,
            values.join(","),
            i % 2,
            (i / 2) % 2
        ));
    }
    out
}

/// Artifacts for every registry model, trained once per test binary.
fn trained_models() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tmpdir");
        let dataset = Dataset::from_reader(survey_csv(40).as_bytes()).expect("dataset");
        Trainer::new(ArtifactStore::new(dir.path(), ArtifactFormat::Bincode), 0.2, 25)
            .train(&dataset, &ModelId::ALL)
            .expect("train");
        dir
    })
    .path()
}

fn app(artifact_dir: &Path) -> Router {
    let store = ArtifactStore::new(artifact_dir, ArtifactFormat::Bincode);
    let engine = PredictionEngine::new(Arc::new(Questionnaire::standard()), Arc::new(store));
    router(AppState::new(engine, None))
}

fn answers() -> Value {
    json!({
        "age": "25-29",
        "gender": "Female",
        "country": "Germany",
        "employees": "51-100",
        "benefits": "Yes",
        "anonymity": "Don't Know",
        "treatment": "Yes",
        "diagnosed": "No",
        "physicalDiscussion": "Maybe",
        "mentalDiscussion": "No",
        "coworkerDiscussion": "Yes",
        "interferenceTreated": "Sometimes",
        "interferenceUntreated": "Often",
        "remote": "No"
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn post_predict(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(trained_models()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_models_lists_registry() {
    let (status, body) = send(app(trained_models()), get("/models")).await;
    assert_eq!(status, StatusCode::OK);

    let models = body.as_array().expect("array");
    assert_eq!(models.len(), 7);
    let bagging = models.iter().find(|m| m["key"] == "bagging").expect("bagging");
    assert_eq!(bagging["name"], "Bagging Classifier");
    assert_eq!(bagging["f1"]["y2"], 0.9711);
}

#[tokio::test]
async fn test_questionnaire_lists_choices() {
    let (status, body) = send(app(trained_models()), get("/questionnaire")).await;
    assert_eq!(status, StatusCode::OK);

    let questions = body.as_array().expect("array");
    assert_eq!(questions.len(), 14);
    let gender = questions.iter().find(|q| q["field"] == "gender").expect("gender");
    assert_eq!(gender["choices"][0], "Male");
}

#[tokio::test]
async fn test_predict_with_every_model() {
    for model in ModelId::ALL {
        let (status, body) = send(
            app(trained_models()),
            post_predict(json!({ "model": model.display_name(), "answers": answers() })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{}: {}", model, body);
        assert_eq!(body["model"], model.display_name());
        assert!(body["prediction_id"].is_string());
        assert!(["needs_care", "does_not_need_care"].contains(&body["y1"]["label"].as_str().unwrap_or("")));
        assert!(["high_likelihood", "low_likelihood"].contains(&body["y2"]["label"].as_str().unwrap_or("")));
        assert_eq!(body["f1"]["y1"], model.reported_f1().y1);
    }
}

#[tokio::test]
async fn test_predict_follows_detailed_answers() {
    let mut answers = answers();
    answers["detailed"] = json!({ "openly_identified_mh_work": 1, "self_employed": 0 });
    let (status, body) = send(
        app(trained_models()),
        post_predict(json!({ "model": "Decision Tree", "answers": answers })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["y1"]["class"], 1);
    assert_eq!(body["y1"]["description"], "Needs Mental Health care");
    assert_eq!(body["y2"]["class"], 0);
}

#[tokio::test]
async fn test_unknown_model_is_bad_request() {
    let (status, body) = send(
        app(trained_models()),
        post_predict(json!({ "model": "Naive Bayes", "answers": answers() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "unknown_model");
}

#[tokio::test]
async fn test_invalid_answer_is_bad_request() {
    let mut answers = answers();
    answers["employees"] = json!("a few");
    let (status, body) = send(
        app(trained_models()),
        post_predict(json!({ "model": "svm", "answers": answers })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "encoding");
    assert!(body["error"].as_str().unwrap_or("").contains("employees"));
}

#[tokio::test]
async fn test_missing_artifacts_is_unavailable() {
    let empty = tempfile::tempdir().expect("tmpdir");
    let (status, body) = send(
        app(empty.path()),
        post_predict(json!({ "model": "XGBoost Classifier", "answers": answers() })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "artifact_load");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let response = app(trained_models()).oneshot(get("/metrics")).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
