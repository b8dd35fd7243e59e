use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Encoding(_) => "encoding",
            AppError::UnknownModel(_) => "unknown_model",
            AppError::ArtifactLoad { .. } => "artifact_load",
            AppError::ShapeMismatch(_) => "shape_mismatch",
            AppError::Config(_) => "config",
            AppError::Serialization(_) => "serialization",
            AppError::Io(_) => "io",
            AppError::Dataset(_) => "dataset",
            AppError::Training(_) => "training",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Encoding(_) | AppError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            AppError::ArtifactLoad { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Encoding(_)
            | AppError::UnknownModel(_)
            | AppError::ArtifactLoad { .. }
            | AppError::ShapeMismatch(_) => {
                if status.is_server_error() {
                    tracing::error!("Prediction failed: {}", self);
                }
                self.to_string()
            }
            _ => {
                tracing::error!("Internal server error: {}", self);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Internal(format!("bincode: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Dataset(err.to_string())
    }
}

// Helper function for creating encoding errors
pub fn encoding_error(msg: impl Into<String>) -> AppError {
    AppError::Encoding(msg.into())
}

// Helper function for creating artifact load errors
pub fn artifact_error(path: impl Into<PathBuf>, reason: impl ToString) -> AppError {
    AppError::ArtifactLoad {
        path: path.into(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(
            encoding_error("missing age").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnknownModel("Perceptron".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_artifact_error_names_path() {
        let err = artifact_error("models/svm_model_y1.bin", "No such file");
        assert_eq!(err.kind(), "artifact_load");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("svm_model_y1.bin"));
    }
}
