//! Workplace mental-health comfort predictor.
//!
//! Survey answers are encoded into the fixed 51-column feature vector and
//! classified by one of seven persisted estimator pairs. The `mhp-engine`
//! binary serves predictions over HTTP; `mhp-train` fits the pairs from the
//! survey CSV.

pub mod artifacts;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod estimators;
pub mod features;
pub mod questionnaire;
pub mod registry;
pub mod routes;
pub mod training;
pub mod types;

pub use error::AppError;
