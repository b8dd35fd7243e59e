use crate::questionnaire::Question;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One survey submission. Every categorical answer is optional on the wire so
/// that an absent answer surfaces as an encoding error instead of a JSON
/// rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
    pub age: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    /// Free-text country, read when `country` is "Other".
    pub country_other: Option<String>,
    pub employees: Option<String>,
    pub benefits: Option<String>,
    pub anonymity: Option<String>,
    pub treatment: Option<String>,
    pub diagnosed: Option<String>,
    /// Accepted for completeness of the form; not a model input.
    pub condition_description: Option<String>,
    pub physical_discussion: Option<String>,
    pub mental_discussion: Option<String>,
    pub coworker_discussion: Option<String>,
    pub interference_treated: Option<String>,
    pub interference_untreated: Option<String>,
    pub remote: Option<String>,
    /// Numeric answers to the detailed questions, keyed by feature name.
    #[serde(default)]
    pub detailed: BTreeMap<String, f64>,
}

impl AnswerSet {
    pub fn answer(&self, question: Question) -> Option<&str> {
        let value = match question {
            Question::Age => &self.age,
            Question::Gender => &self.gender,
            Question::Country => &self.country,
            Question::Employees => &self.employees,
            Question::Benefits => &self.benefits,
            Question::Anonymity => &self.anonymity,
            Question::Treatment => &self.treatment,
            Question::Diagnosed => &self.diagnosed,
            Question::PhysicalDiscussion => &self.physical_discussion,
            Question::MentalDiscussion => &self.mental_discussion,
            Question::CoworkerDiscussion => &self.coworker_discussion,
            Question::InterferenceTreated => &self.interference_treated,
            Question::InterferenceUntreated => &self.interference_untreated,
            Question::Remote => &self.remote,
        };
        value.as_deref()
    }
}

/// Y1: would the respondent be comfortable discussing mental health with coworkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareNeed {
    NeedsCare,
    DoesNotNeedCare,
}

impl CareNeed {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            CareNeed::NeedsCare
        } else {
            CareNeed::DoesNotNeedCare
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CareNeed::NeedsCare => "Needs Mental Health care",
            CareNeed::DoesNotNeedCare => "Does not need Mental Health care",
        }
    }
}

/// Y2: would the respondent be comfortable discussing mental health with a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisorderLikelihood {
    HighLikelihood,
    LowLikelihood,
}

impl DisorderLikelihood {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            DisorderLikelihood::HighLikelihood
        } else {
            DisorderLikelihood::LowLikelihood
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DisorderLikelihood::HighLikelihood => "High likelihood of mental health disorder",
            DisorderLikelihood::LowLikelihood => "Low likelihood of mental health disorder",
        }
    }
}

/// F1 scores published for a model, one per target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedScores {
    pub y1: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub model: String,
    pub answers: AnswerSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelView<L> {
    pub class: u8,
    pub label: L,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction_id: Uuid,
    pub model: String,
    pub y1: LabelView<CareNeed>,
    pub y2: LabelView<DisorderLikelihood>,
    pub f1: ReportedScores,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub key: String,
    pub f1: ReportedScores,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub field: &'static str,
    pub prompt: &'static str,
    pub choices: Vec<&'static str>,
    pub free_text: bool,
}
