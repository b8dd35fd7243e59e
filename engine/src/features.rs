use crate::{
    error::{encoding_error, AppError},
    questionnaire::{Question, Questionnaire, OTHER_COUNTRY},
    types::AnswerSet,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Declares the named feature struct and its column list from a single field
/// list so the struct order and the positional order cannot drift apart.
macro_rules! survey_features {
    ($($field:ident),+ $(,)?) => {
        /// One value per model column, declared in training column order.
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct SurveyFeatures {
            $(pub $field: f64,)+
        }

        /// Column names in the order the estimators were trained on.
        pub const FEATURE_NAMES: &[&str] = &[$(stringify!($field)),+];

        impl SurveyFeatures {
            /// Flatten to the positional form estimators consume.
            pub fn to_vector(&self) -> FeatureVector {
                FeatureVector(vec![$(self.$field),+])
            }

            fn slots_mut(&mut self) -> Vec<&mut f64> {
                vec![$(&mut self.$field),+]
            }
        }
    };
}

survey_features! {
    openly_identified_mh_work,
    self_employed,
    discuss_mh_prev_coworker,
    discuss_mh_prev_employer,
    prev_coworker_discuss_mh,
    prev_employer_discuss_mh_campaign,
    prev_employer_mh_resources,
    current_mh_disorder,
    family_history_mh,
    previous_employers,
    know_mh_care_options,
    employer_mh_resources,
    employer_mh_benefits,
    employer_discuss_mh_campaign,
    discuss_mh_coworkers,
    discuss_mh_employer,
    coworker_discuss_mh,
    sought_mh_treatment,
    past_mh_disorder,
    observed_supportive_response,
    observed_bad_response,
    observation_influence_reveal,
    prev_employer_mh_benefits,
    company_size,
    share_mh_friends_family,
    request_mh_leave_ease,
    team_reaction_know_mh,
    mh_interferes_not_treated,
    mh_interferes_treated,
    anonymity_mh_resources,
    tech_company,
    tech_role,
    prev_employer_importance_mh,
    prev_employer_importance_ph,
    employer_importance_mh,
    employer_importance_ph,
    tech_industry_support,
    prev_anonymity_mh_resources,
    prev_tech_company,
    aware_prev_mh_care,
    live_country,
    work_country,
    age,
    gender,
    discuss_ph_interview,
    discuss_mh_interview,
    comfort_discuss_mh_coworkers,
    comfort_discuss_mh_supervisor,
    comfort_discuss_ph_vs_mh,
    prev_comfort_discuss_mh_coworkers,
    prev_comfort_discuss_mh_supervisor,
}

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

impl SurveyFeatures {
    /// Overwrite the feature called `name`. Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match FEATURE_NAMES.iter().position(|n| *n == name) {
            Some(index) => {
                *self.slots_mut()[index] = value;
                true
            }
            None => false,
        }
    }
}

/// Positional feature vector handed to estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Integer codes of the collected answers.
#[derive(Debug, Clone, Copy)]
struct EncodedAnswers {
    age: f64,
    gender: f64,
    country: f64,
    employees: f64,
    benefits: f64,
    anonymity: f64,
    treatment: f64,
    diagnosed: f64,
    physical: f64,
    mental: f64,
    coworker: f64,
    interference_treated: f64,
    interference_untreated: f64,
}

pub struct FeatureEncoder {
    questionnaire: Arc<Questionnaire>,
}

impl FeatureEncoder {
    pub fn new(questionnaire: Arc<Questionnaire>) -> Self {
        Self { questionnaire }
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn encode(&self, answers: &AnswerSet) -> Result<FeatureVector, AppError> {
        Ok(self.encode_named(answers)?.to_vector())
    }

    pub fn encode_named(&self, answers: &AnswerSet) -> Result<SurveyFeatures, AppError> {
        let encoded = self.encode_answers(answers)?;
        let mut features = Self::assemble(&encoded);

        for (name, value) in &answers.detailed {
            if !value.is_finite() {
                return Err(encoding_error(format!(
                    "detailed answer '{}' is not a finite number",
                    name
                )));
            }
            if !features.set(name, *value) {
                return Err(encoding_error(format!("unknown detailed answer '{}'", name)));
            }
        }

        debug!(
            "Encoded answer set ({} detailed overrides)",
            answers.detailed.len()
        );
        Ok(features)
    }

    fn encode_answers(&self, answers: &AnswerSet) -> Result<EncodedAnswers, AppError> {
        // remote is asked and validated but no model column uses it
        self.code(answers, Question::Remote)?;

        Ok(EncodedAnswers {
            age: self.code(answers, Question::Age)?,
            gender: self.code(answers, Question::Gender)?,
            country: self.country(answers)?,
            employees: self.code(answers, Question::Employees)?,
            benefits: self.code(answers, Question::Benefits)?,
            anonymity: self.code(answers, Question::Anonymity)?,
            treatment: self.code(answers, Question::Treatment)?,
            diagnosed: self.code(answers, Question::Diagnosed)?,
            physical: self.code(answers, Question::PhysicalDiscussion)?,
            mental: self.code(answers, Question::MentalDiscussion)?,
            coworker: self.code(answers, Question::CoworkerDiscussion)?,
            interference_treated: self.code(answers, Question::InterferenceTreated)?,
            interference_untreated: self.code(answers, Question::InterferenceUntreated)?,
        })
    }

    fn code(&self, answers: &AnswerSet, question: Question) -> Result<f64, AppError> {
        let label = answers
            .answer(question)
            .ok_or_else(|| encoding_error(format!("missing answer '{}'", question.field())))?;

        self.questionnaire
            .table(question)
            .lookup(label)
            .map(f64::from)
            .ok_or_else(|| {
                encoding_error(format!(
                    "'{}' is not a valid choice for '{}'",
                    label,
                    question.field()
                ))
            })
    }

    fn country(&self, answers: &AnswerSet) -> Result<f64, AppError> {
        let country = answers
            .answer(Question::Country)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| encoding_error("missing answer 'country'"))?;

        let name = if country == OTHER_COUNTRY {
            answers
                .country_other
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| encoding_error("country 'Other' requires 'countryOther'"))?
        } else {
            country
        };

        Ok(f64::from(self.questionnaire.country_code(name)))
    }

    /// Defaults for the columns the form does not ask about, and the collected
    /// answers routed to every column that reuses them.
    fn assemble(a: &EncodedAnswers) -> SurveyFeatures {
        SurveyFeatures {
            openly_identified_mh_work: 0.0,
            self_employed: 0.0,
            discuss_mh_prev_coworker: a.mental,
            discuss_mh_prev_employer: a.mental,
            prev_coworker_discuss_mh: 0.0,
            prev_employer_discuss_mh_campaign: 1.0,
            prev_employer_mh_resources: 0.0,
            current_mh_disorder: a.diagnosed,
            family_history_mh: 1.0,
            previous_employers: 1.0,
            know_mh_care_options: 1.0,
            employer_mh_resources: 1.0,
            employer_mh_benefits: a.benefits,
            employer_discuss_mh_campaign: 0.0,
            discuss_mh_coworkers: a.mental,
            discuss_mh_employer: a.mental,
            coworker_discuss_mh: 0.0,
            sought_mh_treatment: a.treatment,
            past_mh_disorder: 1.0,
            observed_supportive_response: 1.0,
            observed_bad_response: 1.0,
            observation_influence_reveal: 0.0,
            prev_employer_mh_benefits: a.benefits,
            company_size: a.employees,
            share_mh_friends_family: a.coworker,
            request_mh_leave_ease: 4.0,
            team_reaction_know_mh: 5.0,
            mh_interferes_not_treated: a.interference_untreated,
            mh_interferes_treated: a.interference_treated,
            anonymity_mh_resources: a.physical,
            tech_company: 1.0,
            tech_role: 1.0,
            prev_employer_importance_mh: 4.0,
            prev_employer_importance_ph: a.physical,
            employer_importance_mh: 5.0,
            employer_importance_ph: a.physical,
            tech_industry_support: 3.0,
            prev_anonymity_mh_resources: a.anonymity,
            prev_tech_company: 1.0,
            aware_prev_mh_care: 1.0,
            live_country: a.country,
            work_country: a.country,
            age: a.age,
            gender: a.gender,
            discuss_ph_interview: a.physical,
            discuss_mh_interview: 0.0,
            comfort_discuss_mh_coworkers: 1.0,
            comfort_discuss_mh_supervisor: 1.0,
            comfort_discuss_ph_vs_mh: a.physical,
            prev_comfort_discuss_mh_coworkers: a.coworker,
            prev_comfort_discuss_mh_supervisor: a.coworker,
        }
    }
}
