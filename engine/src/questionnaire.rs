//! Category tables for every question the survey form asks.
//!
//! Each table maps the closed set of labels the form can produce to the
//! integer code the estimators were trained on. Tables are built once by
//! [`Questionnaire::standard`] and shared read-only.

use serde::Serialize;
use std::collections::BTreeMap;

/// Code used for a free-text country that has no entry in the country table.
pub const COUNTRY_FALLBACK: u32 = 99;

/// Country choice that switches the form to free-text entry.
pub const OTHER_COUNTRY: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Question {
    Age,
    Gender,
    Country,
    Employees,
    Benefits,
    Anonymity,
    Treatment,
    Diagnosed,
    PhysicalDiscussion,
    MentalDiscussion,
    CoworkerDiscussion,
    InterferenceTreated,
    InterferenceUntreated,
    Remote,
}

impl Question {
    /// Form order.
    pub const ALL: [Question; 14] = [
        Question::Age,
        Question::Gender,
        Question::Country,
        Question::Employees,
        Question::Benefits,
        Question::Anonymity,
        Question::Treatment,
        Question::Diagnosed,
        Question::PhysicalDiscussion,
        Question::MentalDiscussion,
        Question::CoworkerDiscussion,
        Question::InterferenceTreated,
        Question::InterferenceUntreated,
        Question::Remote,
    ];

    /// Name of the answer field in an `AnswerSet`.
    pub fn field(&self) -> &'static str {
        match self {
            Question::Age => "age",
            Question::Gender => "gender",
            Question::Country => "country",
            Question::Employees => "employees",
            Question::Benefits => "benefits",
            Question::Anonymity => "anonymity",
            Question::Treatment => "treatment",
            Question::Diagnosed => "diagnosed",
            Question::PhysicalDiscussion => "physicalDiscussion",
            Question::MentalDiscussion => "mentalDiscussion",
            Question::CoworkerDiscussion => "coworkerDiscussion",
            Question::InterferenceTreated => "interferenceTreated",
            Question::InterferenceUntreated => "interferenceUntreated",
            Question::Remote => "remote",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Question::Age => "Age Group",
            Question::Gender => "Gender",
            Question::Country => "Country of Residence",
            Question::Employees => "How many employees does your company or organization have?",
            Question::Benefits => "Does your employer provide mental health benefits?",
            Question::Anonymity => "Is your anonymity protected if you choose to take advantage of mental health or substance abuse treatment resources provided by your employer?",
            Question::Treatment => "Have you ever sought treatment for a mental health disorder from a health professional?",
            Question::Diagnosed => "Have you been diagnosed with a mental health condition by a medical professional?",
            Question::PhysicalDiscussion => "Do you think that discussing a physical health issue with your employer would have negative consequences?",
            Question::MentalDiscussion => "Do you think that discussing a mental health disorder with your employer would have negative consequences?",
            Question::CoworkerDiscussion => "Would you be willing to discuss a mental health issue with your coworkers?",
            Question::InterferenceTreated => "How often do you feel that your mental health interferes with your work when being treated effectively?",
            Question::InterferenceUntreated => "How often do you feel that your mental health interferes with your work when NOT being treated effectively?",
            Question::Remote => "Do you work remotely (outside of an office) at least 50% of the time?",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryTable {
    question: Question,
    entries: Vec<(&'static str, u32)>,
}

impl CategoryTable {
    pub fn new(question: Question, entries: &[(&'static str, u32)]) -> Self {
        Self {
            question,
            entries: entries.to_vec(),
        }
    }

    pub fn question(&self) -> Question {
        self.question
    }

    pub fn lookup(&self, label: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(key, _)| *key == label)
            .map(|(_, code)| *code)
    }

    /// Labels in the order the form offers them.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }
}

const YES_NO_DONT_KNOW: &[(&str, u32)] = &[("Yes", 1), ("No", 0), ("Don't Know", 2)];
const YES_NO_MAYBE: &[(&str, u32)] = &[("Yes", 1), ("No", 0), ("Maybe", 2)];
const YES_NO: &[(&str, u32)] = &[("Yes", 1), ("No", 0)];
const FREQUENCY: &[(&str, u32)] = &[("Rarely", 0), ("Sometimes", 1), ("Often", 2), ("Always", 3)];

const AGE_GROUPS: &[(&str, u32)] = &[
    ("18-24", 0),
    ("25-29", 1),
    ("30-34", 2),
    ("35-39", 3),
    ("40-44", 4),
    ("45-49", 5),
    ("50-54", 6),
    ("55-59", 7),
    ("60-64", 8),
    ("65-69", 9),
    ("70-74", 10),
    ("75-79", 11),
    ("80-84", 12),
    ("85-89", 13),
    ("90-94", 14),
    ("95-99", 15),
];

const GENDERS: &[(&str, u32)] = &[
    ("Male", 0),
    ("Female", 1),
    ("Non-Binary", 2),
    ("Prefer not to say", 3),
    ("Other", 4),
];

// Codes come from the label encoder fitted on the survey export; several
// countries share a code.
const COUNTRIES: &[(&str, u32)] = &[
    ("United States of America", 6),
    ("Brazil", 51),
    ("Italy", 23),
    ("Canada", 52),
    ("Germany", 16),
    ("India", 52),
    ("Belarus", 16),
    ("Macedonia", 51),
    ("Slovenia", 52),
    ("Albania", 52),
    ("Austria", 51),
    ("Kenya", 52),
    ("Australia", 17),
    ("Sao Tome and Principe", 52),
    ("Vietnam", 52),
    ("Indonesia", 52),
    ("Switzerland", 47),
    ("Finland", 45),
    ("Turkey", 52),
    ("Poland", 52),
    ("United Kingdom", 52),
    ("Nigeria", 6),
    ("Bulgaria", 5),
    ("Estonia", 39),
    ("Colombia", 45),
    ("Netherlands", 52),
    ("Israel", 52),
    ("Bangladesh", 52),
    ("Greece", 52),
    ("China", 52),
    ("South Africa", 21),
    ("Portugal", 51),
    ("Pakistan", 52),
];

const EMPLOYEES: &[(&str, u32)] = &[
    ("1-10", 0),
    ("11-50", 1),
    ("51-100", 2),
    ("101-250", 3),
    ("251-500", 4),
    ("500+", 5),
];

const DIAGNOSED: &[(&str, u32)] = &[("Yes", 1), ("No", 0), ("Prefer not to say", 2)];

/// The full set of category tables, one per question.
#[derive(Debug, Clone)]
pub struct Questionnaire {
    tables: BTreeMap<Question, CategoryTable>,
}

impl Questionnaire {
    pub fn standard() -> Self {
        let tables = Question::ALL
            .iter()
            .map(|&question| {
                let entries = match question {
                    Question::Age => AGE_GROUPS,
                    Question::Gender => GENDERS,
                    Question::Country => COUNTRIES,
                    Question::Employees => EMPLOYEES,
                    Question::Benefits | Question::Anonymity => YES_NO_DONT_KNOW,
                    Question::Treatment | Question::Remote => YES_NO,
                    Question::Diagnosed => DIAGNOSED,
                    Question::PhysicalDiscussion
                    | Question::MentalDiscussion
                    | Question::CoworkerDiscussion => YES_NO_MAYBE,
                    Question::InterferenceTreated | Question::InterferenceUntreated => FREQUENCY,
                };
                (question, CategoryTable::new(question, entries))
            })
            .collect();

        Self { tables }
    }

    pub fn table(&self, question: Question) -> &CategoryTable {
        // every Question variant is inserted by `standard`
        &self.tables[&question]
    }

    /// Labels the form offers for `question`. The country list is sorted and
    /// ends with the free-text escape choice.
    pub fn choices(&self, question: Question) -> Vec<&'static str> {
        let table = self.table(question);
        match question {
            Question::Country => {
                let mut countries: Vec<&'static str> = table.labels().collect();
                countries.sort_unstable();
                countries.push(OTHER_COUNTRY);
                countries
            }
            _ => table.labels().collect(),
        }
    }

    /// Country code for a named or free-text country. Unknown names map to
    /// [`COUNTRY_FALLBACK`].
    pub fn country_code(&self, country: &str) -> u32 {
        self.table(Question::Country)
            .lookup(country)
            .unwrap_or(COUNTRY_FALLBACK)
    }
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self::standard()
    }
}
