use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RespondentId = Uuid;
pub type SurveyId = Uuid;

/// The external party answering the survey, keyed by contact address
/// (an E.164 phone number without the leading `+` on WhatsApp).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Respondent {
    pub id: RespondentId,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    InProgress,
    Finished,
}

impl SurveyStatus {
    /// Value persisted in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::InProgress => "in_progress",
            SurveyStatus::Finished => "finished",
        }
    }
}

/// One run of the questionnaire for one respondent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurveyInstance {
    pub id: SurveyId,
    pub respondent_id: RespondentId,
    pub status: SurveyStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One persisted (question, answer) pair. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecord {
    pub survey_id: SurveyId,
    pub question_number: u32,
    pub answer_id: String,
    pub answer_label: String,
    pub recorded_at: DateTime<Utc>,
}

/// Snapshot of a respondent's in-progress survey.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub survey_id: SurveyId,
    pub answered_count: u32,
}

/// Uniform answer produced from any supported inbound message shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub id: String,
    pub label: String,
}

impl Answer {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A closed choice offered for a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: String,
    pub title: String,
}

/// Static question definition. No options means free-text input is expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionDefinition {
    pub number: u32,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

impl QuestionDefinition {
    pub fn is_free_text(&self) -> bool {
        self.options.is_empty()
    }
}

/// Pre-approved platform template used for first contact (question 1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateRef {
    pub name: String,
    pub language: String,
}
