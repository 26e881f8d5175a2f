use serde::Serialize;

use survey_core::types::{Progress, SurveyId};

/// Where a respondent stands in the questionnaire, as derived from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SurveyState {
    NoSurvey,
    InProgress { survey_id: SurveyId, answered: u32 },
    Finished { survey_id: SurveyId },
}

/// What follows once an answer has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Ask(u32),
    Finish,
}

/// The step the engine takes for one inbound answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Survey to record into; `None` means a new survey must be started.
    pub survey_id: Option<SurveyId>,
    pub question_number: u32,
    pub next: NextAction,
}

impl SurveyState {
    /// A respondent without an in-progress survey is in `NoSurvey`, whether
    /// or not an earlier survey of theirs finished.
    pub fn from_progress(progress: Option<Progress>) -> Self {
        match progress {
            Some(p) => SurveyState::InProgress {
                survey_id: p.survey_id,
                answered: p.answered_count,
            },
            None => SurveyState::NoSurvey,
        }
    }

    /// Transition for an answer arriving in this state, for a catalog whose
    /// last question is `last_question`.
    ///
    /// With no running survey the answer belongs to question 1 (delivered by
    /// template); otherwise it answers the question after the ones already
    /// recorded.
    pub fn on_answer(&self, last_question: u32) -> Transition {
        let (survey_id, question_number) = match *self {
            SurveyState::InProgress {
                survey_id,
                answered,
            } => (Some(survey_id), answered + 1),
            SurveyState::NoSurvey | SurveyState::Finished { .. } => (None, 1),
        };

        let next_question = question_number + 1;
        let next = if next_question <= last_question {
            NextAction::Ask(next_question)
        } else {
            NextAction::Finish
        };

        Transition {
            survey_id,
            question_number,
            next,
        }
    }
}

impl Transition {
    /// State after the transition has been applied to `survey_id`.
    pub fn resulting_state(&self, survey_id: SurveyId) -> SurveyState {
        match self.next {
            NextAction::Ask(_) => SurveyState::InProgress {
                survey_id,
                answered: self.question_number,
            },
            NextAction::Finish => SurveyState::Finished { survey_id },
        }
    }
}
