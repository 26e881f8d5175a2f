//! In-memory progress store backed by DashMap.
//!
//! Used for development mode (`--in-memory`) and tests. Mirrors the
//! constraints of the PostgreSQL schema so both backends fail the same way.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use survey_core::types::{
    AnswerRecord, Progress, Respondent, RespondentId, SurveyId, SurveyInstance, SurveyStatus,
};
use survey_core::{SurveyError, SurveyResult};

use crate::traits::ProgressStore;

/// Thread-safe in-memory store for respondents, survey instances and answers.
pub struct MemoryStore {
    respondents: DashMap<String, Respondent>,
    surveys: DashMap<SurveyId, SurveyInstance>,
    answers: DashMap<SurveyId, Vec<AnswerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Progress store initialized (in-memory, development mode)");
        Self {
            respondents: DashMap::new(),
            surveys: DashMap::new(),
            answers: DashMap::new(),
        }
    }

    pub fn survey(&self, id: SurveyId) -> Option<SurveyInstance> {
        self.surveys.get(&id).map(|r| r.value().clone())
    }

    /// All surveys of a respondent, oldest first.
    pub fn surveys_for(&self, address: &str) -> Vec<SurveyInstance> {
        let Some(respondent_id) = self.respondents.get(address).map(|r| r.id) else {
            return Vec::new();
        };
        let mut surveys: Vec<SurveyInstance> = self
            .surveys
            .iter()
            .filter(|r| r.respondent_id == respondent_id)
            .map(|r| r.value().clone())
            .collect();
        surveys.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        surveys
    }

    /// Answers of a survey in question order.
    pub fn answers(&self, survey_id: SurveyId) -> Vec<AnswerRecord> {
        let mut answers = self
            .answers
            .get(&survey_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        answers.sort_by_key(|a| a.question_number);
        answers
    }

    pub fn respondent_count(&self) -> usize {
        self.respondents.len()
    }

    pub fn survey_count(&self) -> usize {
        self.surveys.len()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.iter().map(|r| r.value().len()).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn upsert_respondent(&self, address: &str) -> SurveyResult<RespondentId> {
        let respondent = self
            .respondents
            .entry(address.to_string())
            .or_insert_with(|| Respondent {
                id: Uuid::new_v4(),
                address: address.to_string(),
                created_at: Utc::now(),
            });
        Ok(respondent.id)
    }

    async fn start_survey(&self, respondent_id: RespondentId) -> SurveyResult<SurveyId> {
        if !self.respondents.iter().any(|r| r.id == respondent_id) {
            return Err(SurveyError::Store(format!(
                "respondent {respondent_id} does not exist"
            )));
        }
        let already_running = self
            .surveys
            .iter()
            .any(|r| r.respondent_id == respondent_id && r.status == SurveyStatus::InProgress);
        if already_running {
            return Err(SurveyError::Store(format!(
                "respondent {respondent_id} already has an in-progress survey"
            )));
        }

        let survey = SurveyInstance {
            id: Uuid::new_v4(),
            respondent_id,
            status: SurveyStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
        };
        let id = survey.id;
        debug!(survey_id = %id, respondent_id = %respondent_id, "Survey started");
        self.surveys.insert(id, survey);
        Ok(id)
    }

    async fn record_answer(
        &self,
        survey_id: SurveyId,
        question_number: u32,
        answer_id: &str,
        answer_label: &str,
    ) -> SurveyResult<()> {
        if !self.surveys.contains_key(&survey_id) {
            return Err(SurveyError::SurveyNotFound(survey_id));
        }

        let record = AnswerRecord {
            survey_id,
            question_number,
            answer_id: answer_id.to_string(),
            answer_label: answer_label.to_string(),
            recorded_at: Utc::now(),
        };

        match self.answers.entry(survey_id) {
            Entry::Occupied(mut entry) => {
                if entry
                    .get()
                    .iter()
                    .any(|a| a.question_number == question_number)
                {
                    return Err(SurveyError::Store(format!(
                        "answer to question {question_number} already recorded for survey {survey_id}"
                    )));
                }
                entry.get_mut().push(record);
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![record]);
            }
        }
        Ok(())
    }

    async fn current_progress(&self, address: &str) -> SurveyResult<Option<Progress>> {
        let Some(respondent_id) = self.respondents.get(address).map(|r| r.id) else {
            return Ok(None);
        };

        let latest = self
            .surveys
            .iter()
            .filter(|r| r.respondent_id == respondent_id && r.status == SurveyStatus::InProgress)
            .max_by_key(|r| r.started_at)
            .map(|r| r.id);

        Ok(latest.map(|survey_id| Progress {
            survey_id,
            answered_count: self
                .answers
                .get(&survey_id)
                .map(|r| r.len() as u32)
                .unwrap_or(0),
        }))
    }

    async fn finish_survey(&self, survey_id: SurveyId) -> SurveyResult<()> {
        let mut survey = self
            .surveys
            .get_mut(&survey_id)
            .ok_or(SurveyError::SurveyNotFound(survey_id))?;
        if survey.status == SurveyStatus::InProgress {
            survey.status = SurveyStatus::Finished;
            survey.ended_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_respondent_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.upsert_respondent("573001112233").await.unwrap();
        let second = store.upsert_respondent("573001112233").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.respondent_count(), 1);
    }

    #[tokio::test]
    async fn test_progress_counts_recorded_answers() {
        let store = MemoryStore::new();
        assert!(store.current_progress("A").await.unwrap().is_none());

        let respondent = store.upsert_respondent("A").await.unwrap();
        let survey = store.start_survey(respondent).await.unwrap();
        let progress = store.current_progress("A").await.unwrap().unwrap();
        assert_eq!(progress.survey_id, survey);
        assert_eq!(progress.answered_count, 0);

        store.record_answer(survey, 1, "hi", "hi").await.unwrap();
        store.record_answer(survey, 2, "x", "X").await.unwrap();
        let progress = store.current_progress("A").await.unwrap().unwrap();
        assert_eq!(progress.answered_count, 2);

        let numbers: Vec<u32> = store
            .answers(survey)
            .iter()
            .map(|a| a.question_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_record_answer_requires_existing_survey() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        let err = store.record_answer(missing, 1, "a", "A").await.unwrap_err();
        assert!(matches!(err, SurveyError::SurveyNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_duplicate_question_number_is_rejected() {
        let store = MemoryStore::new();
        let respondent = store.upsert_respondent("A").await.unwrap();
        let survey = store.start_survey(respondent).await.unwrap();
        store.record_answer(survey, 1, "a", "A").await.unwrap();
        let err = store.record_answer(survey, 1, "b", "B").await.unwrap_err();
        assert!(matches!(err, SurveyError::Store(_)));
        assert_eq!(store.answer_count(), 1);
    }

    #[tokio::test]
    async fn test_second_in_progress_survey_is_rejected() {
        let store = MemoryStore::new();
        let respondent = store.upsert_respondent("A").await.unwrap();
        store.start_survey(respondent).await.unwrap();
        assert!(store.start_survey(respondent).await.is_err());
        assert_eq!(store.survey_count(), 1);
    }

    #[tokio::test]
    async fn test_finish_survey_stamps_end_and_clears_progress() {
        let store = MemoryStore::new();
        let respondent = store.upsert_respondent("A").await.unwrap();
        let survey = store.start_survey(respondent).await.unwrap();

        store.finish_survey(survey).await.unwrap();
        let finished = store.survey(survey).unwrap();
        assert_eq!(finished.status, SurveyStatus::Finished);
        let ended_at = finished.ended_at.unwrap();
        assert!(store.current_progress("A").await.unwrap().is_none());

        // Second call keeps the original end time.
        store.finish_survey(survey).await.unwrap();
        assert_eq!(store.survey(survey).unwrap().ended_at, Some(ended_at));

        // A new survey can start once the previous one finished.
        let next = store.start_survey(respondent).await.unwrap();
        assert_ne!(next, survey);
        assert_eq!(store.surveys_for("A").len(), 2);
    }
}
