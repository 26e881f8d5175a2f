use async_trait::async_trait;

use survey_core::types::{Progress, RespondentId, SurveyId};
use survey_core::SurveyResult;

/// Query contract between the progression engine and durable survey state.
///
/// Every method is atomic from the caller's point of view. Implementations
/// must be `Send + Sync` so one store can be shared by all request handlers.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create the respondent if absent and return its id. Calling this twice
    /// with the same address returns the same id and never fails on conflict.
    async fn upsert_respondent(&self, address: &str) -> SurveyResult<RespondentId>;

    /// Insert a new in-progress survey instance for the respondent.
    async fn start_survey(&self, respondent_id: RespondentId) -> SurveyResult<SurveyId>;

    /// Append one answer record.
    ///
    /// Returns `Err(SurveyError::SurveyNotFound)` if the instance does not exist.
    async fn record_answer(
        &self,
        survey_id: SurveyId,
        question_number: u32,
        answer_id: &str,
        answer_label: &str,
    ) -> SurveyResult<()>;

    /// Most recent in-progress survey of the respondent (latest start wins)
    /// and the number of answers recorded for it.
    async fn current_progress(&self, address: &str) -> SurveyResult<Option<Progress>>;

    /// Mark the instance finished and stamp its end time. A second call on
    /// an already finished instance is a no-op.
    async fn finish_survey(&self, survey_id: SurveyId) -> SurveyResult<()>;

    /// Connectivity probe used by readiness checks.
    async fn health_check(&self) -> SurveyResult<()> {
        Ok(())
    }
}
