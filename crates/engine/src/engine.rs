use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use survey_channels::MessageTransport;
use survey_core::types::{Answer, SurveyId};
use survey_core::{AppConfig, SurveyError, SurveyResult};
use survey_store::ProgressStore;

use crate::catalog::QuestionCatalog;
use crate::dispatcher::{DispatchTarget, QuestionDispatcher};
use crate::state_machine::{NextAction, SurveyState};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound for each store operation.
    pub store_timeout: Duration,
    /// Upper bound for each outbound send.
    pub send_timeout: Duration,
}

impl EngineConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            store_timeout: Duration::from_millis(config.database.statement_timeout_ms),
            send_timeout: Duration::from_millis(config.whatsapp.send_timeout_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

/// What the engine did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Progression {
    /// No answer could be extracted; nothing was written or sent.
    Ignored,
    /// Answer recorded and the next question dispatched.
    Advanced {
        survey_id: SurveyId,
        answered_question: u32,
        next_question: u32,
        delivered: bool,
    },
    /// Final answer recorded, survey finished, closing message dispatched.
    Completed {
        survey_id: SurveyId,
        answered_question: u32,
        delivered: bool,
    },
}

/// Stateless survey progression engine. The current position of every
/// respondent is derived from the store on each call; the only in-process
/// state is a per-respondent lock that serializes concurrent deliveries.
pub struct SurveyEngine {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<QuestionCatalog>,
    dispatcher: QuestionDispatcher,
    config: EngineConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for SurveyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurveyEngine")
            .field("last_question", &self.catalog.last_question())
            .field("active_respondents", &self.locks.len())
            .finish()
    }
}

impl SurveyEngine {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        catalog: Arc<QuestionCatalog>,
        transport: Arc<dyn MessageTransport>,
        config: EngineConfig,
    ) -> Self {
        info!(
            questions = catalog.questions().len(),
            last_question = catalog.last_question(),
            "Survey engine initialized"
        );
        Self {
            store,
            dispatcher: QuestionDispatcher::new(catalog.clone(), transport, config.send_timeout),
            catalog,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Advance `address` by one step with the extracted `answer`.
    ///
    /// Store failures abort the step and are returned. Delivery failures are
    /// logged and reported through `delivered: false`; the answer stays
    /// persisted either way.
    pub async fn handle(&self, address: &str, answer: Option<Answer>) -> SurveyResult<Progression> {
        let Some(answer) = answer else {
            metrics::counter!("engine.ignored").increment(1);
            return Ok(Progression::Ignored);
        };

        let lock = self
            .locks
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.advance(address, &answer).await
        };
        drop(lock);
        self.locks
            .remove_if(address, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn advance(&self, address: &str, answer: &Answer) -> SurveyResult<Progression> {
        let progress = self
            .store_op(
                "current_progress",
                address,
                None,
                self.store.current_progress(address),
            )
            .await?;
        let state = SurveyState::from_progress(progress);
        let transition = state.on_answer(self.catalog.last_question());
        let question = Some(transition.question_number);

        let survey_id = match transition.survey_id {
            Some(id) => id,
            None => {
                let respondent_id = self
                    .store_op(
                        "upsert_respondent",
                        address,
                        question,
                        self.store.upsert_respondent(address),
                    )
                    .await?;
                let survey_id = self
                    .store_op(
                        "start_survey",
                        address,
                        question,
                        self.store.start_survey(respondent_id),
                    )
                    .await?;
                info!(address = %address, survey_id = %survey_id, "Survey started");
                metrics::counter!("engine.surveys_started").increment(1);
                survey_id
            }
        };

        if transition.question_number > self.catalog.last_question() {
            warn!(
                address = %address,
                survey_id = %survey_id,
                question = transition.question_number,
                last_question = self.catalog.last_question(),
                "Recording an answer beyond the catalog, survey will be finished"
            );
        }

        self.store_op(
            "record_answer",
            address,
            question,
            self.store.record_answer(
                survey_id,
                transition.question_number,
                &answer.id,
                &answer.label,
            ),
        )
        .await?;
        info!(
            address = %address,
            survey_id = %survey_id,
            question = transition.question_number,
            "Answer recorded"
        );
        metrics::counter!("engine.answers_recorded").increment(1);
        debug!(
            address = %address,
            answer = %answer.label,
            state = ?transition.resulting_state(survey_id),
            "Respondent advanced"
        );

        match transition.next {
            NextAction::Ask(next_question) => {
                let delivered = self
                    .deliver(address, survey_id, DispatchTarget::Question(next_question))
                    .await;
                Ok(Progression::Advanced {
                    survey_id,
                    answered_question: transition.question_number,
                    next_question,
                    delivered,
                })
            }
            NextAction::Finish => {
                self.store_op(
                    "finish_survey",
                    address,
                    question,
                    self.store.finish_survey(survey_id),
                )
                .await?;
                info!(address = %address, survey_id = %survey_id, "Survey finished");
                metrics::counter!("engine.surveys_finished").increment(1);

                let delivered = self
                    .deliver(address, survey_id, DispatchTarget::Closing)
                    .await;
                Ok(Progression::Completed {
                    survey_id,
                    answered_question: transition.question_number,
                    delivered,
                })
            }
        }
    }

    /// Run one store operation under the configured timeout, logging failures
    /// with enough context to diagnose them.
    async fn store_op<T, F>(
        &self,
        operation: &'static str,
        address: &str,
        question: Option<u32>,
        fut: F,
    ) -> SurveyResult<T>
    where
        F: Future<Output = SurveyResult<T>>,
    {
        let result = match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SurveyError::Timeout {
                operation,
                timeout_ms: self.config.store_timeout.as_millis() as u64,
            }),
        };
        if let Err(e) = &result {
            error!(
                address = %address,
                question = ?question,
                operation = operation,
                error = %e,
                "Store operation failed"
            );
            metrics::counter!("engine.store_errors", "operation" => operation).increment(1);
        }
        result
    }

    async fn deliver(&self, address: &str, survey_id: SurveyId, target: DispatchTarget) -> bool {
        match self.dispatcher.dispatch(address, target).await {
            Ok(message_id) => {
                info!(
                    address = %address,
                    survey_id = %survey_id,
                    ?target,
                    message_id = %message_id,
                    "Prompt dispatched"
                );
                true
            }
            Err(e) => {
                error!(
                    address = %address,
                    survey_id = %survey_id,
                    ?target,
                    error = %e,
                    "Prompt dispatch failed, answer stays recorded"
                );
                metrics::counter!("engine.dispatch_errors").increment(1);
                false
            }
        }
    }
}
