//! Survey progression: advances a respondent through the questionnaire one
//! inbound answer at a time, persisting every answer before the next prompt
//! is sent.

pub mod catalog;
pub mod dispatcher;
pub mod engine;
pub mod state_machine;

pub use catalog::QuestionCatalog;
pub use dispatcher::{DispatchTarget, QuestionDispatcher};
pub use engine::{EngineConfig, Progression, SurveyEngine};
pub use state_machine::{NextAction, SurveyState, Transition};
